mod config;
mod data;
mod error;
mod render;
mod utils;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::{Command, Config};
use crate::data::chains::ChainRegistry;
use crate::data::decoder::EventDecoder;
use crate::data::explorer::{ExplorerClient, LogFilter, ReqwestTransport, SortOrder, TxListOptions};
use crate::data::tokens::TokenRegistry;
use crate::data::topics::TopicIndex;
use crate::data::types::{ChainConfig, ContractAbi, DecodedEvent, Transaction};
use crate::data::{DataService, GasRequest, HttpReaderFactory, export};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Diagnostics go to stderr so command output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    let chains = ChainRegistry::builtin().with_explorer_api_url(&config.explorer_url);
    let chain = chains
        .resolve(&config.chain)
        .cloned()
        .ok_or_else(|| eyre!("unknown chain {:?}", config.chain))?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling pending requests");
                cancel.cancel();
            }
        });
    }

    let transport = Arc::new(ReqwestTransport::new(config.timeout())?);
    let explorer = ExplorerClient::new(transport, config.etherscan_api_key.clone())
        .with_retry(config.retry_policy())
        .with_cancellation(cancel.clone());
    if !explorer.has_api_key() {
        tracing::warn!("ETHERSCAN_API_KEY not set, explorer requests are unauthenticated");
    }

    let mut readers = HttpReaderFactory::new(config.timeout());
    if let Some(url) = &config.rpc_url {
        readers = readers.with_override(chain.chain_id, url.clone());
    }

    let service = DataService::new(chains, TokenRegistry::builtin(), explorer, Arc::new(readers))?
        .with_cancellation(cancel);

    run(&service, &chain, config.command).await
}

async fn run(service: &DataService, chain: &ChainConfig, command: Command) -> Result<()> {
    let chain_id = chain.chain_id;
    match command {
        Command::Chains => render::print_chains(service.chains()),

        Command::Window => {
            let window = service.compute_window(chain_id).await?;
            render::print_window(chain, &window);
        }

        Command::Txs {
            address,
            page,
            limit,
            asc,
            export,
        } => {
            let options = TxListOptions {
                page,
                offset: limit,
                sort: if asc { SortOrder::Asc } else { SortOrder::Desc },
                ..TxListOptions::default()
            };
            let txs = service.transactions(&address, chain_id, &options).await?;
            render::print_transactions(chain, &txs);
            if let Some(path) = export {
                report(export::export_transactions_csv(&txs, &path))?;
            }
        }

        Command::TokenTxs {
            token,
            limit,
            watch: Some(secs),
            ..
        } => {
            println!("Watching {token} transfers on {} every {secs}s (Ctrl-C to stop)", chain.name);
            service
                .watch(
                    poll_interval(secs),
                    Transaction::key,
                    || service.token_transactions(&token, chain_id, limit),
                    |round, fresh| {
                        if round == 0 || !fresh.is_empty() {
                            render::print_transactions(chain, &fresh);
                        }
                    },
                )
                .await?;
        }

        Command::TokenTxs {
            token,
            limit,
            export,
            watch: None,
        } => {
            let txs = service.token_transactions(&token, chain_id, limit).await?;
            render::print_transactions(chain, &txs);
            if let Some(path) = export {
                report(export::export_transactions_csv(&txs, &path))?;
            }
        }

        Command::Events {
            event,
            limit,
            address,
            abi,
            from_block,
            export,
            watch,
        } => {
            let custom = match (address, abi) {
                (Some(address), Some(abi_path)) => {
                    let abi = load_abi(&abi_path)?;
                    let decoder = EventDecoder::new(TopicIndex::from_abi(&abi.abi)?);
                    let topic0 = event
                        .as_deref()
                        .map(|name| {
                            decoder
                                .index()
                                .selector(name)
                                .ok_or_else(|| eyre!("event {name:?} is not in the ABI"))
                        })
                        .transpose()?;
                    let from_block = match from_block {
                        Some(block) => block,
                        None => service.compute_window(chain_id).await?.from_block,
                    };
                    let filter = LogFilter {
                        topic0,
                        from_block,
                        offset: limit,
                        ..LogFilter::default()
                    };
                    Some((address, decoder, filter))
                }
                _ => None,
            };

            let events = match (&custom, watch) {
                (Some((address, decoder, filter)), Some(secs)) => {
                    println!("Watching {address} events every {secs}s (Ctrl-C to stop)");
                    service
                        .watch(
                            poll_interval(secs),
                            DecodedEvent::key,
                            || service.decoded_events(address, chain_id, decoder, filter),
                            |round, fresh| {
                                if round == 0 || !fresh.is_empty() {
                                    render::print_events(&fresh);
                                }
                            },
                        )
                        .await?;
                    return Ok(());
                }
                (Some((address, decoder, filter)), None) => {
                    let events = service
                        .decoded_events(address, chain_id, decoder, filter)
                        .await?;
                    render::print_events(&events);
                    events
                }
                (None, Some(secs)) => {
                    println!("Watching USDT events on {} every {secs}s (Ctrl-C to stop)", chain.name);
                    let event = event.as_deref();
                    service
                        .watch(
                            poll_interval(secs),
                            DecodedEvent::key,
                            move || async move {
                                service
                                    .recent_events(chain_id, event, limit)
                                    .await
                                    .map(|history| history.events)
                            },
                            |round, fresh| {
                                if round == 0 || !fresh.is_empty() {
                                    render::print_token_events(&fresh);
                                }
                            },
                        )
                        .await?;
                    return Ok(());
                }
                (None, None) => {
                    let history = service
                        .recent_events(chain_id, event.as_deref(), limit)
                        .await?;
                    render::print_event_history(&history);
                    history.events
                }
            };
            if let Some(path) = export {
                report(export::export_events_csv(&events, &path))?;
            }
        }

        Command::Contract {
            address,
            state,
            export,
        } => {
            let info = service.contract_info(&address, chain_id).await?;
            render::print_contract_info(chain, &info);
            let vars = match (&info.source.abi, state && info.is_contract) {
                (Some(abi), true) => {
                    let vars = service
                        .state_variables(&address, chain_id, Some(abi))
                        .await?;
                    println!();
                    render::print_state(&vars);
                    vars
                }
                _ => Vec::new(),
            };
            if let Some(path) = export {
                report(export::export_contract_json(&info, &vars, &path))?;
            }
        }

        Command::State { address, abi } => {
            let abi = abi.as_deref().map(load_abi).transpose()?;
            let vars = service
                .state_variables(&address, chain_id, abi.as_ref())
                .await?;
            render::print_state(&vars);
        }

        Command::Source { address, output } => {
            let source = service.source(&address, chain_id).await?;
            let code = source
                .source_code
                .ok_or_else(|| eyre!("{address} has no verified source on {}", chain.name))?;
            match output {
                Some(path) => {
                    std::fs::write(&path, code)
                        .wrap_err_with(|| format!("writing {}", path.display()))?;
                    println!("Wrote source to {}", path.display());
                }
                None => println!("{code}"),
            }
        }

        Command::GasPrices => {
            let oracle = service.gas_prices(chain_id).await?;
            render::print_gas_oracle(chain, &oracle);
        }

        Command::EstimateGas {
            op,
            counterparty,
            amount,
            token,
            from,
        } => {
            let op = op.into();
            let estimate = service
                .estimate_token_gas(GasRequest {
                    op,
                    chain_id,
                    token: &token,
                    counterparty: &counterparty,
                    amount: &amount,
                    from: from.as_deref(),
                })
                .await?;
            render::print_gas_estimate(chain, op, &estimate);
        }

        Command::Balances { address } => {
            let balances = service.balances(&address).await?;
            render::print_balances(&balances);
        }
    }
    Ok(())
}

fn poll_interval(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

fn load_abi(path: &Path) -> Result<ContractAbi> {
    let raw = std::fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
    ContractAbi::from_json(&raw).wrap_err_with(|| format!("parsing ABI {}", path.display()))
}

fn report(outcome: std::result::Result<String, String>) -> Result<()> {
    let message = outcome.map_err(|e| eyre!(e))?;
    eprintln!("{message}");
    Ok(())
}
