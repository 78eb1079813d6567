pub mod aggregate;
pub mod chains;
pub mod contract;
pub mod decoder;
pub mod explorer;
pub mod export;
pub mod gas;
pub mod provider;
pub mod source;
pub mod tokens;
pub mod topics;
pub mod types;
pub mod usdt;
pub mod watch;
pub mod window;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::data::chains::ChainRegistry;
use crate::data::decoder::EventDecoder;
use crate::data::explorer::{ExplorerClient, LogFilter, TxListOptions};
use crate::data::gas::TokenOp;
use crate::data::provider::{ContractReader, EthProvider};
use crate::data::tokens::{TokenRegistry, USDT};
use crate::data::types::*;
use crate::error::{AppError, Result};
use crate::utils::parse_address;

/// Hands out a node connection for a chain.
pub trait ReaderFactory: Send + Sync {
    fn reader(&self, chain: &ChainConfig) -> Result<Arc<dyn ContractReader>>;
}

/// Connects to each chain's RPC endpoint over HTTP.
pub struct HttpReaderFactory {
    timeout: Duration,
    overrides: HashMap<u64, String>,
}

impl HttpReaderFactory {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            overrides: HashMap::new(),
        }
    }

    /// Use `rpc_url` instead of the preset endpoint for `chain_id`.
    pub fn with_override(mut self, chain_id: u64, rpc_url: String) -> Self {
        self.overrides.insert(chain_id, rpc_url);
        self
    }
}

impl ReaderFactory for HttpReaderFactory {
    fn reader(&self, chain: &ChainConfig) -> Result<Arc<dyn ContractReader>> {
        let url = self
            .overrides
            .get(&chain.chain_id)
            .unwrap_or(&chain.rpc_url);
        let provider: Arc<dyn ContractReader> = Arc::new(EthProvider::connect(url, self.timeout)?);
        Ok(provider)
    }
}

/// A token `transfer`/`approve` to estimate.
#[derive(Debug, Clone, Copy)]
pub struct GasRequest<'a> {
    pub op: TokenOp,
    pub chain_id: u64,
    pub token: &'a str,
    /// Recipient for a transfer, spender for an approval.
    pub counterparty: &'a str,
    /// Human amount, e.g. "12.5".
    pub amount: &'a str,
    pub from: Option<&'a str>,
}

/// Entry point for every query the CLI offers.
///
/// Inputs are validated before any network call. Nothing is cached: each call
/// goes back to the explorer or node.
pub struct DataService {
    chains: ChainRegistry,
    tokens: TokenRegistry,
    explorer: ExplorerClient,
    readers: Arc<dyn ReaderFactory>,
    token_events: EventDecoder,
    cancel: CancellationToken,
}

impl DataService {
    pub fn new(
        chains: ChainRegistry,
        tokens: TokenRegistry,
        explorer: ExplorerClient,
        readers: Arc<dyn ReaderFactory>,
    ) -> Result<Self> {
        Ok(Self {
            chains,
            tokens,
            explorer,
            readers,
            token_events: EventDecoder::from_events(usdt::usdt_events())?,
            cancel: CancellationToken::new(),
        })
    }

    /// Abort node reads once `token` is cancelled. The explorer client takes
    /// its own token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    pub fn chain(&self, chain_id: u64) -> Result<&ChainConfig> {
        self.chains
            .by_id(chain_id)
            .ok_or_else(|| AppError::validation(format!("unsupported chain id {chain_id}")))
    }

    fn token_address(&self, chain_id: u64, symbol: &str) -> Result<Address> {
        self.tokens.address(chain_id, symbol).ok_or_else(|| {
            AppError::validation(format!("{symbol} is not configured on chain {chain_id}"))
        })
    }

    /// Token event names in ABI declaration order.
    pub fn event_names(&self) -> Vec<&str> {
        self.token_events.index().names()
    }

    async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            res = fut => res,
        }
    }

    /// Re-run `fetch` every `every` until cancelled, reporting rows not seen before.
    pub async fn watch<T, K, KF, F, Fut, R>(
        &self,
        every: Duration,
        key: KF,
        fetch: F,
        report: R,
    ) -> Result<()>
    where
        K: std::hash::Hash + Eq,
        KF: Fn(&T) -> K,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
        R: FnMut(u64, Vec<T>),
    {
        tracing::info!(every_secs = every.as_secs(), "watching for new rows");
        watch::watch(every, &self.cancel, key, fetch, report).await
    }

    /// Current height and the lagged block it is safe to query from.
    pub async fn compute_window(&self, chain_id: u64) -> Result<QueryWindow> {
        let chain = self.chain(chain_id)?;
        let current = self.explorer.block_number(chain).await?;
        Ok(window::safe_window(current))
    }

    /// Normal transactions of `address`, deduplicated by hash.
    pub async fn transactions(
        &self,
        address: &str,
        chain_id: u64,
        options: &TxListOptions,
    ) -> Result<Vec<Transaction>> {
        let address = parse_address(address)?;
        let chain = self.chain(chain_id)?;
        let txs = self.explorer.transactions(chain, address, options).await?;
        Ok(aggregate::dedupe_transactions(txs))
    }

    /// Latest transfers of a configured token, deduplicated by hash.
    pub async fn token_transactions(
        &self,
        symbol: &str,
        chain_id: u64,
        limit: u32,
    ) -> Result<Vec<Transaction>> {
        let chain = self.chain(chain_id)?;
        let contract = self.token_address(chain_id, symbol)?;
        let options = TxListOptions {
            offset: limit,
            ..TxListOptions::default()
        };
        let txs = self
            .explorer
            .token_transactions(chain, contract, &options)
            .await?;
        Ok(aggregate::dedupe_transactions(txs))
    }

    /// Fetch logs of `address` and decode them against `decoder`.
    ///
    /// Undecodable logs are dropped; the rest are ordered newest first and
    /// deduplicated by `(transactionHash, logIndex)`.
    pub async fn decoded_events(
        &self,
        address: &str,
        chain_id: u64,
        decoder: &EventDecoder,
        filter: &LogFilter,
    ) -> Result<Vec<DecodedEvent>> {
        let address = parse_address(address)?;
        let chain = self.chain(chain_id)?;
        let logs = self.explorer.event_logs(chain, address, filter).await?;
        let events = aggregate::dedupe_events(decoder.decode_all(&logs, true));
        tracing::debug!(
            chain_id,
            logs = logs.len(),
            decoded = events.len(),
            "decoded event page"
        );
        Ok(events)
    }

    /// Recent USDT events from the safe block onwards, optionally one event type only.
    pub async fn recent_events(
        &self,
        chain_id: u64,
        event_name: Option<&str>,
        limit: u32,
    ) -> Result<EventHistory> {
        let topic0 = event_name
            .map(|name| {
                self.token_events.index().selector(name).ok_or_else(|| {
                    AppError::validation(format!(
                        "unknown event {name:?}; expected one of {}",
                        self.event_names().join(", ")
                    ))
                })
            })
            .transpose()?;
        let chain = self.chain(chain_id)?;
        let contract = self.token_address(chain_id, USDT)?;

        let window = self.compute_window(chain_id).await?;
        let filter = LogFilter {
            topic0,
            from_block: window.from_block,
            to_block: None,
            page: 1,
            offset: limit,
        };
        tracing::info!(
            chain = %chain.name,
            from_block = window.from_block,
            current_block = window.current_block,
            event = event_name.unwrap_or("all"),
            "querying token events"
        );

        let logs = self.explorer.event_logs(chain, contract, &filter).await?;
        let events = aggregate::dedupe_events(self.token_events.decode_all(&logs, true));
        Ok(EventHistory { events, window })
    }

    /// Verified source, name, compiler settings and ABI from the explorer.
    pub async fn source(&self, address: &str, chain_id: u64) -> Result<ContractSource> {
        let address = parse_address(address)?;
        let chain = self.chain(chain_id)?;
        let record = self.explorer.source_code(chain, address).await?;
        Ok(record.map(ContractSource::from).unwrap_or_default())
    }

    /// Code and balance over RPC, plus explorer metadata for contracts.
    ///
    /// Explorer failures only cost the metadata.
    pub async fn contract_info(&self, address: &str, chain_id: u64) -> Result<ContractInfo> {
        let parsed = parse_address(address)?;
        let chain = self.chain(chain_id)?;
        let reader = self.readers.reader(chain)?;

        let mut info = self
            .cancellable(contract::inspect(reader.as_ref(), chain_id, parsed))
            .await?;
        if info.is_contract {
            match self.explorer.source_code(chain, parsed).await {
                Ok(Some(record)) => info.source = ContractSource::from(record),
                Ok(None) => {}
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => tracing::warn!(%parsed, error = %e, "contract metadata unavailable"),
            }
        }
        Ok(info)
    }

    /// Read every zero-argument getter of a contract.
    ///
    /// Without an explicit ABI the verified one is fetched from the explorer.
    pub async fn state_variables(
        &self,
        address: &str,
        chain_id: u64,
        abi: Option<&ContractAbi>,
    ) -> Result<Vec<StateVariable>> {
        let parsed = parse_address(address)?;
        let chain = self.chain(chain_id)?;

        let fetched;
        let abi = match abi {
            Some(abi) => abi,
            None => {
                fetched = self.source(address, chain_id).await?.abi.ok_or_else(|| {
                    AppError::validation(format!("no verified ABI for {parsed}"))
                })?;
                &fetched
            }
        };

        let reader = self.readers.reader(chain)?;
        self.cancellable(async {
            Ok(contract::read_state_variables(reader.as_ref(), parsed, abi).await)
        })
        .await
    }

    pub async fn gas_prices(&self, chain_id: u64) -> Result<GasOracle> {
        let chain = self.chain(chain_id)?;
        self.explorer.gas_oracle(chain).await
    }

    /// Estimate a token `transfer`/`approve` and price it at each oracle tier.
    pub async fn estimate_token_gas(&self, request: GasRequest<'_>) -> Result<GasEstimate> {
        let counterparty = parse_address(request.counterparty)?;
        let from = request.from.map(parse_address).transpose()?;
        let chain = self.chain(request.chain_id)?;
        let token = self
            .tokens
            .get(request.token)
            .ok_or_else(|| AppError::validation(format!("unknown token {:?}", request.token)))?;
        let contract = self.token_address(request.chain_id, &token.symbol)?;
        let amount = gas::parse_amount(request.amount, token.decimals)?;

        let calldata = match request.op {
            TokenOp::Transfer => usdt::transfer_calldata(counterparty, amount),
            TokenOp::Approve => usdt::approve_calldata(counterparty, amount),
        };

        let (gas_units, oracle) = tokio::try_join!(
            self.explorer.estimate_gas(chain, contract, &calldata, from),
            self.explorer.gas_oracle(chain),
        )?;
        let tiers = gas::cost_tiers(gas_units, &oracle)?;
        tracing::debug!(op = request.op.name(), gas_units, "gas estimated");

        Ok(GasEstimate {
            gas_units,
            oracle,
            tiers,
            calldata,
        })
    }

    /// Native and token balances of `address` on every configured chain.
    ///
    /// Reads run concurrently; chains or tokens that fail are left out.
    pub async fn balances(&self, address: &str) -> Result<Vec<TokenBalance>> {
        let owner = parse_address(address)?;

        let mut reads = Vec::new();
        for chain in self.chains.iter() {
            let reader = match self.readers.reader(chain) {
                Ok(reader) => reader,
                Err(e) => {
                    tracing::warn!(chain = %chain.name, error = %e, "skipping chain");
                    continue;
                }
            };
            reads.push(read_balance(reader.clone(), chain, None, owner));
            for (token, contract) in self.tokens.on_chain(chain.chain_id) {
                reads.push(read_balance(reader.clone(), chain, Some((token, contract)), owner));
            }
        }

        let results = self.cancellable(async { Ok(join_all(reads).await) }).await?;
        Ok(aggregate::collect_successes(results))
    }
}

async fn read_balance(
    reader: Arc<dyn ContractReader>,
    chain: &ChainConfig,
    token: Option<(&TokenConfig, Address)>,
    owner: Address,
) -> Result<TokenBalance> {
    let (symbol, decimals, amount) = match token {
        None => (
            chain.native_symbol.clone(),
            18,
            reader.balance(owner).await?,
        ),
        Some((token, contract)) => {
            let output = reader
                .call(contract, usdt::balance_of_calldata(owner))
                .await?;
            let amount = usdt::decode_uint_word(&output).ok_or_else(|| {
                AppError::MalformedResponse(format!("bad balanceOf output on {}", chain.name))
            })?;
            (token.symbol.clone(), token.decimals, amount)
        }
    };
    Ok(TokenBalance {
        chain_id: chain.chain_id,
        chain_name: chain.name.clone(),
        symbol,
        decimals,
        amount,
    })
}
