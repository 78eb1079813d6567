use alloy::primitives::U256;

use crate::data::chains::ChainRegistry;
use crate::data::gas;
use crate::data::types::{
    ChainConfig, ContractInfo, DecodedEvent, EventHistory, GasEstimate, GasOracle, QueryWindow,
    StateVariable, TokenBalance, Transaction,
};
use crate::data::usdt::TokenEvent;
use crate::utils::{
    format_gwei, format_native, format_number, format_time_ago, format_timestamp, format_token,
    format_u256_as_decimal, truncate_hex,
};

pub fn print_chains(chains: &ChainRegistry) {
    println!("{:<10} {:<14} {:<6} {}", "ID", "NAME", "UNIT", "EXPLORER");
    for chain in chains.iter() {
        println!(
            "{:<10} {:<14} {:<6} {}",
            chain.chain_id, chain.name, chain.native_symbol, chain.explorer_url
        );
    }
}

pub fn print_window(chain: &ChainConfig, window: &QueryWindow) {
    println!("Chain:          {} ({})", chain.name, chain.chain_id);
    println!("Current block:  {}", format_number(window.current_block));
    println!("Safe block:     {}", format_number(window.from_block));
    println!(
        "Confirmations:  {} (lag {})",
        window.confirmations(),
        window.confirmation_lag
    );
}

pub fn print_transactions(chain: &ChainConfig, txs: &[Transaction]) {
    if txs.is_empty() {
        println!("No transactions found");
        return;
    }
    for tx in txs {
        let amount = match (tx.token_symbol.is_empty(), tx.value_wei()) {
            (_, None) => "-".to_string(),
            (true, Some(wei)) => format_native(wei, &chain.native_symbol),
            (false, Some(raw)) => {
                let decimals = tx.token_decimal.parse().unwrap_or(0);
                format_token(raw, decimals, &tx.token_symbol)
            }
        };
        let status = if tx.failed() { "FAILED" } else { "ok" };
        println!(
            "{}  #{:<10} {:<10} {} -> {}  {}  [{status}]",
            truncate_hex(&tx.hash),
            tx.block_number,
            format_time_ago(tx.timestamp()),
            truncate_hex(&tx.from),
            truncate_hex(&tx.to),
            amount,
        );
    }
    println!("{} transactions", txs.len());
}

pub fn print_event_history(history: &EventHistory) {
    println!(
        "Blocks {}..latest (head {}, {} confirmations)",
        format_number(history.window.from_block),
        format_number(history.window.current_block),
        history.window.confirmations()
    );
    print_token_events(&history.events);
    let transferred = transferred_total(&history.events);
    if !transferred.is_zero() {
        println!("Transferred: {}", format_token(transferred, 6, "USDT"));
    }
}

/// Events decoded from the bundled USDT ABI, with typed descriptions.
pub fn print_token_events(events: &[DecodedEvent]) {
    print_event_rows(events, true);
}

/// Events decoded from a caller-supplied ABI, listed by parameter.
pub fn print_events(events: &[DecodedEvent]) {
    print_event_rows(events, false);
}

fn print_event_rows(events: &[DecodedEvent], usdt: bool) {
    if events.is_empty() {
        println!("No events found");
        return;
    }
    for event in events {
        println!(
            "{:<20} {}  block {}  {}",
            event.event_name,
            truncate_hex(&event.transaction_hash),
            format_number(event.block()),
            format_timestamp(event.timestamp()),
        );
        for line in event_details(event, usdt) {
            println!("    {line}");
        }
    }
}

fn event_details(event: &DecodedEvent, usdt: bool) -> Vec<String> {
    let typed = if usdt {
        TokenEvent::from_decoded(event)
    } else {
        None
    };
    if let Some(typed) = typed {
        return vec![describe_token_event(&typed)];
    }
    event
        .params()
        .into_iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect()
}

/// Sum of every typed `Transfer` value in the list.
fn transferred_total(events: &[DecodedEvent]) -> U256 {
    events
        .iter()
        .filter_map(TokenEvent::from_decoded)
        .filter_map(|event| match event {
            TokenEvent::Transfer { value, .. } => Some(value),
            _ => None,
        })
        .fold(U256::ZERO, |acc, v| acc.saturating_add(v))
}

/// USDT amounts use 6 decimals.
fn describe_token_event(event: &TokenEvent) -> String {
    let usdt = |v| format_token(v, 6, "USDT");
    match event {
        TokenEvent::Transfer { from, to, value } => format!("{from} -> {to}: {}", usdt(*value)),
        TokenEvent::Approval {
            owner,
            spender,
            value,
        } => format!("{owner} approved {spender} for {}", usdt(*value)),
        TokenEvent::Issue { amount } => format!("issued {}", usdt(*amount)),
        TokenEvent::Redeem { amount } => format!("redeemed {}", usdt(*amount)),
        TokenEvent::AddedBlackList { user } => format!("blacklisted {user}"),
        TokenEvent::RemovedBlackList { user } => format!("unblacklisted {user}"),
        TokenEvent::DestroyedBlackFunds { user, balance } => {
            format!("destroyed {} held by {user}", usdt(*balance))
        }
        TokenEvent::Params {
            fee_basis_points,
            max_fee,
        } => format!("fee {fee_basis_points} bps, max fee {max_fee}"),
        TokenEvent::Pause => "contract paused".to_string(),
        TokenEvent::Unpause => "contract unpaused".to_string(),
        TokenEvent::Deprecate { new_address } => format!("deprecated in favour of {new_address}"),
    }
}

pub fn print_contract_info(chain: &ChainConfig, info: &ContractInfo) {
    println!("Address:    {}", info.address);
    println!("Chain:      {} ({})", chain.name, info.chain_id);
    println!(
        "Type:       {}",
        if info.is_contract { "contract" } else { "externally owned account" }
    );
    println!("Balance:    {}", format_native(info.balance, &chain.native_symbol));
    if !info.is_contract {
        return;
    }
    println!("Code size:  {} bytes", format_number(info.bytecode.len() as u64));

    let source = &info.source;
    if !source.is_verified() {
        println!("Verified:   no");
        return;
    }
    println!("Verified:   yes");
    if let Some(name) = &source.contract_name {
        println!("Name:       {name}");
    }
    if let Some(version) = &source.compiler_version {
        println!("Compiler:   {version}");
    }
    if let Some(optimized) = source.optimization_used {
        println!("Optimized:  {}", if optimized { "yes" } else { "no" });
    }
    if let Some(abi) = &source.abi {
        println!(
            "ABI:        {} functions, {} events",
            abi.abi.functions().count(),
            abi.abi.events().count()
        );
    }
}

pub fn print_state(vars: &[StateVariable]) {
    if vars.is_empty() {
        println!("No readable state");
        return;
    }
    let width = vars.iter().map(|v| v.name.len()).max().unwrap_or(0);
    for var in vars {
        println!("{:<width$}  {:<10}  {}", var.name, var.ty, var.value);
    }
}

pub fn print_gas_oracle(chain: &ChainConfig, oracle: &GasOracle) {
    println!("{} gas oracle at block {}", chain.name, oracle.last_block);
    println!("Safe:      {} Gwei", oracle.safe_gas_price);
    println!("Propose:   {} Gwei", oracle.propose_gas_price);
    println!("Fast:      {} Gwei", oracle.fast_gas_price);
    println!("Base fee:  {} Gwei", oracle.suggest_base_fee);
}

pub fn print_gas_estimate(chain: &ChainConfig, op: gas::TokenOp, estimate: &GasEstimate) {
    println!("Operation:  {}", op.name());
    println!("Calldata:   {}", estimate.calldata);
    println!("Gas units:  {}", format_number(estimate.gas_units));
    println!(
        "Oracle:     block {}, base fee {} Gwei",
        estimate.oracle.last_block, estimate.oracle.suggest_base_fee
    );
    for tier in &estimate.tiers {
        let price = gas::gwei_to_wei(&tier.price_gwei)
            .map(format_gwei)
            .unwrap_or_else(|_| format!("{} Gwei", tier.price_gwei));
        println!(
            "{:<8}    {} -> {}",
            tier.label,
            price,
            format_native(tier.cost_wei, &chain.native_symbol)
        );
    }
}

pub fn print_balances(balances: &[TokenBalance]) {
    if balances.is_empty() {
        println!("No balances could be read");
        return;
    }
    for balance in balances {
        println!(
            "{:<14} {:<6} {}",
            balance.chain_name,
            balance.symbol,
            format_u256_as_decimal(balance.amount, balance.decimals)
        );
    }
}
