use std::collections::BTreeMap;

use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes, U256};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub native_symbol: String,
    pub rpc_url: String,
    /// Human-facing block explorer.
    pub explorer_url: String,
    /// Explorer API endpoint used by `ExplorerClient`.
    pub explorer_api_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Contract address per chain id. Empty for the native unit.
    pub addresses: BTreeMap<u64, Address>,
}

/// A transaction row as returned by `account/txlist` and `account/tokentx`.
///
/// Numeric fields stay decimal strings; use the accessors for arithmetic.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Transaction {
    pub block_number: String,
    pub time_stamp: String,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas_used: String,
    pub gas_price: String,
    pub is_error: String,
    #[serde(rename = "txreceipt_status")]
    pub receipt_status: String,
    pub contract_address: String,
    pub token_symbol: String,
    pub token_decimal: String,
}

impl Transaction {
    pub fn value_wei(&self) -> Option<U256> {
        parse_u256(&self.value)
    }

    /// `gasUsed * gasPrice`, when both are present.
    pub fn fee_wei(&self) -> Option<U256> {
        let used = parse_u256(&self.gas_used)?;
        let price = parse_u256(&self.gas_price)?;
        used.checked_mul(price)
    }

    pub fn failed(&self) -> bool {
        self.is_error == "1" || self.receipt_status == "0"
    }

    pub fn timestamp(&self) -> u64 {
        parse_quantity(&self.time_stamp).unwrap_or(0)
    }

    /// Identity key used for deduplication.
    pub fn key(&self) -> String {
        self.hash.to_lowercase()
    }
}

/// A raw log row as returned by `logs/getLogs`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RawLogEntry {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: String,
    pub time_stamp: String,
    pub log_index: String,
    pub transaction_hash: String,
}

/// A log matched to an ABI event, with its values decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub event_name: String,
    pub transaction_hash: String,
    pub block_number: String,
    pub time_stamp: String,
    pub log_index: String,
    /// Parameter values in declaration order.
    pub values: Vec<(String, DynSolValue)>,
}

impl DecodedEvent {
    /// Parameter values rendered as strings, in declaration order.
    pub fn params(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), crate::data::decoder::format_sol_value(value)))
            .collect()
    }

    pub fn param(&self, name: &str) -> Option<&DynSolValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn timestamp(&self) -> u64 {
        parse_quantity(&self.time_stamp).unwrap_or(0)
    }

    pub fn block(&self) -> u64 {
        parse_quantity(&self.block_number).unwrap_or(0)
    }

    /// Identity key used for deduplication: `(transactionHash, logIndex)`.
    pub fn key(&self) -> (String, u64) {
        (
            self.transaction_hash.to_lowercase(),
            parse_quantity(&self.log_index).unwrap_or(0),
        )
    }
}

/// The block range considered safe to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub from_block: u64,
    pub current_block: u64,
    pub confirmation_lag: u64,
}

impl QueryWindow {
    /// Blocks between the window start and the chain head.
    pub fn confirmations(&self) -> u64 {
        self.current_block - self.from_block
    }
}

#[derive(Debug, Clone)]
pub struct EventHistory {
    pub events: Vec<DecodedEvent>,
    pub window: QueryWindow,
}

/// `gastracker/gasoracle` result. Prices are decimal Gwei strings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GasOracle {
    #[serde(rename = "LastBlock")]
    pub last_block: String,
    #[serde(rename = "SafeGasPrice")]
    pub safe_gas_price: String,
    #[serde(rename = "ProposeGasPrice")]
    pub propose_gas_price: String,
    #[serde(rename = "FastGasPrice")]
    pub fast_gas_price: String,
    #[serde(rename = "suggestBaseFee")]
    pub suggest_base_fee: String,
}

/// Fee at one oracle price tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostTier {
    pub label: &'static str,
    pub price_gwei: String,
    pub cost_wei: U256,
}

#[derive(Debug, Clone)]
pub struct GasEstimate {
    pub gas_units: u64,
    pub oracle: GasOracle,
    pub tiers: Vec<CostTier>,
    /// ABI-encoded call that was estimated.
    pub calldata: Bytes,
}

/// `contract/getsourcecode` row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ContractSourceRecord {
    pub source_code: String,
    pub contract_name: String,
    pub compiler_version: String,
    pub optimization_used: String,
    #[serde(rename = "ABI")]
    pub abi: String,
}

/// A parsed ABI plus the order its functions were declared in.
///
/// `JsonAbi` keys functions by name, so the declaration order is kept aside.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    pub abi: JsonAbi,
    pub function_order: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ContractSource {
    pub source_code: Option<String>,
    pub contract_name: Option<String>,
    pub compiler_version: Option<String>,
    pub optimization_used: Option<bool>,
    pub abi: Option<ContractAbi>,
}

#[derive(Debug, Clone)]
pub struct ContractInfo {
    pub address: Address,
    pub chain_id: u64,
    pub is_contract: bool,
    pub bytecode: Bytes,
    pub balance: U256,
    pub source: ContractSource,
}

/// A successful zero-argument view call.
#[derive(Debug, Clone, PartialEq)]
pub struct StateVariable {
    pub name: String,
    pub ty: String,
    pub value: String,
    pub raw: Vec<DynSolValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub chain_id: u64,
    pub chain_name: String,
    pub symbol: String,
    pub decimals: u8,
    pub amount: U256,
}

/// Parse an explorer quantity that may be either `0x`-hex or decimal.
pub fn parse_quantity(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => u64::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None => s.parse().ok(),
    }
}

/// Parse a decimal base-unit amount without going through a float.
pub fn parse_u256(s: &str) -> Option<U256> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    U256::from_str_radix(s, 10).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity_hex_and_decimal() {
        assert_eq!(parse_quantity("0x6110f97f"), Some(0x6110f97f));
        assert_eq!(parse_quantity("1628502399"), Some(1628502399));
        assert_eq!(parse_quantity("0x"), None);
        assert_eq!(parse_quantity("abc"), None);
    }

    #[test]
    fn test_transaction_deserialize() {
        let json = r#"{
            "blockNumber": "19000000",
            "timeStamp": "1700000000",
            "hash": "0xABC",
            "from": "0x1",
            "to": "0x2",
            "value": "123456789012345678901234567890",
            "gasUsed": "21000",
            "gasPrice": "30000000000",
            "isError": "0",
            "txreceipt_status": "1"
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.receipt_status, "1");
        assert_eq!(
            tx.value_wei().unwrap().to_string(),
            "123456789012345678901234567890"
        );
        assert_eq!(tx.fee_wei(), Some(U256::from(630_000_000_000_000u64)));
        assert!(!tx.failed());
        assert_eq!(tx.key(), "0xabc");
        assert!(tx.token_symbol.is_empty());
    }

    #[test]
    fn test_transaction_failed_flags() {
        let tx = Transaction {
            is_error: "1".into(),
            ..Default::default()
        };
        assert!(tx.failed());
        let tx = Transaction {
            receipt_status: "0".into(),
            ..Default::default()
        };
        assert!(tx.failed());
    }

    #[test]
    fn test_transaction_missing_gas_has_no_fee() {
        let tx = Transaction {
            gas_used: "21000".into(),
            ..Default::default()
        };
        assert_eq!(tx.fee_wei(), None);
    }

    #[test]
    fn test_gas_oracle_deserialize() {
        let json = r#"{"LastBlock":"19000000","SafeGasPrice":"0.5","ProposeGasPrice":"0.62","FastGasPrice":"1.1","suggestBaseFee":"0.48","gasUsedRatio":"0.4,0.5"}"#;
        let oracle: GasOracle = serde_json::from_str(json).unwrap();
        assert_eq!(oracle.propose_gas_price, "0.62");
        assert_eq!(oracle.suggest_base_fee, "0.48");
    }

    #[test]
    fn test_query_window_confirmations() {
        let window = QueryWindow {
            from_block: 88,
            current_block: 100,
            confirmation_lag: 12,
        };
        assert_eq!(window.confirmations(), 12);
    }
}
