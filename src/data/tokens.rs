use std::collections::BTreeMap;

use alloy::primitives::{Address, address};

use crate::data::chains::{MAINNET_CHAIN_ID, SEPOLIA_CHAIN_ID};
use crate::data::types::TokenConfig;

pub const USDT: &str = "USDT";
pub const ETH: &str = "ETH";

/// Immutable table of known tokens, keyed by symbol.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    tokens: Vec<TokenConfig>,
}

impl TokenRegistry {
    pub fn new(tokens: Vec<TokenConfig>) -> Self {
        Self { tokens }
    }

    pub fn builtin() -> Self {
        let usdt_addresses = BTreeMap::from([
            (
                MAINNET_CHAIN_ID,
                address!("dAC17F958D2ee523a2206206994597C13D831ec7"),
            ),
            (
                SEPOLIA_CHAIN_ID,
                address!("aA8E23Fb1079EA71e0a56F48a2aA51851D8433D0"),
            ),
        ]);

        Self::new(vec![
            TokenConfig {
                symbol: USDT.to_string(),
                name: "Tether USD".to_string(),
                decimals: 6,
                addresses: usdt_addresses,
            },
            TokenConfig {
                symbol: ETH.to_string(),
                name: "Ether".to_string(),
                decimals: 18,
                addresses: BTreeMap::new(),
            },
        ])
    }

    pub fn get(&self, symbol: &str) -> Option<&TokenConfig> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Contract address of `symbol` on `chain_id`, if one is configured.
    pub fn address(&self, chain_id: u64, symbol: &str) -> Option<Address> {
        self.get(symbol)?.addresses.get(&chain_id).copied()
    }

    /// Tokens that have a contract deployed on `chain_id`.
    pub fn on_chain(&self, chain_id: u64) -> impl Iterator<Item = (&TokenConfig, Address)> {
        self.tokens
            .iter()
            .filter_map(move |t| t.addresses.get(&chain_id).map(|a| (t, *a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usdt_decimals() {
        let registry = TokenRegistry::builtin();
        assert_eq!(registry.get("USDT").unwrap().decimals, 6);
        assert_eq!(registry.get("eth").unwrap().decimals, 18);
    }

    #[test]
    fn test_usdt_addresses() {
        let registry = TokenRegistry::builtin();
        assert_eq!(
            registry.address(1, USDT),
            Some(address!("dAC17F958D2ee523a2206206994597C13D831ec7"))
        );
        assert_eq!(
            registry.address(11155111, USDT),
            Some(address!("aA8E23Fb1079EA71e0a56F48a2aA51851D8433D0"))
        );
    }

    #[test]
    fn test_missing_address() {
        let registry = TokenRegistry::builtin();
        assert_eq!(registry.address(137, USDT), None);
        assert_eq!(registry.address(1, ETH), None);
        assert_eq!(registry.address(1, "DAI"), None);
    }

    #[test]
    fn test_tokens_on_chain() {
        let registry = TokenRegistry::builtin();
        let on_mainnet: Vec<_> = registry.on_chain(1).map(|(t, _)| t.symbol.clone()).collect();
        assert_eq!(on_mainnet, vec!["USDT".to_string()]);
        assert_eq!(registry.on_chain(8453).count(), 0);
    }
}
