use crate::data::types::ChainConfig;

/// Etherscan's multichain endpoint; the target chain is chosen with `chainid`.
pub const ETHERSCAN_API_V2_URL: &str = "https://api.etherscan.io/v2/api";

pub const MAINNET_CHAIN_ID: u64 = 1;
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// Immutable table of supported chains, built once at startup and handed to
/// the services that need it.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainConfig>,
}

impl ChainRegistry {
    pub fn new(chains: Vec<ChainConfig>) -> Self {
        Self { chains }
    }

    /// The built-in presets.
    pub fn builtin() -> Self {
        Self::new(vec![
            preset(
                "Ethereum",
                MAINNET_CHAIN_ID,
                "ETH",
                "https://eth.merkle.io",
                "https://etherscan.io",
            ),
            preset(
                "Sepolia",
                SEPOLIA_CHAIN_ID,
                "ETH",
                "https://ethereum-sepolia-rpc.publicnode.com",
                "https://sepolia.etherscan.io",
            ),
            preset(
                "Arbitrum One",
                42161,
                "ETH",
                "https://arb1.arbitrum.io/rpc",
                "https://arbiscan.io",
            ),
            preset(
                "Optimism",
                10,
                "ETH",
                "https://mainnet.optimism.io",
                "https://optimistic.etherscan.io",
            ),
            preset(
                "Base",
                8453,
                "ETH",
                "https://mainnet.base.org",
                "https://basescan.org",
            ),
            preset(
                "Polygon",
                137,
                "POL",
                "https://polygon-rpc.com",
                "https://polygonscan.com",
            ),
        ])
    }

    /// Point every chain at a different explorer API endpoint.
    pub fn with_explorer_api_url(mut self, url: &str) -> Self {
        for chain in &mut self.chains {
            chain.explorer_api_url = url.to_string();
        }
        self
    }

    pub fn by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Resolve a chain by alias, display name or numeric id.
    pub fn resolve(&self, name: &str) -> Option<&ChainConfig> {
        let name = name.trim().to_lowercase();
        if let Ok(id) = name.parse::<u64>() {
            return self.by_id(id);
        }
        let chain_id = match name.as_str() {
            "ethereum" | "eth" | "mainnet" => MAINNET_CHAIN_ID,
            "sepolia" => SEPOLIA_CHAIN_ID,
            "arbitrum" | "arb" => 42161,
            "optimism" | "op" => 10,
            "base" => 8453,
            "polygon" | "matic" => 137,
            _ => {
                return self
                    .chains
                    .iter()
                    .find(|c| c.name.to_lowercase() == name);
            }
        };
        self.by_id(chain_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.iter()
    }
}

fn preset(name: &str, chain_id: u64, symbol: &str, rpc_url: &str, explorer_url: &str) -> ChainConfig {
    ChainConfig {
        name: name.to_string(),
        chain_id,
        native_symbol: symbol.to_string(),
        rpc_url: rpc_url.to_string(),
        explorer_url: explorer_url.to_string(),
        explorer_api_url: ETHERSCAN_API_V2_URL.to_string(),
    }
}
