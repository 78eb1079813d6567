use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::data::chains::ETHERSCAN_API_V2_URL;
use crate::data::explorer::RetryPolicy;
use crate::data::gas::TokenOp;

#[derive(Parser, Debug)]
#[command(
    name = "learn-web3",
    about = "Query balances, contracts, gas prices and token events on EVM chains"
)]
pub struct Config {
    /// Chain name, alias or id (ethereum, sepolia, arbitrum, optimism, base, polygon)
    #[arg(long, global = true, default_value = "ethereum")]
    pub chain: String,

    /// RPC endpoint URL, overriding the chain preset
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Etherscan API key (optional; calls are rate limited without one)
    #[arg(long, global = true, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    /// Explorer API endpoint
    #[arg(long, global = true, env = "ETHERSCAN_API_URL", default_value = ETHERSCAN_API_V2_URL)]
    pub explorer_url: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value = "10")]
    pub timeout_secs: u64,

    /// Retries per explorer request when the network fails
    #[arg(long, global = true, default_value = "3")]
    pub max_retries: u32,

    /// First retry delay in milliseconds; doubles on every retry
    #[arg(long, global = true, default_value = "500")]
    pub retry_base_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        if self.max_retries == 0 {
            return RetryPolicy::none();
        }
        RetryPolicy {
            max_attempts: self.max_retries.saturating_add(1),
            base_delay: Duration::from_millis(self.retry_base_ms),
            ..RetryPolicy::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List an address's transactions
    Txs {
        address: String,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "100")]
        limit: u32,
        /// Oldest first
        #[arg(long)]
        asc: bool,
        /// Write the rows to a CSV file
        #[arg(long)]
        export: Option<String>,
    },
    /// List a token's latest transfers
    TokenTxs {
        #[arg(default_value = "USDT")]
        token: String,
        #[arg(long, default_value = "10")]
        limit: u32,
        #[arg(long)]
        export: Option<String>,
        /// Poll every SECS seconds and print only new transfers
        #[arg(long, value_name = "SECS", conflicts_with = "export")]
        watch: Option<u64>,
    },
    /// Decode recent contract events (USDT unless --address and --abi are given)
    Events {
        /// Only this event type
        #[arg(long)]
        event: Option<String>,
        #[arg(long, default_value = "10")]
        limit: u32,
        #[arg(long, requires = "abi")]
        address: Option<String>,
        /// JSON ABI file for --address
        #[arg(long, requires = "address")]
        abi: Option<PathBuf>,
        /// Start block (defaults to the safe block)
        #[arg(long)]
        from_block: Option<u64>,
        #[arg(long)]
        export: Option<String>,
        /// Poll every SECS seconds and print only new events
        #[arg(long, value_name = "SECS", conflicts_with = "export")]
        watch: Option<u64>,
    },
    /// Show the current block and the safe query window
    Window,
    /// Show code, balance and verification status of an address
    Contract {
        address: String,
        /// Also read every zero-argument getter
        #[arg(long)]
        state: bool,
        /// Write the result to a JSON file
        #[arg(long)]
        export: Option<String>,
    },
    /// Read every zero-argument getter of a contract
    State {
        address: String,
        /// JSON ABI file (defaults to the verified ABI)
        #[arg(long)]
        abi: Option<PathBuf>,
    },
    /// Print a contract's verified source
    Source {
        address: String,
        /// Write the source to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the gas oracle
    GasPrices,
    /// Estimate the gas and fee of a token transfer or approval
    EstimateGas {
        #[arg(value_enum)]
        op: GasOp,
        /// Recipient (transfer) or spender (approve)
        counterparty: String,
        /// Amount in whole tokens, e.g. 12.5
        amount: String,
        #[arg(long, default_value = "USDT")]
        token: String,
        /// Sender to simulate from
        #[arg(long)]
        from: Option<String>,
    },
    /// Show native and token balances on every chain
    Balances { address: String },
    /// List supported chains
    Chains,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GasOp {
    Transfer,
    Approve,
}

impl From<GasOp> for TokenOp {
    fn from(op: GasOp) -> Self {
        match op {
            GasOp::Transfer => TokenOp::Transfer,
            GasOp::Approve => TokenOp::Approve,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Config::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["learn-web3", "window"]).unwrap();
        assert_eq!(config.chain, "ethereum");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        let retry = config.retry_policy();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.base_delay, Duration::from_millis(500));
        assert!(matches!(config.command, Command::Window));
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let config = Config::try_parse_from([
            "learn-web3",
            "estimate-gas",
            "approve",
            "0x5041ed759Dd4aFc3a72b8192C143F72f4724081A",
            "1.5",
            "--chain",
            "sepolia",
            "--max-retries",
            "0",
        ])
        .unwrap();
        assert_eq!(config.chain, "sepolia");
        assert_eq!(config.retry_policy().max_attempts, 1);
        match config.command {
            Command::EstimateGas { op, amount, token, .. } => {
                assert_eq!(TokenOp::from(op), TokenOp::Approve);
                assert_eq!(amount, "1.5");
                assert_eq!(token, "USDT");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_events_address_requires_abi() {
        assert!(Config::try_parse_from(["learn-web3", "events", "--address", "0x1"]).is_err());
        let config =
            Config::try_parse_from(["learn-web3", "events", "--event", "Transfer"]).unwrap();
        assert!(matches!(config.command, Command::Events { event: Some(_), .. }));
    }

    #[test]
    fn test_watch_option() {
        let config = Config::try_parse_from(["learn-web3", "token-txs", "--watch", "30"]).unwrap();
        assert!(matches!(
            config.command,
            Command::TokenTxs {
                watch: Some(30),
                ..
            }
        ));
        let config = Config::try_parse_from(["learn-web3", "events", "--watch", "12"]).unwrap();
        assert!(matches!(config.command, Command::Events { watch: Some(12), .. }));
        assert!(
            Config::try_parse_from(["learn-web3", "events", "--watch", "12", "--export", "e.csv"])
                .is_err()
        );
    }
}
