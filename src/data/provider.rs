use std::future::{Future, IntoFuture};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use crate::error::{AppError, Result};

/// Read-only node access: code, native balance and `eth_call`.
#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn code(&self, address: Address) -> Result<Bytes>;

    async fn balance(&self, address: Address) -> Result<U256>;

    /// Execute `calldata` against `to` at the latest block and return the raw output.
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes>;
}

/// HTTP JSON-RPC provider with a per-call timeout.
///
/// We use a trait-object-based wrapper to avoid spelling out the full generic type.
pub struct EthProvider {
    provider: Box<dyn Provider + Send + Sync>,
    rpc_url: String,
    timeout: Duration,
}

impl EthProvider {
    /// Build a provider for `rpc_url`. No request is made until the first call.
    pub fn connect(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| AppError::validation(format!("invalid RPC URL {rpc_url:?}: {e}")))?;
        let provider = ProviderBuilder::new().on_http(url);
        Ok(Self {
            provider: Box::new(provider),
            rpc_url: rpc_url.to_string(),
            timeout,
        })
    }

    async fn timed<T, E, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AppError::Rpc(e.to_string())),
            Err(_) => Err(AppError::Transport(format!(
                "RPC call to {} timed out after {:?}",
                self.rpc_url, self.timeout
            ))),
        }
    }
}

#[async_trait]
impl ContractReader for EthProvider {
    async fn code(&self, address: Address) -> Result<Bytes> {
        self.timed(self.provider.get_code_at(address).into_future())
            .await
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.timed(self.provider.get_balance(address).into_future())
            .await
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().to(to).input(calldata.into());
        self.timed(self.provider.call(tx).into_future()).await
    }
}
