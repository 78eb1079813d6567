use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256, Bytes, hex};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::data::types::{
    ChainConfig, ContractSourceRecord, GasOracle, RawLogEntry, Transaction, parse_quantity,
};
use crate::error::{AppError, Result};

/// `status:"0"` messages that mean "nothing matched" rather than failure.
pub const EMPTY_RESULT_MESSAGES: [&str; 2] = ["No transactions found", "No records found"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Fail,
}

/// The one response shape callers see, whatever the explorer sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub status: Status,
    pub message: String,
    pub result: T,
}

impl Envelope<Value> {
    /// Turn a failed envelope into an error and deserialize a successful one.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T> {
        match self.status {
            Status::Fail => Err(AppError::Api {
                message: self.message,
                detail: None,
            }),
            Status::Ok => serde_json::from_value(self.result)
                .map_err(|e| AppError::MalformedResponse(e.to_string())),
        }
    }
}

/// Fold the explorer's response shapes into an [`Envelope`].
///
/// - `{status:"1", message, result}` is a success.
/// - `{jsonrpc, result}` (proxy calls) is a success; `{jsonrpc, error}` a failure.
/// - `{status:"0"}` with one of [`EMPTY_RESULT_MESSAGES`] is an empty success;
///   any other `status:"0"` is an [`AppError::Api`].
pub fn normalize(body: Value) -> Result<Envelope<Value>> {
    let Value::Object(mut obj) = body else {
        return Err(AppError::MalformedResponse(
            "expected a JSON object".to_string(),
        ));
    };

    if obj.contains_key("jsonrpc") {
        if let Some(error) = obj.remove("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Ok(Envelope {
                status: Status::Fail,
                message,
                result: Value::Null,
            });
        }
        return Ok(Envelope {
            status: Status::Ok,
            message: "OK".to_string(),
            result: obj.remove("result").unwrap_or(Value::Null),
        });
    }

    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let result = obj.remove("result").unwrap_or(Value::Null);

    match obj.get("status").and_then(Value::as_str) {
        Some("1") => Ok(Envelope {
            status: Status::Ok,
            message,
            result,
        }),
        Some("0") if EMPTY_RESULT_MESSAGES.contains(&message.as_str()) => Ok(Envelope {
            status: Status::Ok,
            message: "OK".to_string(),
            result: Value::Array(Vec::new()),
        }),
        Some("0") => {
            let detail = result.as_str().map(str::to_string);
            let message = if message.is_empty() {
                detail.clone().unwrap_or_else(|| "explorer call failed".to_string())
            } else {
                message
            };
            Err(AppError::Api { message, detail })
        }
        other => Err(AppError::MalformedResponse(format!(
            "unrecognized status {other:?}"
        ))),
    }
}

/// One HTTP GET returning a JSON body.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get_json(&self, url: &Url) -> Result<Value>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &Url) -> Result<Value> {
        // Errors are stripped of the URL, which carries the API key.
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transport(format!("HTTP {status}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AppError::Transport(format!("invalid JSON body: {}", e.without_url())))
    }
}

/// Bounded exponential backoff for transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Explorer query parameters in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new(module: &str, action: &str) -> Self {
        Self::default().param("module", module).param("action", action)
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn opt_param(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Paging for `account/txlist` and `account/tokentx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxListOptions {
    pub start_block: u64,
    pub end_block: u64,
    pub page: u32,
    pub offset: u32,
    pub sort: SortOrder,
}

impl Default for TxListOptions {
    fn default() -> Self {
        Self {
            start_block: 0,
            end_block: 99_999_999,
            page: 1,
            offset: 100,
            sort: SortOrder::Desc,
        }
    }
}

/// Filter for `logs/getLogs`. A missing `to_block` means `latest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFilter {
    pub topic0: Option<B256>,
    pub from_block: u64,
    pub to_block: Option<u64>,
    pub page: u32,
    pub offset: u32,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            topic0: None,
            from_block: 0,
            to_block: None,
            page: 1,
            offset: 10,
        }
    }
}

/// Client for an Etherscan-compatible explorer API.
///
/// No caching: every call goes to the network.
pub struct ExplorerClient {
    transport: Arc<dyn HttpTransport>,
    api_key: Option<String>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl ExplorerClient {
    pub fn new(transport: Arc<dyn HttpTransport>, api_key: Option<String>) -> Self {
        Self {
            transport,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Abort in-flight and future calls once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn build_url(&self, chain: &ChainConfig, query: &Query) -> Result<Url> {
        let mut params: Vec<(&str, String)> = vec![("chainid", chain.chain_id.to_string())];
        params.extend(query.params.iter().map(|(k, v)| (k.as_str(), v.clone())));
        if let Some(key) = &self.api_key {
            params.push(("apikey", key.clone()));
        }
        Url::parse_with_params(&chain.explorer_api_url, &params)
            .map_err(|e| AppError::validation(format!("bad explorer URL: {e}")))
    }

    /// Issue one query, retrying transport failures per the retry policy.
    pub async fn call(&self, chain: &ChainConfig, query: &Query) -> Result<Envelope<Value>> {
        let url = self.build_url(chain, query)?;
        let module = query.get("module").unwrap_or_default();
        let action = query.get("action").unwrap_or_default();

        let mut attempt = 1;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(AppError::Cancelled),
                res = self.transport.get_json(&url) => res,
            };

            match outcome.and_then(normalize) {
                Ok(envelope) => return Ok(envelope),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        chain_id = chain.chain_id,
                        module,
                        action,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "explorer call failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(AppError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    tracing::debug!(chain_id = chain.chain_id, module, action, error = %e, "explorer call failed");
                    return Err(e);
                }
            }
        }
    }

    pub async fn call_as<T: DeserializeOwned>(&self, chain: &ChainConfig, query: &Query) -> Result<T> {
        self.call(chain, query).await?.into_result()
    }

    /// `account/txlist` for an address.
    pub async fn transactions(
        &self,
        chain: &ChainConfig,
        address: Address,
        options: &TxListOptions,
    ) -> Result<Vec<Transaction>> {
        let query = paged(Query::new("account", "txlist").param("address", address), options);
        let result: Value = self.call_as(chain, &query).await?;
        rows(result)
    }

    /// `account/tokentx` for a token contract.
    pub async fn token_transactions(
        &self,
        chain: &ChainConfig,
        contract: Address,
        options: &TxListOptions,
    ) -> Result<Vec<Transaction>> {
        let query = paged(
            Query::new("account", "tokentx").param("contractaddress", contract),
            options,
        );
        let result: Value = self.call_as(chain, &query).await?;
        rows(result)
    }

    /// `logs/getLogs` for a contract.
    pub async fn event_logs(
        &self,
        chain: &ChainConfig,
        address: Address,
        filter: &LogFilter,
    ) -> Result<Vec<RawLogEntry>> {
        let to_block = filter
            .to_block
            .map(|b| b.to_string())
            .unwrap_or_else(|| "latest".to_string());
        let query = Query::new("logs", "getLogs")
            .param("address", address)
            .param("fromBlock", filter.from_block)
            .param("toBlock", to_block)
            .opt_param("topic0", filter.topic0.map(|t| format!("{t:#x}")))
            .param("page", filter.page)
            .param("offset", filter.offset);
        let result: Value = self.call_as(chain, &query).await?;
        rows(result)
    }

    /// `contract/getsourcecode`; `None` when the explorer returns no rows.
    pub async fn source_code(
        &self,
        chain: &ChainConfig,
        address: Address,
    ) -> Result<Option<ContractSourceRecord>> {
        let query = Query::new("contract", "getsourcecode").param("address", address);
        let result: Value = self.call_as(chain, &query).await?;
        let records: Vec<ContractSourceRecord> = rows(result)?;
        Ok(records.into_iter().next())
    }

    pub async fn gas_oracle(&self, chain: &ChainConfig) -> Result<GasOracle> {
        self.call_as(chain, &Query::new("gastracker", "gasoracle"))
            .await
    }

    /// `proxy/eth_estimateGas`, returning gas units.
    pub async fn estimate_gas(
        &self,
        chain: &ChainConfig,
        to: Address,
        data: &Bytes,
        from: Option<Address>,
    ) -> Result<u64> {
        let query = Query::new("proxy", "eth_estimateGas")
            .param("to", to)
            .param("data", format!("0x{}", hex::encode(data)))
            .opt_param("from", from);
        let result: String = self.call_as(chain, &query).await?;
        parse_quantity(&result)
            .ok_or_else(|| AppError::MalformedResponse(format!("bad gas estimate {result:?}")))
    }

    /// `proxy/eth_blockNumber`.
    pub async fn block_number(&self, chain: &ChainConfig) -> Result<u64> {
        let result: String = self
            .call_as(chain, &Query::new("proxy", "eth_blockNumber"))
            .await?;
        parse_quantity(&result)
            .ok_or_else(|| AppError::MalformedResponse(format!("bad block number {result:?}")))
    }
}

fn paged(query: Query, options: &TxListOptions) -> Query {
    query
        .param("startblock", options.start_block)
        .param("endblock", options.end_block)
        .param("page", options.page)
        .param("offset", options.offset)
        .param("sort", options.sort.as_str())
}

/// List endpoints occasionally return a non-array `result`; treat it as empty.
fn rows<T: DeserializeOwned>(result: Value) -> Result<Vec<T>> {
    match result {
        Value::Array(_) => serde_json::from_value(result)
            .map_err(|e| AppError::MalformedResponse(e.to_string())),
        _ => Ok(Vec::new()),
    }
}
