use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tracing::debug;

use super::InspectionError;

/// Minimal view of the chain the watchdog needs.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64, InspectionError>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Ethereum JSON-RPC over HTTP.
pub struct JsonRpcChainClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl fmt::Debug for JsonRpcChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcChainClient")
            .field("url", &self.url)
            .finish()
    }
}

impl JsonRpcChainClient {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InspectionError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, url))
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Performs one JSON-RPC call and returns its `result` member.
    pub async fn call(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Value, InspectionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(target: "inspection::chain", url = %self.url, method, "json-rpc call");
        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(InspectionError::Rpc(format!(
                "{method}: {} ({})",
                err.message, err.code
            )));
        }
        response.result.ok_or_else(|| {
            InspectionError::Rpc(format!("{method}: empty result"))
        })
    }
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn block_number(&self) -> Result<u64, InspectionError> {
        let value = self.call("eth_blockNumber", json!([])).await?;
        let quantity = value.as_str().ok_or_else(|| {
            InspectionError::Rpc(format!(
                "eth_blockNumber: expected hex string, got {value}"
            ))
        })?;
        parse_quantity(quantity)
    }
}

/// Parses a JSON-RPC hex quantity such as `0x1b4`.
pub fn parse_quantity(raw: &str) -> Result<u64, InspectionError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| {
            InspectionError::Rpc(format!("quantity '{raw}' lacks 0x prefix"))
        })?;

    u64::from_str_radix(digits, 16).map_err(|err| {
        InspectionError::Rpc(format!("invalid quantity '{raw}': {err}"))
    })
}

/// Formats a block number as a JSON-RPC hex quantity.
pub fn format_quantity(value: u64) -> String {
    format!("{value:#x}")
}
