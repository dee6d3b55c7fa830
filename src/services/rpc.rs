//! L1 JSON-RPC Client
//!
//! Thin wrapper over `reqwest` for the handful of Ethereum JSON-RPC methods
//! the monitor needs: `eth_blockNumber` and `eth_call`. Transient failures
//! are retried with backoff and every call races the caller's CancelContext.

use super::retry::{with_retry, RetryConfig};
use crate::cancel::{CancelContext, CancelReason};
use crate::monitor::BlockNumberSource;
use crate::types::BlockNumber;
use alloy::primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// JSON-RPC error codes that indicate the node is throttling us
const LIMIT_EXCEEDED: i64 = -32005;

/// Structured RPC failure
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// Network/connection error (timeout, DNS, refused)
    #[error("RPC transport error: {0}")]
    Transport(String),
    /// Endpoint answered with a non-2xx status
    #[error("RPC endpoint returned HTTP {0}")]
    Status(u16),
    /// Node returned a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// Response body could not be interpreted
    #[error("invalid RPC response: {0}")]
    Decode(String),
    #[error("RPC call cancelled: {0}")]
    Cancelled(CancelReason),
}

impl RpcError {
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            RpcError::Transport("request timed out".to_string())
        } else if err.is_connect() {
            RpcError::Transport("connection failed".to_string())
        } else {
            RpcError::Transport(err.to_string())
        }
    }

    /// Whether this error is worth retrying with backoff
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport(_) => true,
            RpcError::Status(status) => *status == 429 || *status >= 500,
            RpcError::Rpc { code, .. } => *code == LIMIT_EXCEEDED,
            RpcError::Decode(_) | RpcError::Cancelled(_) => false,
        }
    }
}

/// Block at which an `eth_call` is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Number(BlockNumber),
}

impl BlockTag {
    fn to_param(self) -> serde_json::Value {
        match self {
            BlockTag::Latest => serde_json::Value::from("latest"),
            BlockTag::Number(n) => serde_json::Value::from(format!("{:#x}", n)),
        }
    }
}

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: serde_json::Value,
    id: u64,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    retry: RetryConfig,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration, retry: RetryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url: url.to_string(),
            retry,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current head block number
    pub async fn block_number(&self, ctx: &CancelContext) -> Result<BlockNumber, RpcError> {
        let result = self
            .request(ctx, "eth_blockNumber", serde_json::json!([]))
            .await?;
        parse_quantity(&result)
    }

    /// Execute a read-only contract call and return the raw return data
    pub async fn call(
        &self,
        ctx: &CancelContext,
        to: Address,
        data: &[u8],
        block: BlockTag,
    ) -> Result<Vec<u8>, RpcError> {
        let params = serde_json::json!([
            {
                "to": format!("{:?}", to),
                "data": format!("0x{}", hex::encode(data)),
            },
            block.to_param()
        ]);
        let result = self.request(ctx, "eth_call", params).await?;
        parse_data(&result)
    }

    async fn request(
        &self,
        ctx: &CancelContext,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        with_retry(ctx, &self.retry, method, || self.send(method, params.clone())).await
    }

    async fn send(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        debug!(method, id = request.id, "Sending RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status(status.as_u16()));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))?;
        into_result(body)
    }
}

#[async_trait]
impl BlockNumberSource for RpcClient {
    async fn fetch_block_number(&self, ctx: &CancelContext) -> anyhow::Result<BlockNumber> {
        Ok(self.block_number(ctx).await?)
    }
}

fn into_result(body: JsonRpcResponse) -> Result<serde_json::Value, RpcError> {
    if let Some(error) = body.error {
        return Err(RpcError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    body.result
        .ok_or_else(|| RpcError::Decode("response has neither result nor error".to_string()))
}

/// Parse a hex quantity such as `"0x1b4"`
fn parse_quantity(value: &serde_json::Value) -> Result<u64, RpcError> {
    let text = value
        .as_str()
        .ok_or_else(|| RpcError::Decode(format!("expected hex quantity, got {}", value)))?;
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::Decode(format!("quantity missing 0x prefix: {}", text)))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::Decode(format!("bad quantity {}: {}", text, e)))
}

/// Parse hex return data such as `"0x0000..01"`
fn parse_data(value: &serde_json::Value) -> Result<Vec<u8>, RpcError> {
    let text = value
        .as_str()
        .ok_or_else(|| RpcError::Decode(format!("expected hex data, got {}", value)))?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(digits).map_err(|e| RpcError::Decode(format!("bad return data: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::services::mock_rpc::{self, MockRpc};

    fn client(url: &str, max_retries: u32) -> RpcClient {
        let retry = RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        RpcClient::new(url, Duration::from_secs(5), retry)
    }

    fn response(json: &str) -> JsonRpcResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&serde_json::json!("0x64")).unwrap(), 100);
        assert_eq!(parse_quantity(&serde_json::json!("0x0")).unwrap(), 0);
        assert!(parse_quantity(&serde_json::json!("64")).is_err());
        assert!(parse_quantity(&serde_json::json!(100)).is_err());
    }

    #[test]
    fn test_parse_data() {
        assert_eq!(parse_data(&serde_json::json!("0x")).unwrap(), Vec::<u8>::new());
        assert_eq!(parse_data(&serde_json::json!("0x00ff")).unwrap(), vec![0x00, 0xff]);
        assert!(parse_data(&serde_json::json!("0xzz")).is_err());
    }

    #[test]
    fn test_error_object_becomes_rpc_error() {
        let body = response(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"limit exceeded"}}"#,
        );
        let err = into_result(body).unwrap_err();
        assert!(matches!(err, RpcError::Rpc { code: -32005, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_result_is_returned() {
        let body = response(r#"{"jsonrpc":"2.0","id":1,"result":"0x10"}"#);
        assert_eq!(into_result(body).unwrap(), serde_json::json!("0x10"));

        let empty = response(r#"{"jsonrpc":"2.0","id":1}"#);
        assert!(matches!(into_result(empty), Err(RpcError::Decode(_))));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RpcError::Transport("reset".to_string()).is_retryable());
        assert!(RpcError::Status(429).is_retryable());
        assert!(RpcError::Status(502).is_retryable());
        assert!(!RpcError::Status(404).is_retryable());
        assert!(!RpcError::Rpc {
            code: 3,
            message: "execution reverted".to_string()
        }
        .is_retryable());
        assert!(!RpcError::Cancelled(CancelReason::Interrupted).is_retryable());
    }

    #[test]
    fn test_block_tag_param() {
        assert_eq!(BlockTag::Latest.to_param(), serde_json::json!("latest"));
        assert_eq!(BlockTag::Number(100).to_param(), serde_json::json!("0x64"));
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits_call() {
        // Port 9 (discard) is never contacted: the context is already cancelled.
        let client = RpcClient::new(
            "http://127.0.0.1:9",
            Duration::from_secs(1),
            RetryConfig::default(),
        );
        let (canceller, ctx) = cancel_pair();
        canceller.cancel(CancelReason::Interrupted);

        let err = client.block_number(&ctx).await.unwrap_err();
        assert!(matches!(err, RpcError::Cancelled(CancelReason::Interrupted)));
    }

    #[tokio::test]
    async fn test_block_number_round_trip() {
        let server = MockRpc::start(|req| mock_rpc::result(req, serde_json::json!("0x64"))).await;

        let block = client(&server.url, 0).block_number(&CancelContext::never()).await.unwrap();

        assert_eq!(block, 100);
        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["jsonrpc"], "2.0");
        assert_eq!(requests[0]["method"], "eth_blockNumber");
        assert_eq!(requests[0]["params"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_call_sends_target_data_and_block() {
        let server = MockRpc::start(|req| mock_rpc::result(req, serde_json::json!("0x00ff"))).await;
        let to = Address::repeat_byte(0x42);

        let data = client(&server.url, 0)
            .call(&CancelContext::never(), to, &[0xde, 0xad], BlockTag::Number(100))
            .await
            .unwrap();

        assert_eq!(data, vec![0x00, 0xff]);
        let requests = server.requests();
        assert_eq!(requests[0]["method"], "eth_call");
        assert_eq!(requests[0]["params"][0]["to"], format!("{:?}", to));
        assert_eq!(requests[0]["params"][0]["data"], "0xdead");
        assert_eq!(requests[0]["params"][1], "0x64");
    }

    #[tokio::test]
    async fn test_non_success_status_maps_to_status_error() {
        let server = MockRpc::start(|_| (404, serde_json::json!({}))).await;

        let err = client(&server.url, 3)
            .block_number(&CancelContext::never())
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::Status(404)));
        // 404 is permanent, so no retries were made
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockRpc::start(|_| (503, serde_json::json!({}))).await;

        let err = client(&server.url, 2)
            .block_number(&CancelContext::never())
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::Status(503)));
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_error_object_is_surfaced() {
        let server =
            MockRpc::start(|req| mock_rpc::rpc_error(req, 3, "execution reverted")).await;

        let err = client(&server.url, 3)
            .call(&CancelContext::never(), Address::ZERO, &[], BlockTag::Latest)
            .await
            .unwrap_err();

        match err {
            RpcError::Rpc { code, message } => {
                assert_eq!(code, 3);
                assert_eq!(message, "execution reverted");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(server.requests()[0]["params"][1], "latest");
    }
}
