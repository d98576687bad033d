use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::RpcError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::transaction::parse_hex_to_u64;
use crate::models::{Block, TransactionReceipt};

/// Read access to one EVM chain
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Network id used for signature verification
    async fn chain_id(&self) -> Result<u64, RpcError>;

    /// Block with full transaction objects; `BlockNotFound` past the chain tip
    async fn block_by_number(&self, number: u64) -> Result<Block, RpcError>;

    async fn transaction_receipt(&self, hash: B256) -> Result<TransactionReceipt, RpcError>;

    /// Read-only contract call at the latest block
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[serde(default)]
    result: Option<Value>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// JSON-RPC over HTTP chain client
pub struct RpcClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Dial an endpoint with a per-request timeout
    pub fn new_with_config(endpoint: String, timeout_seconds: u64) -> Result<Self, RpcError> {
        let context = LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", json!(endpoint))
            .with_metadata("timeout_seconds", json!(timeout_seconds));
        context.info("Initializing RPC client");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RpcError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            timeout_seconds,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the raw `result`, which may be JSON `null`
    async fn make_request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let monitor = PerformanceMonitor::new(&format!("rpc_{}", method));
        let result = self.send(&request).await;
        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call(method, duration, result.is_ok());

        result
    }

    async fn send(&self, request: &JsonRpcRequest) -> Result<Value, RpcError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify_http_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Connection(format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.text().await.map_err(|e| self.classify_http_error(e))?;
        let rpc_response: JsonRpcResponse = serde_json::from_str(&body)?;

        if let Some(error) = rpc_response.error {
            return Err(RpcError::Method {
                code: error.code,
                message: error.message,
            });
        }

        Ok(rpc_response.result.unwrap_or(Value::Null))
    }

    fn classify_http_error(&self, e: reqwest::Error) -> RpcError {
        if e.is_timeout() {
            RpcError::Timeout { seconds: self.timeout_seconds }
        } else if e.is_connect() {
            RpcError::Connection(e.to_string())
        } else {
            RpcError::Http(e)
        }
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let result = self.make_request("eth_chainId", vec![]).await?;
        let hex_string = result
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("Chain id is not a string".to_string()))?;
        parse_hex_to_u64(hex_string)
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, RpcError> {
        let params = vec![
            Value::String(format!("0x{:x}", number)),
            Value::Bool(true), // Include full transaction objects
        ];

        let result = self.make_request("eth_getBlockByNumber", params).await?;
        if result.is_null() {
            return Err(RpcError::BlockNotFound { block_number: number });
        }

        let block = Block::from_rpc(result)?;
        LogContext::new("rpc_client", "block_by_number")
            .with_block_number(number)
            .with_metadata("transaction_count", json!(block.transactions.len()))
            .trace(&format!("Retrieved block {} with {} transactions", number, block.transactions.len()));
        Ok(block)
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<TransactionReceipt, RpcError> {
        let hash_hex = format!("{:#x}", hash);
        let result = self
            .make_request("eth_getTransactionReceipt", vec![Value::String(hash_hex.clone())])
            .await?;
        if result.is_null() {
            return Err(RpcError::ReceiptNotFound(hash_hex));
        }

        Ok(serde_json::from_value(result)?)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        let params = vec![
            json!({ "to": format!("{:#x}", to), "data": data }),
            Value::String("latest".to_string()),
        ];

        let result = self.make_request("eth_call", params).await?;
        if result.is_null() {
            return Err(RpcError::InvalidResponse("eth_call returned null".to_string()));
        }

        Ok(serde_json::from_value(result)?)
    }
}
