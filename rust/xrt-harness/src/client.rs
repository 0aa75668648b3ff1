// RPC client for communicating with an XRT dev node over HTTP or WebSocket

use crate::error::{HarnessError, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use xrt_devnode::rpc::{
    BlockInfo, CallRequest, HealthStatus, JsonRpcError, JsonRpcId, JsonRpcRequest,
    JsonRpcResponse, ReceiptInfo, TransactionRequest, REJECTED_ERROR_CODE, REVERT_ERROR_CODE,
};
use xrt_devnode::types::{Address, Balance, BlockNumber, Hash, Nonce};

/// Moves one JSON-RPC request to the node and its response back
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;

    fn endpoint(&self) -> &str;

    /// Release the connection, if the transport holds one
    async fn close(&self) {}
}

/// JSON-RPC over HTTP POST
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| HarnessError::Transport(format!("Network error: {}", e)))?;

        if !response.status().is_success() {
            return Err(HarnessError::Transport(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| HarnessError::Decode(format!("Parse error: {}", e)))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// JSON-RPC over a single WebSocket connection
///
/// Requests are serialized through the socket lock, so each response is read
/// by the caller that sent the matching request.
pub struct WsTransport {
    url: String,
    stream: Mutex<WsStream>,
}

impl WsTransport {
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| HarnessError::Transport(format!("WebSocket connect to {}: {}", url, e)))?;
        Ok(Self {
            url: url.to_string(),
            stream: Mutex::new(stream),
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let text = serde_json::to_string(&request)?;
        let mut stream = self.stream.lock().await;

        stream
            .send(Message::Text(text))
            .await
            .map_err(|e| HarnessError::Transport(format!("WebSocket send: {}", e)))?;

        while let Some(message) = stream.next().await {
            let message =
                message.map_err(|e| HarnessError::Transport(format!("WebSocket read: {}", e)))?;
            match message {
                Message::Text(text) => {
                    let response: JsonRpcResponse = serde_json::from_str(&text)?;
                    if response.id == request.id {
                        return Ok(response);
                    }
                    trace!("Skipping response for id {:?}", response.id);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        Err(HarnessError::Transport(format!(
            "WebSocket {} closed before answering {}",
            self.url, request.method
        )))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }

    /// Send a close frame; later requests fail with a transport error
    async fn close(&self) {
        let mut stream = self.stream.lock().await;
        let _ = stream.close(None).await;
    }
}

/// Typed JSON-RPC client for the dev node
pub struct RpcClient {
    transport: Box<dyn Transport>,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Connect to `http://` or `ws://` endpoint and check the node answers
    pub async fn connect(url: &str) -> Result<Self> {
        let transport: Box<dyn Transport> = if url.starts_with("ws://") || url.starts_with("wss://") {
            Box::new(WsTransport::connect(url).await?)
        } else if url.starts_with("http://") || url.starts_with("https://") {
            Box::new(HttpTransport::new(url))
        } else {
            return Err(HarnessError::Config(format!("Unsupported endpoint: {}", url)));
        };

        let client = Self::with_transport(transport);
        let health = client.health().await?;
        if !health.healthy {
            return Err(HarnessError::Infrastructure(format!(
                "Node at {} reports unhealthy",
                url
            )));
        }
        debug!(endpoint = url, block = health.block_height, "Connected to node");
        Ok(client)
    }

    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            request_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    pub async fn close(&self) {
        self.transport.close().await;
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Make a JSON-RPC call and decode its result
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id();
        let request = JsonRpcRequest::new(method, params, id);
        trace!(method, id, "RPC request");

        let response = self.transport.request(request).await?;
        if response.id != JsonRpcId::Number(id as i64) {
            return Err(HarnessError::Decode(format!(
                "Response id {:?} does not match request {}",
                response.id, id
            )));
        }

        if let Some(error) = response.error {
            return Err(map_rpc_error(error));
        }

        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| HarnessError::Decode(format!("{}: {}", method, e)))
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.call("system_health", json!([])).await
    }

    pub async fn client_version(&self) -> Result<String> {
        self.call("web3_clientVersion", json!([])).await
    }

    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.call("eth_accounts", json!([])).await
    }

    pub async fn block_number(&self) -> Result<BlockNumber> {
        self.call("eth_blockNumber", json!([])).await
    }

    pub async fn gas_limit(&self) -> Result<u64> {
        self.call("eth_gasLimit", json!([])).await
    }

    pub async fn balance(&self, address: &Address) -> Result<Balance> {
        let value: String = self.call("eth_getBalance", json!([address, "latest"])).await?;
        value
            .parse()
            .map_err(|_| HarnessError::Decode(format!("balance {:?}", value)))
    }

    pub async fn transaction_count(&self, address: &Address) -> Result<Nonce> {
        self.call("eth_getTransactionCount", json!([address, "latest"])).await
    }

    /// Contract kind as hex, `0x` for plain accounts
    pub async fn code(&self, address: &Address) -> Result<String> {
        self.call("eth_getCode", json!([address, "latest"])).await
    }

    pub async fn block(&self, number: BlockNumber) -> Result<Option<BlockInfo>> {
        self.call("eth_getBlockByNumber", json!([number])).await
    }

    pub async fn receipt(&self, hash: &Hash) -> Result<Option<ReceiptInfo>> {
        self.call("eth_getTransactionReceipt", json!([hash])).await
    }

    pub async fn send_transaction(&self, request: &TransactionRequest) -> Result<Hash> {
        self.call("eth_sendTransaction", json!([request])).await
    }

    /// Read-only execution against the latest block
    pub async fn eth_call(&self, request: &CallRequest) -> Result<Value> {
        self.call("eth_call", json!([request, "latest"])).await
    }

    pub async fn snapshot(&self) -> Result<u64> {
        let id: String = self.call("evm_snapshot", json!([])).await?;
        let hex = id.trim_start_matches("0x");
        u64::from_str_radix(hex, 16).map_err(|_| HarnessError::Decode(format!("snapshot id {:?}", id)))
    }

    pub async fn revert(&self, id: u64) -> Result<bool> {
        self.call("evm_revert", json!([format!("0x{:x}", id)])).await
    }

    pub async fn mine(&self) -> Result<BlockNumber> {
        self.call("evm_mine", json!([])).await
    }
}

/// Node error codes to harness errors
fn map_rpc_error(error: JsonRpcError) -> HarnessError {
    match error.code {
        REVERT_ERROR_CODE => {
            let data = error.data.unwrap_or(Value::Null);
            let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
            HarnessError::Reverted {
                reason: text("reason").unwrap_or(error.message),
                kind: text("kind").unwrap_or_else(|| "unknown".to_string()),
                tx_hash: text("txHash").and_then(|h| h.parse().ok()),
            }
        }
        REJECTED_ERROR_CODE => HarnessError::Rejected(error.message),
        code => HarnessError::Rpc {
            code,
            message: error.message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Replays canned results and records requests
    struct MockTransport {
        results: StdMutex<Vec<std::result::Result<Value, JsonRpcError>>>,
        seen: StdMutex<Vec<String>>,
    }

    impl MockTransport {
        fn new(results: Vec<std::result::Result<Value, JsonRpcError>>) -> Self {
            Self {
                results: StdMutex::new(results),
                seen: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
            self.seen.lock().unwrap().push(request.method.clone());
            let next = self.results.lock().unwrap().remove(0);
            Ok(match next {
                Ok(value) => JsonRpcResponse::success(request.id, value),
                Err(error) => JsonRpcResponse::error(request.id, error),
            })
        }

        fn endpoint(&self) -> &str {
            "mock://"
        }
    }

    fn client(results: Vec<std::result::Result<Value, JsonRpcError>>) -> RpcClient {
        RpcClient::with_transport(Box::new(MockTransport::new(results)))
    }

    #[tokio::test]
    async fn test_decodes_results() {
        let c = client(vec![
            Ok(json!(4)),
            Ok(json!("1000000000000000000000")),
            Ok(json!("0x2a")),
        ]);
        assert_eq!(c.block_number().await.unwrap(), 4);
        assert_eq!(c.balance(&Address::ZERO).await.unwrap(), 1_000_000_000_000_000_000_000);
        assert_eq!(c.snapshot().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_maps_revert() {
        let hash = Hash::hash(b"tx");
        let c = client(vec![Err(JsonRpcError {
            code: REVERT_ERROR_CODE,
            message: "VM Exception while processing transaction: invalid opcode".to_string(),
            data: Some(json!({
                "reason": "invalid opcode",
                "kind": "invalid_operation",
                "txHash": hash,
            })),
        })]);
        let err = c.block_number().await.unwrap_err();
        match err {
            HarnessError::Reverted { reason, kind, tx_hash } => {
                assert_eq!(reason, "invalid opcode");
                assert_eq!(kind, "invalid_operation");
                assert_eq!(tx_hash, Some(hash));
            }
            other => panic!("expected revert, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_maps_rejection_and_other_codes() {
        let c = client(vec![
            Err(JsonRpcError::transaction_rejected("Invalid nonce")),
            Err(JsonRpcError::method_not_found("eth_foo")),
        ]);
        assert!(matches!(c.accounts().await, Err(HarnessError::Rejected(_))));
        assert!(matches!(
            c.accounts().await,
            Err(HarnessError::Rpc { code: -32601, .. })
        ));
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let c = client(vec![Ok(json!("not-a-number"))]);
        assert!(matches!(c.block_number().await, Err(HarnessError::Decode(_))));
    }

    #[tokio::test]
    async fn test_rejects_unknown_scheme() {
        assert!(matches!(
            RpcClient::connect("ftp://localhost:1").await,
            Err(HarnessError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_fails_without_node() {
        // Bind then drop to get a port nobody listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let result = RpcClient::connect(&format!("http://127.0.0.1:{}/", port)).await;
        assert!(matches!(result, Err(HarnessError::Transport(_))));
    }
}
