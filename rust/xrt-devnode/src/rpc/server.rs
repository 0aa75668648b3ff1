// Server RPC - JSON-RPC server (HTTP + WebSocket) using warp
//
// The dev node is owned by a single event-loop task. Handlers never touch it
// directly: each request is turned into an `RpcCall` carrying a oneshot reply
// channel and sent over an mpsc channel, which serializes all state access.

use crate::node::NodeError;
use crate::rpc::types::{
    parse_param, parse_quantity, param, BlockInfo, BlockTag, CallRequest, HealthStatus,
    JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse, ReceiptInfo, TransactionRequest,
};
use crate::types::*;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warp::hyper::body::Bytes;
use warp::ws::{Message, WebSocket, Ws};
use warp::Filter;

// =============================================================================
// RPC REQUEST/RESPONSE TYPES FOR CHANNEL
// =============================================================================

/// Internal RPC request sent over channel
pub enum RpcCall {
    ChainId(oneshot::Sender<u64>),
    Accounts(oneshot::Sender<Vec<Address>>),
    BlockNumber(oneshot::Sender<BlockNumber>),
    GasLimit(oneshot::Sender<Gas>),
    GasPrice(oneshot::Sender<Balance>),
    GetBalance(Address, oneshot::Sender<Balance>),
    GetTransactionCount(Address, oneshot::Sender<Nonce>),
    GetCode(Address, oneshot::Sender<String>),
    GetBlock(BlockTag, oneshot::Sender<Option<BlockInfo>>),
    GetReceipt(Hash, oneshot::Sender<Option<ReceiptInfo>>),
    SendTransaction(TransactionRequest, oneshot::Sender<Result<Hash, NodeError>>),
    Call(CallRequest, oneshot::Sender<Result<Value, NodeError>>),
    Snapshot(oneshot::Sender<u64>),
    Revert(u64, oneshot::Sender<bool>),
    Mine(oneshot::Sender<BlockNumber>),
    SystemHealth(oneshot::Sender<HealthStatus>),
}

/// Channel sender for RPC calls
pub type RpcSender = mpsc::UnboundedSender<RpcCall>;

/// State shared with warp handlers
#[derive(Clone)]
pub struct RpcState {
    /// Channel to send requests to the node
    pub tx: RpcSender,
}

impl RpcState {
    pub fn new(tx: RpcSender) -> Self {
        Self { tx }
    }

    /// Send a call and wait for the node's answer
    async fn ask<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RpcCall,
    ) -> Result<T, JsonRpcError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .map_err(|_| JsonRpcError::internal_error("Node unavailable"))?;
        rx.await
            .map_err(|_| JsonRpcError::internal_error("Node dropped the request"))
    }
}

// =============================================================================
// RPC SERVER
// =============================================================================

/// JSON-RPC server
pub struct RpcServer {
    addr: SocketAddr,
    max_request_size: u64,
}

impl RpcServer {
    pub fn new(config: &RpcConfig) -> Self {
        Self {
            addr: config.socket_addr(),
            max_request_size: config.max_request_size,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind and serve in the background; fails immediately if the address is taken
    pub async fn start_background(self, rpc_tx: RpcSender) -> Result<RpcServerHandle, RpcServerError> {
        info!("Starting RPC server on {}", self.addr);

        let cors = warp::cors()
            .allow_any_origin()
            .allow_methods(vec!["GET", "POST", "OPTIONS"])
            .allow_headers(vec!["Content-Type", "Accept"]);

        let routes = routes(RpcState::new(rpc_tx), self.max_request_size)
            .with(cors)
            .with(warp::log("xrt_devnode::rpc"));

        let (tx, rx) = oneshot::channel::<()>();

        let (bound_addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(self.addr, async {
                rx.await.ok();
            })
            .map_err(|e| RpcServerError::BindError(format!("{}: {}", self.addr, e)))?;

        info!("RPC server ready on http://{} (ws://{})", bound_addr, bound_addr);

        let task = tokio::spawn(server);

        Ok(RpcServerHandle {
            addr: bound_addr,
            shutdown_tx: Some(tx),
            task: Some(task),
        })
    }
}

/// Handle for a running RPC server
pub struct RpcServerHandle {
    /// Bound address (the real port when 0 was requested)
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// How long `stop` waits for open connections to drain
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

impl RpcServerHandle {
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown without waiting
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Signal shutdown and wait until the listener is closed
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!("RPC server did not drain in {:?}, aborting", SHUTDOWN_GRACE);
                task.abort();
                let _ = task.await;
            }
        }
        info!("RPC server on {} stopped", self.addr);
    }
}

impl Drop for RpcServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// =============================================================================
// ROUTES
// =============================================================================

/// WebSocket upgrade and HTTP POST on `/`, health check on `/health`
pub fn routes(
    state: RpcState,
    max_request_size: u64,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let ws = warp::path::end()
        .and(warp::ws())
        .and(with_state(state.clone()))
        .map(|ws: Ws, state: RpcState| ws.on_upgrade(move |socket| handle_socket(socket, state)));

    let rpc = warp::path::end()
        .and(warp::post())
        .and(warp::body::content_length_limit(max_request_size))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(handle_http);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_health_check);

    ws.or(rpc).or(health)
}

/// Filter to inject state into handlers
fn with_state(state: RpcState) -> impl Filter<Extract = (RpcState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn handle_http(body: Bytes, state: RpcState) -> Result<impl warp::Reply, Infallible> {
    let response = handle_raw(&body, &state).await;
    Ok(warp::reply::json(&response))
}

/// One WebSocket session; requests are answered in arrival order
async fn handle_socket(socket: WebSocket, state: RpcState) {
    debug!("WebSocket client connected");
    let (mut sink, mut stream) = socket.split();

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        };
        if message.is_close() {
            break;
        }
        if !message.is_text() && !message.is_binary() {
            continue;
        }

        let response = handle_raw(message.as_bytes(), &state).await;
        let text = match serde_json::to_string(&response) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode RPC response: {}", e);
                continue;
            }
        };
        if sink.send(Message::text(text)).await.is_err() {
            break;
        }
    }

    debug!("WebSocket client disconnected");
}

async fn handle_raw(body: &[u8], state: &RpcState) -> JsonRpcResponse {
    match serde_json::from_slice::<JsonRpcRequest>(body) {
        Ok(request) => route_request(request, state).await,
        Err(e) => JsonRpcResponse::error(JsonRpcId::Null, JsonRpcError::parse_error(&e.to_string())),
    }
}

async fn handle_health_check(state: RpcState) -> Result<impl warp::Reply, Infallible> {
    let health = state
        .ask(RpcCall::SystemHealth)
        .await
        .unwrap_or_else(|_| HealthStatus::unavailable());
    Ok(warp::reply::json(&health))
}

// =============================================================================
// REQUEST ROUTING
// =============================================================================

pub fn client_version() -> String {
    format!("xrt-devnode/v{}", env!("CARGO_PKG_VERSION"))
}

/// Route a single JSON-RPC request
pub async fn route_request(request: JsonRpcRequest, state: &RpcState) -> JsonRpcResponse {
    debug!("RPC request: {}", request.method);

    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::error(
            request.id,
            JsonRpcError::invalid_request("Invalid JSON-RPC version"),
        );
    }

    match dispatch(&request.method, &request.params, state).await {
        Ok(result) => JsonRpcResponse::success(request.id, result),
        Err(error) => JsonRpcResponse::error(request.id, error),
    }
}

async fn dispatch(method: &str, params: &Value, state: &RpcState) -> Result<Value, JsonRpcError> {
    let invalid = |e: String| JsonRpcError::invalid_params(&e);

    match method {
        "web3_clientVersion" => Ok(json!(client_version())),

        "net_version" => {
            let id = state.ask(RpcCall::ChainId).await?;
            Ok(json!(id.to_string()))
        }

        "eth_chainId" => {
            let id = state.ask(RpcCall::ChainId).await?;
            Ok(json!(format!("0x{:x}", id)))
        }

        "eth_accounts" => Ok(json!(state.ask(RpcCall::Accounts).await?)),

        "eth_blockNumber" => Ok(json!(state.ask(RpcCall::BlockNumber).await?)),

        "eth_gasLimit" => Ok(json!(state.ask(RpcCall::GasLimit).await?)),

        "eth_gasPrice" => Ok(json!(state.ask(RpcCall::GasPrice).await?.to_string())),

        "eth_getBalance" => {
            let address: Address = parse_param(params, 0).map_err(invalid)?;
            let balance = state.ask(|tx| RpcCall::GetBalance(address, tx)).await?;
            Ok(json!(balance.to_string()))
        }

        "eth_getTransactionCount" => {
            let address: Address = parse_param(params, 0).map_err(invalid)?;
            Ok(json!(state.ask(|tx| RpcCall::GetTransactionCount(address, tx)).await?))
        }

        "eth_getCode" => {
            let address: Address = parse_param(params, 0).map_err(invalid)?;
            Ok(json!(state.ask(|tx| RpcCall::GetCode(address, tx)).await?))
        }

        "eth_getBlockByNumber" => {
            let tag = BlockTag::parse(param(params, 0).unwrap_or(&Value::Null)).map_err(invalid)?;
            Ok(json!(state.ask(|tx| RpcCall::GetBlock(tag, tx)).await?))
        }

        "eth_getTransactionReceipt" => {
            let hash: Hash = parse_param(params, 0).map_err(invalid)?;
            Ok(json!(state.ask(|tx| RpcCall::GetReceipt(hash, tx)).await?))
        }

        "eth_sendTransaction" => {
            let request: TransactionRequest = parse_param(params, 0).map_err(invalid)?;
            let hash = state
                .ask(|tx| RpcCall::SendTransaction(request, tx))
                .await?
                .map_err(JsonRpcError::from)?;
            Ok(json!(hash))
        }

        "eth_call" => {
            let request: CallRequest = parse_param(params, 0).map_err(invalid)?;
            state
                .ask(|tx| RpcCall::Call(request, tx))
                .await?
                .map_err(JsonRpcError::from)
        }

        "evm_snapshot" => {
            let id = state.ask(RpcCall::Snapshot).await?;
            Ok(json!(format!("0x{:x}", id)))
        }

        "evm_revert" => {
            let id = param(params, 0)
                .ok_or_else(|| "missing parameter #0".to_string())
                .and_then(parse_quantity)
                .map_err(invalid)?;
            Ok(json!(state.ask(|tx| RpcCall::Revert(id, tx)).await?))
        }

        "evm_mine" => Ok(json!(state.ask(RpcCall::Mine).await?)),

        "system_health" => Ok(json!(state.ask(RpcCall::SystemHealth).await?)),

        other => Err(JsonRpcError::method_not_found(other)),
    }
}

impl From<NodeError> for JsonRpcError {
    fn from(error: NodeError) -> Self {
        match &error {
            NodeError::InvalidRequest(msg) => JsonRpcError::invalid_params(msg),
            NodeError::UnknownAccount(_) | NodeError::Rejected(_) => {
                JsonRpcError::transaction_rejected(&error.to_string())
            }
            NodeError::Reverted { revert, tx_hash } => JsonRpcError::reverted(revert, *tx_hash),
        }
    }
}

// =============================================================================
// RPC SERVER ERROR
// =============================================================================

/// RPC Server errors
#[derive(Debug, thiserror::Error)]
pub enum RpcServerError {
    #[error("Bind error: {0}")]
    BindError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// =============================================================================
// RPC CONFIG
// =============================================================================

/// RPC server configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Listen address
    pub address: IpAddr,
    /// Listen port (0 picks a free port)
    pub port: u16,
    /// Max request size in bytes
    pub max_request_size: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8546,
            max_request_size: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl RpcConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Answers calls with fixed values
    fn spawn_responder() -> RpcState {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(call) = rx.recv().await {
                match call {
                    RpcCall::ChainId(resp) => {
                        let _ = resp.send(DEV_CHAIN_ID);
                    }
                    RpcCall::BlockNumber(resp) => {
                        let _ = resp.send(7);
                    }
                    RpcCall::GetBalance(_, resp) => {
                        let _ = resp.send(100 * ETHER);
                    }
                    RpcCall::SystemHealth(resp) => {
                        let _ = resp.send(HealthStatus {
                            healthy: true,
                            block_height: 7,
                            accounts: 10,
                        });
                    }
                    _ => {}
                }
            }
        });
        RpcState::new(tx)
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest::new(method, params, 1)
    }

    #[test]
    fn test_rpc_config_default() {
        let config = RpcConfig::default();
        assert_eq!(config.port, 8546);
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8546");
    }

    #[tokio::test]
    async fn test_json_rpc_routing() {
        let state = spawn_responder();

        let response = route_request(request("eth_blockNumber", Value::Null), &state).await;
        assert_eq!(response.result, Some(json!(7)));

        let response = route_request(request("net_version", Value::Null), &state).await;
        assert_eq!(response.result, Some(json!("1337")));

        let response = route_request(
            request("eth_getBalance", json!([Address::from_bytes([1; 20])])),
            &state,
        )
        .await;
        assert_eq!(response.result, Some(json!("100000000000000000000")));
    }

    #[tokio::test]
    async fn test_routing_errors() {
        let state = spawn_responder();

        let response = route_request(request("eth_mineGold", Value::Null), &state).await;
        assert_eq!(response.error.unwrap().code, -32601);

        let response = route_request(request("eth_getBalance", json!(["0x12"])), &state).await;
        assert_eq!(response.error.unwrap().code, -32602);

        let mut bad_version = request("eth_blockNumber", Value::Null);
        bad_version.jsonrpc = "1.0".to_string();
        let response = route_request(bad_version, &state).await;
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_node_unavailable() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let state = RpcState::new(tx);
        let response = route_request(request("eth_blockNumber", Value::Null), &state).await;
        assert_eq!(response.error.unwrap().code, -32603);
    }

    #[tokio::test]
    async fn test_http_routes() {
        let filter = routes(spawn_responder(), 1024 * 1024);

        let reply = warp::test::request()
            .method("POST")
            .path("/")
            .body(r#"{"jsonrpc":"2.0","method":"eth_chainId","params":[],"id":3}"#)
            .reply(&filter)
            .await;
        assert_eq!(reply.status(), 200);
        let body: JsonRpcResponse = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(body.result, Some(json!("0x539")));
        assert_eq!(body.id, JsonRpcId::Number(3));

        let reply = warp::test::request()
            .method("POST")
            .path("/")
            .body("not json")
            .reply(&filter)
            .await;
        let body: JsonRpcResponse = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(body.error.unwrap().code, -32700);

        let reply = warp::test::request().path("/health").reply(&filter).await;
        let health: HealthStatus = serde_json::from_slice(reply.body()).unwrap();
        assert!(health.healthy);
    }

    #[tokio::test]
    async fn test_websocket_route() {
        let filter = routes(spawn_responder(), 1024 * 1024);
        let mut client = warp::test::ws()
            .path("/")
            .handshake(filter)
            .await
            .expect("handshake");

        client
            .send_text(r#"{"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":9}"#)
            .await;
        let message = client.recv().await.expect("response");
        let body: JsonRpcResponse = serde_json::from_str(message.to_str().unwrap()).unwrap();
        assert_eq!(body.result, Some(json!(7)));
        assert_eq!(body.id, JsonRpcId::Number(9));
    }

    #[tokio::test]
    async fn test_bind_conflict_fails_fast() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = RpcConfig {
            port: 0,
            ..Default::default()
        };
        let first = RpcServer::new(&config).start_background(tx.clone()).await.unwrap();

        let taken = RpcConfig {
            port: first.address().port(),
            ..Default::default()
        };
        let err = RpcServer::new(&taken).start_background(tx).await.err();
        assert!(matches!(err, Some(RpcServerError::BindError(_))));

        first.stop().await;
    }
}
