// RPC - JSON-RPC API (HTTP and WebSocket) for interacting with the node

pub mod server;
pub mod types;

// Re-export commonly used types
pub use server::{RpcCall, RpcConfig, RpcSender, RpcServer, RpcServerError, RpcServerHandle, RpcState};
pub use types::{
    BlockInfo, BlockTag, CallData, CallRequest, HealthStatus, JsonRpcError, JsonRpcId,
    JsonRpcRequest, JsonRpcResponse, ReceiptInfo, TransactionRequest, REJECTED_ERROR_CODE,
    REVERT_ERROR_CODE,
};
