// Types RPC - Structures for JSON-RPC 2.0 requests and responses
use crate::contracts::{ContractInit, Revert};
use crate::types::primitives::balance_str;
use crate::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// JSON-RPC 2.0 PROTOCOL TYPES
// =============================================================================

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,

    /// Method name (e.g., "eth_sendTransaction")
    pub method: String,

    /// Method parameters
    #[serde(default)]
    pub params: Value,

    /// Request ID
    #[serde(default)]
    pub id: JsonRpcId,
}

impl JsonRpcRequest {
    pub fn new(method: &str, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: JsonRpcId::Number(id as i64),
        }
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version
    pub jsonrpc: String,

    /// Result (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,

    /// Request ID
    pub id: JsonRpcId,
}

impl JsonRpcResponse {
    pub fn success<T: Serialize>(id: JsonRpcId, result: T) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(serde_json::to_value(result).unwrap_or(Value::Null)),
            error: None,
            id,
        }
    }

    pub fn error(id: JsonRpcId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// JSON-RPC Request ID (can be string, number, or null)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(untagged)]
pub enum JsonRpcId {
    Number(i64),
    String(String),
    #[default]
    Null,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Optional additional data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Error code for a mined (or simulated) call that reverted
pub const REVERT_ERROR_CODE: i32 = -32000;

/// Error code for a transaction refused before mining
pub const REJECTED_ERROR_CODE: i32 = -32010;

impl JsonRpcError {
    /// Parse error (-32700)
    pub fn parse_error(message: &str) -> Self {
        Self {
            code: -32700,
            message: format!("Parse error: {}", message),
            data: None,
        }
    }

    /// Invalid request (-32600)
    pub fn invalid_request(message: &str) -> Self {
        Self {
            code: -32600,
            message: format!("Invalid request: {}", message),
            data: None,
        }
    }

    /// Method not found (-32601)
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    /// Invalid params (-32602)
    pub fn invalid_params(message: &str) -> Self {
        Self {
            code: -32602,
            message: format!("Invalid params: {}", message),
            data: None,
        }
    }

    /// Internal error (-32603)
    pub fn internal_error(message: &str) -> Self {
        Self {
            code: -32603,
            message: format!("Internal error: {}", message),
            data: None,
        }
    }

    /// Transaction rejected (-32010)
    pub fn transaction_rejected(reason: &str) -> Self {
        Self {
            code: REJECTED_ERROR_CODE,
            message: format!("Transaction rejected: {}", reason),
            data: None,
        }
    }

    /// Reverted (-32000), `tx_hash` is set when the transaction was mined
    pub fn reverted(revert: &Revert, tx_hash: Option<Hash>) -> Self {
        let mut data = serde_json::json!({
            "reason": revert.to_string(),
            "kind": revert.kind(),
        });
        if let Some(hash) = tx_hash {
            data["txHash"] = serde_json::json!(hash);
        }
        Self {
            code: REVERT_ERROR_CODE,
            message: format!("VM Exception while processing transaction: {}", revert),
            data: Some(data),
        }
    }
}

// =============================================================================
// REQUEST PAYLOADS
// =============================================================================

/// Method invocation carried by `data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallData {
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// `eth_sendTransaction` parameter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<Gas>,

    #[serde(default, with = "balance_str::option", skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<Balance>,

    #[serde(default, with = "balance_str::option", skip_serializing_if = "Option::is_none")]
    pub value: Option<Balance>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Nonce>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CallData>,

    /// Contract to create; mutually exclusive with `to`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<ContractInit>,
}

impl TransactionRequest {
    /// What the transaction does
    pub fn action(&self) -> Result<Action, String> {
        match (&self.to, &self.deploy, &self.data) {
            (None, Some(init), None) => Ok(Action::Deploy {
                contract: init.clone(),
            }),
            (Some(_), Some(_), _) => Err("`to` and `deploy` are mutually exclusive".to_string()),
            (None, Some(_), Some(_)) => Err("a deployment cannot carry call data".to_string()),
            (Some(to), None, Some(data)) => Ok(Action::Call {
                to: *to,
                method: data.method.clone(),
                args: data.args.clone(),
            }),
            (Some(to), None, None) => Ok(Action::Transfer { to: *to }),
            (None, None, _) => Err("missing `to` or `deploy`".to_string()),
        }
    }
}

/// `eth_call` parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<Gas>,
    pub data: CallData,
}

/// Block selector: "latest", "earliest", a number or a 0x-hex number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Earliest,
    Number(BlockNumber),
}

impl BlockTag {
    pub fn parse(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(BlockTag::Latest),
            Value::Number(n) => n
                .as_u64()
                .map(BlockTag::Number)
                .ok_or_else(|| format!("invalid block number {}", n)),
            Value::String(s) => match s.as_str() {
                "latest" | "pending" => Ok(BlockTag::Latest),
                "earliest" => Ok(BlockTag::Earliest),
                _ => parse_quantity(value).map(BlockTag::Number),
            },
            other => Err(format!("invalid block tag {}", other)),
        }
    }
}

/// Unsigned quantity given as a JSON number, a decimal string or a 0x-hex string
pub fn parse_quantity(value: &Value) -> Result<u64, String> {
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(|| format!("invalid quantity {}", n)),
        Value::String(s) => {
            let parsed = match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => s.parse::<u64>(),
            };
            parsed.map_err(|_| format!("invalid quantity {:?}", s))
        }
        other => Err(format!("invalid quantity {}", other)),
    }
}

// =============================================================================
// RESPONSE TYPES
// =============================================================================

/// Block as returned by `eth_getBlockByNumber`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub number: BlockNumber,
    pub hash: Hash,
    pub parent_hash: Hash,
    pub timestamp: Timestamp,
    pub gas_limit: Gas,
    pub gas_used: Gas,
    pub transactions_root: Hash,
    pub transactions: Vec<Hash>,
}

impl From<&Block> for BlockInfo {
    fn from(block: &Block) -> Self {
        Self {
            number: block.header.number,
            hash: block.hash(),
            parent_hash: block.header.parent_hash,
            timestamp: block.header.timestamp,
            gas_limit: block.header.gas_limit,
            gas_used: block.header.gas_used,
            transactions_root: block.header.transactions_root,
            transactions: block.transactions.iter().map(|tx| tx.hash()).collect(),
        }
    }
}

/// Receipt as returned by `eth_getTransactionReceipt`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptInfo {
    pub transaction_hash: Hash,
    pub block_number: BlockNumber,
    pub block_hash: Hash,
    pub from: Address,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    pub gas_used: Gas,
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_kind: Option<String>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl From<&Receipt> for ReceiptInfo {
    fn from(receipt: &Receipt) -> Self {
        Self {
            transaction_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            block_hash: receipt.block_hash,
            from: receipt.from,
            to: receipt.to,
            contract_address: receipt.contract_address,
            gas_used: receipt.gas_used,
            status: receipt.status,
            revert_reason: receipt.revert.as_ref().map(|r| r.reason.clone()),
            revert_kind: receipt.revert.as_ref().map(|r| r.kind.clone()),
            logs: receipt.logs.clone(),
        }
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub healthy: bool,
    pub block_height: BlockNumber,
    pub accounts: usize,
}

impl HealthStatus {
    pub fn unavailable() -> Self {
        Self {
            healthy: false,
            block_height: 0,
            accounts: 0,
        }
    }
}

// =============================================================================
// PARAMETER HELPERS
// =============================================================================

/// Positional parameter `index` of `params`
pub fn param(params: &Value, index: usize) -> Option<&Value> {
    match params {
        Value::Array(items) => items.get(index),
        _ => None,
    }
}

/// Decode positional parameter `index`
pub fn parse_param<T: serde::de::DeserializeOwned>(params: &Value, index: usize) -> Result<T, String> {
    let value = param(params, index).ok_or_else(|| format!("missing parameter #{}", index))?;
    serde_json::from_value(value.clone()).map_err(|e| format!("parameter #{}: {}", index, e))
}

/// Format a wei amount as ether with up to 18 decimals
pub fn format_ether(amount: Balance) -> String {
    let whole = amount / ETHER;
    let frac = amount % ETHER;
    if frac == 0 {
        format!("{} ETH", whole)
    } else {
        let digits = format!("{:018}", frac);
        format!("{}.{} ETH", whole, digits.trim_end_matches('0'))
    }
}
