// Harness error taxonomy

use std::time::Duration;
use xrt_devnode::types::Hash;

/// Errors surfaced to test steps
///
/// Infrastructure, transport and timeout errors abort a suite. `Reverted`
/// and `Rejected` are contract or node decisions that tests assert on.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Step timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reverted ({kind}): {reason}")]
    Reverted {
        reason: String,
        kind: String,
        tx_hash: Option<Hash>,
    },

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid amount: {0}")]
    Amount(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl HarnessError {
    /// True when a transaction or call was executed and reverted
    pub fn is_revert(&self) -> bool {
        matches!(self, HarnessError::Reverted { .. })
    }

    /// Machine-readable revert kind, e.g. `invalid_operation`
    pub fn revert_kind(&self) -> Option<&str> {
        match self {
            HarnessError::Reverted { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// Hash of the mined transaction that reverted
    pub fn tx_hash(&self) -> Option<Hash> {
        match self {
            HarnessError::Reverted { tx_hash, .. } => *tx_hash,
            _ => None,
        }
    }

    /// Errors that mean the node itself is unusable
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarnessError::Infrastructure(_) | HarnessError::Transport(_) | HarnessError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(e: serde_json::Error) -> Self {
        HarnessError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
