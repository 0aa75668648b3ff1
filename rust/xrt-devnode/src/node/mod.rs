// Node - dev chain orchestration
pub mod producer;
pub mod service;

pub use producer::{BlockProducer, ExecutionError, ExecutionResult, TransactionExecutor};
pub use service::{DevNode, NodeError};
