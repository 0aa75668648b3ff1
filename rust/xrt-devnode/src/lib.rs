// XRT dev node - instant-mining development chain for token contract tests

pub mod cli;
pub mod contracts;
pub mod execution;
pub mod genesis;
pub mod node;
pub mod rpc;
pub mod storage;
pub mod types;

pub use cli::config::NodeConfig;
pub use cli::runner::{run_node, start_node, RunnerError, RunningNode};
