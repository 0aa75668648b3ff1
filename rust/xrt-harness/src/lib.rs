// XRT harness - node bootstrap, contract deployment and assertions for token test suites

pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod harness;
pub mod ledger;
pub mod units;

#[cfg(test)]
mod tests;

pub use client::{HttpTransport, RpcClient, Transport, WsTransport};
pub use config::{HarnessConfig, TransportKind};
pub use contract::{ContractRef, InterfaceRegistry, ReferenceToken, TxOptions};
pub use error::{HarnessError, Result};
pub use harness::{Harness, NodeHandle};
pub use ledger::{SupplyLedger, SupplyReport};
pub use units::{from_base_units, to_base_units};
