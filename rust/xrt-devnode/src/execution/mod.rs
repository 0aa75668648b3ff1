// Execution - gas metering for the native contracts
//
// Transaction execution lives in `TransactionExecutor` (node/producer.rs).

pub mod gas;

pub use gas::{GasError, GasMeter};
