// Storage - in-memory world state and chain (the dev node is ephemeral)

pub mod chain;
pub mod state;

pub use chain::*;
pub use state::*;
