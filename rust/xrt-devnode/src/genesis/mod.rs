// Genesis - initial state and block 0
pub mod spec;

pub use spec::{GenesisBuilder, GenesisSpec};
