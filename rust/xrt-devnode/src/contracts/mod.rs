// Contracts - native contracts hosted by the dev node
// No bytecode: each contract is a Rust type with a method dispatcher.

pub mod abi;
pub mod registry;
pub mod token;

pub use registry::{interface_hash, InterfaceRegistry};
pub use token::ReferenceToken;

use crate::execution::gas::{costs, GasError, GasMeter};
use crate::types::{Address, Balance, Gas, LogEntry};
use crate::types::primitives::balance_str;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Constructor payload of a deployment transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "contract", rename_all = "camelCase")]
pub enum ContractInit {
    InterfaceRegistry,

    #[serde(rename_all = "camelCase")]
    ReferenceToken {
        name: String,
        symbol: String,
        #[serde(with = "balance_str")]
        granularity: Balance,
        registry: Address,
    },
}

impl ContractInit {
    pub fn kind(&self) -> &'static str {
        match self {
            ContractInit::InterfaceRegistry => InterfaceRegistry::KIND,
            ContractInit::ReferenceToken { .. } => ReferenceToken::KIND,
        }
    }
}

/// A deployed contract
#[derive(Debug, Clone)]
pub enum Contract {
    Registry(InterfaceRegistry),
    Token(ReferenceToken),
}

impl Contract {
    /// Run the constructor for `init`; `ctx.this` is the new contract's address
    pub fn instantiate(init: &ContractInit, ctx: &mut CallContext<'_>) -> Result<Self, Revert> {
        ctx.charge(costs::CONTRACT_CREATE)?;
        match init {
            ContractInit::InterfaceRegistry => Ok(Contract::Registry(InterfaceRegistry::new())),
            ContractInit::ReferenceToken {
                name,
                symbol,
                granularity,
                registry,
            } => ReferenceToken::deploy(ctx, name, symbol, *granularity, *registry)
                .map(Contract::Token),
        }
    }

    /// Dispatch a method call
    pub fn call(
        &mut self,
        ctx: &mut CallContext<'_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Revert> {
        ctx.charge(costs::CONTRACT_CALL)?;
        let args = abi::Args::new(args);
        match self {
            Contract::Registry(registry) => registry.call(ctx, method, &args),
            Contract::Token(token) => token.call(ctx, method, &args),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Contract::Registry(_) => InterfaceRegistry::KIND,
            Contract::Token(_) => ReferenceToken::KIND,
        }
    }
}

/// Environment of one contract invocation
///
/// The contract being executed is taken out of `contracts` for the duration of
/// the call, so `contracts` holds every *other* deployed contract.
pub struct CallContext<'a> {
    pub caller: Address,
    pub this: Address,
    pub contracts: &'a mut BTreeMap<Address, Contract>,
    pub meter: &'a mut GasMeter,
    pub logs: &'a mut Vec<LogEntry>,
}

impl<'a> CallContext<'a> {
    pub fn charge(&mut self, gas: Gas) -> Result<(), Revert> {
        self.meter.consume(gas).map_err(Revert::from)
    }

    /// Record an event
    pub fn emit(&mut self, event: &str, data: Value) -> Result<(), Revert> {
        let size = data.to_string().len() as Gas;
        self.charge(costs::LOG + size * costs::LOG_DATA_BYTE)?;
        self.logs.push(LogEntry {
            address: self.this,
            event: event.to_string(),
            data,
        });
        Ok(())
    }

    pub fn is_contract(&self, address: &Address) -> bool {
        *address == self.this || self.contracts.contains_key(address)
    }

    pub fn registry(&self, address: &Address) -> Result<&InterfaceRegistry, Revert> {
        match self.contracts.get(address) {
            Some(Contract::Registry(registry)) => Ok(registry),
            _ => Err(Revert::NotARegistry(*address)),
        }
    }

    pub fn registry_mut(&mut self, address: &Address) -> Result<&mut InterfaceRegistry, Revert> {
        match self.contracts.get_mut(address) {
            Some(Contract::Registry(registry)) => Ok(registry),
            _ => Err(Revert::NotARegistry(*address)),
        }
    }
}

/// Contract-level failure; the transaction is mined with `status = false`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Revert {
    #[error("invalid opcode")]
    InvalidOperation,

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Balance, available: Balance },

    #[error("insufficient allowance: need {needed}, allowed {allowed}")]
    InsufficientAllowance { needed: Balance, allowed: Balance },

    #[error("amount {amount} is not a multiple of granularity {granularity}")]
    NotMultipleOfGranularity { amount: Balance, granularity: Balance },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("cannot send to the zero address")]
    ZeroAddress,

    #[error("recipient {0} has no ITokenRecipient implementer")]
    RecipientNotRegistered(Address),

    #[error("invalid granularity {0}")]
    InvalidGranularity(Balance),

    #[error("{0} is not an interface registry")]
    NotARegistry(Address),

    #[error("no contract at {0}")]
    NotAContract(Address),

    #[error("contract does not accept value")]
    NonPayable,

    #[error("unknown method {0}")]
    UnknownMethod(String),

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("{0}")]
    OutOfGas(#[from] GasError),
}

impl Revert {
    /// Stable machine-readable kind, reported in receipts and RPC errors
    pub fn kind(&self) -> &'static str {
        match self {
            Revert::InvalidOperation => "invalid_operation",
            Revert::InsufficientBalance { .. } => "insufficient_balance",
            Revert::InsufficientAllowance { .. } => "insufficient_allowance",
            Revert::NotMultipleOfGranularity { .. } => "granularity",
            Revert::Unauthorized(_) => "unauthorized",
            Revert::ZeroAddress => "zero_address",
            Revert::RecipientNotRegistered(_) => "recipient_not_registered",
            Revert::InvalidGranularity(_) => "invalid_granularity",
            Revert::NotARegistry(_) => "not_a_registry",
            Revert::NotAContract(_) => "not_a_contract",
            Revert::NonPayable => "non_payable",
            Revert::UnknownMethod(_) => "unknown_method",
            Revert::BadArgument(_) => "bad_argument",
            Revert::OutOfGas(_) => "out_of_gas",
        }
    }

    pub(crate) fn with_position(self, index: usize) -> Self {
        match self {
            Revert::BadArgument(msg) => Revert::BadArgument(format!("argument #{}: {}", index, msg)),
            other => other,
        }
    }
}
