// Argument decoding for native contract calls
//
// Calls carry JSON arguments. Amounts are decimal strings of base units (plain
// JSON integers are accepted too); a negative amount is an invalid operation,
// the same way an underflowing uint argument traps in a bytecode contract.

use super::Revert;
use crate::types::{Address, Balance};
use serde_json::Value;

/// Positional call arguments
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn required(&self, index: usize) -> Result<&'a Value, Revert> {
        self.values
            .get(index)
            .ok_or_else(|| Revert::BadArgument(format!("missing argument #{}", index)))
    }

    pub fn address(&self, index: usize) -> Result<Address, Revert> {
        match self.required(index)? {
            Value::String(s) => s
                .parse()
                .map_err(|e| Revert::BadArgument(format!("argument #{}: {}", index, e))),
            other => Err(Revert::BadArgument(format!(
                "argument #{}: expected address, got {}",
                index, other
            ))),
        }
    }

    pub fn amount(&self, index: usize) -> Result<Balance, Revert> {
        parse_amount(self.required(index)?)
            .map_err(|e| e.with_position(index))
    }

    pub fn string(&self, index: usize) -> Result<String, Revert> {
        match self.required(index)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(Revert::BadArgument(format!(
                "argument #{}: expected string, got {}",
                index, other
            ))),
        }
    }

    /// Optional hex bytes argument (`"0x"` or absent means empty)
    pub fn bytes(&self, index: usize) -> Result<Vec<u8>, Revert> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) => {
                let raw = s.strip_prefix("0x").unwrap_or(s);
                hex::decode(raw)
                    .map_err(|e| Revert::BadArgument(format!("argument #{}: {}", index, e)))
            }
            Some(other) => Err(Revert::BadArgument(format!(
                "argument #{}: expected hex bytes, got {}",
                index, other
            ))),
        }
    }
}

/// Decode a base-unit amount
pub fn parse_amount(value: &Value) -> Result<Balance, Revert> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.starts_with('-') {
                return Err(Revert::InvalidOperation);
            }
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Revert::BadArgument(format!("invalid amount {:?}", s)));
            }
            s.parse::<Balance>()
                .map_err(|_| Revert::BadArgument(format!("amount out of range: {}", s)))
        }
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Ok(v as Balance)
            } else if n.as_i64().is_some_and(|v| v < 0) {
                Err(Revert::InvalidOperation)
            } else {
                Err(Revert::BadArgument(format!("invalid amount {}", n)))
            }
        }
        other => Err(Revert::BadArgument(format!("expected amount, got {}", other))),
    }
}

/// Encode an amount for a call result
pub fn amount_value(amount: Balance) -> Value {
    Value::String(amount.to_string())
}
