// Gas - metering for native contract execution
use crate::types::{Balance, Gas};

/// Gas costs of the operations the node meters
pub mod costs {
    use crate::types::Gas;

    // Base
    pub const TRANSACTION: Gas = 21_000;
    pub const CONTRACT_CREATE: Gas = 32_000;
    pub const CONTRACT_CALL: Gas = 700;

    // Storage
    pub const STORAGE_READ: Gas = 200;
    pub const STORAGE_WRITE_NEW: Gas = 20_000;
    pub const STORAGE_WRITE_EXISTING: Gas = 5_000;

    // Registry lookups and event logs
    pub const REGISTRY_LOOKUP: Gas = 2_600;
    pub const LOG: Gas = 375;
    pub const LOG_DATA_BYTE: Gas = 8;
}

/// Gas counter for one execution
#[derive(Debug, Clone)]
pub struct GasMeter {
    gas_limit: Gas,
    gas_used: Gas,
    gas_price: Balance,
}

impl GasMeter {
    pub fn new(gas_limit: Gas, gas_price: Balance) -> Self {
        Self {
            gas_limit,
            gas_used: 0,
            gas_price,
        }
    }

    /// Consume `amount`; on failure nothing is consumed
    pub fn consume(&mut self, amount: Gas) -> Result<(), GasError> {
        let new_used = self
            .gas_used
            .checked_add(amount)
            .ok_or(GasError::Overflow)?;

        if new_used > self.gas_limit {
            return Err(GasError::OutOfGas {
                needed: amount,
                remaining: self.gas_limit - self.gas_used,
            });
        }

        self.gas_used = new_used;
        Ok(())
    }

    pub fn remaining(&self) -> Gas {
        self.gas_limit.saturating_sub(self.gas_used)
    }

    pub fn used(&self) -> Gas {
        self.gas_used
    }

    pub fn limit(&self) -> Gas {
        self.gas_limit
    }

    /// Burn everything that is left (out-of-gas charges the full allowance)
    pub fn exhaust(&mut self) {
        self.gas_used = self.gas_limit;
    }

    /// Fee owed for the gas used so far, in wei
    pub fn total_cost(&self) -> Balance {
        (self.gas_used as Balance).saturating_mul(self.gas_price)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GasError {
    #[error("Out of gas: needed {needed}, remaining {remaining}")]
    OutOfGas { needed: Gas, remaining: Gas },

    #[error("Gas overflow")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_within_limit() {
        let mut meter = GasMeter::new(50_000, 2);
        meter.consume(costs::TRANSACTION).unwrap();
        assert_eq!(meter.used(), 21_000);
        assert_eq!(meter.remaining(), 29_000);
        assert_eq!(meter.total_cost(), 42_000);
    }

    #[test]
    fn test_out_of_gas_leaves_meter_unchanged() {
        let mut meter = GasMeter::new(30_000, 1);
        meter.consume(costs::TRANSACTION).unwrap();
        let err = meter.consume(costs::STORAGE_WRITE_NEW).unwrap_err();
        assert_eq!(
            err,
            GasError::OutOfGas {
                needed: 20_000,
                remaining: 9_000
            }
        );
        assert_eq!(meter.used(), 21_000);
    }

    #[test]
    fn test_exhaust() {
        let mut meter = GasMeter::new(300_000, 1);
        meter.consume(1).unwrap();
        meter.exhaust();
        assert_eq!(meter.used(), 300_000);
        assert_eq!(meter.remaining(), 0);
    }

    #[test]
    fn test_overflow() {
        let mut meter = GasMeter::new(Gas::MAX, 1);
        meter.consume(Gas::MAX).unwrap();
        assert_eq!(meter.consume(1), Err(GasError::Overflow));
    }
}
