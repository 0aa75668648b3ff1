// Supply ledger - tracks token holders to check total supply against balances

use crate::contract::ReferenceToken;
use crate::error::Result;
use std::collections::BTreeSet;
use xrt_devnode::types::Address;

/// Live balances of every tracked holder at one observation point
#[derive(Debug, Clone)]
pub struct SupplyReport {
    pub total_supply: i128,
    pub balances: Vec<(Address, i128)>,
}

impl SupplyReport {
    pub fn sum_of_balances(&self) -> i128 {
        self.balances.iter().map(|(_, balance)| balance).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_supply == self.sum_of_balances()
    }

    pub fn balance(&self, holder: &Address) -> Option<i128> {
        self.balances
            .iter()
            .find(|(address, _)| address == holder)
            .map(|(_, balance)| *balance)
    }
}

/// Every address a test has credited
#[derive(Debug, Clone, Default)]
pub struct SupplyLedger {
    holders: BTreeSet<Address>,
}

impl SupplyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, holder: Address) {
        self.holders.insert(holder);
    }

    pub fn holders(&self) -> impl Iterator<Item = &Address> {
        self.holders.iter()
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Query supply and every tracked balance
    pub async fn observe(&self, token: &ReferenceToken) -> Result<SupplyReport> {
        let total_supply = token.total_supply().await?;
        let mut balances = Vec::with_capacity(self.holders.len());
        for holder in &self.holders {
            balances.push((*holder, token.balance_of(*holder).await?));
        }
        Ok(SupplyReport {
            total_supply,
            balances,
        })
    }

    /// Panics when total supply differs from the sum of tracked balances
    pub async fn assert_balanced(&self, token: &ReferenceToken) -> Result<SupplyReport> {
        let report = self.observe(token).await?;
        assert_eq!(
            report.total_supply,
            report.sum_of_balances(),
            "total supply does not match balances {:?}",
            report.balances
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_sums() {
        let a = Address::from_bytes([1u8; 20]);
        let b = Address::from_bytes([2u8; 20]);
        let report = SupplyReport {
            total_supply: 10,
            balances: vec![(a, 7), (b, 3)],
        };
        assert!(report.is_balanced());
        assert_eq!(report.balance(&b), Some(3));
        assert_eq!(report.balance(&Address::ZERO), None);

        let short = SupplyReport {
            total_supply: 10,
            balances: vec![(a, 7)],
        };
        assert!(!short.is_balanced());
    }

    #[test]
    fn test_track_deduplicates() {
        let mut ledger = SupplyLedger::new();
        let a = Address::from_bytes([1u8; 20]);
        ledger.track(a);
        ledger.track(a);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.holders().next(), Some(&a));
    }
}
