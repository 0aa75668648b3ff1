// Genesis specification of a dev chain
use crate::storage::WorldState;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisSpec {
    pub timestamp: Timestamp,

    /// Pre-funded balances
    pub balances: BTreeMap<Address, Balance>,

    pub gas_limit: Gas,
}

impl GenesisSpec {
    /// Every dev account funded with `balance`
    pub fn dev(accounts: &[DevAccount], balance: Balance, gas_limit: Gas) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp().max(0) as Timestamp,
            balances: accounts.iter().map(|a| (a.address(), balance)).collect(),
            gas_limit,
        }
    }
}

pub struct GenesisBuilder {
    spec: GenesisSpec,
}

impl GenesisBuilder {
    pub fn new(spec: GenesisSpec) -> Self {
        Self { spec }
    }

    /// Fund the accounts and return block 0
    pub fn build(self, state: &mut WorldState) -> Block {
        for (address, balance) in &self.spec.balances {
            state.set_account(*address, AccountInfo::new(*balance));
        }

        Block {
            header: BlockHeader {
                number: 0,
                parent_hash: Hash::ZERO,
                timestamp: self.spec.timestamp,
                gas_limit: self.spec.gas_limit,
                gas_used: 0,
                transactions_root: Hash::ZERO,
            },
            transactions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_genesis_funds_accounts() {
        let accounts: Vec<_> = (0..3).map(|i| DevAccount::from_seed("genesis", i)).collect();
        let spec = GenesisSpec::dev(&accounts, DEFAULT_ACCOUNT_BALANCE, 5_800_000);
        let mut state = WorldState::new();

        let block = GenesisBuilder::new(spec).build(&mut state);

        assert_eq!(block.header.number, 0);
        assert_eq!(block.header.parent_hash, Hash::ZERO);
        assert_eq!(block.header.gas_limit, 5_800_000);
        for account in &accounts {
            assert_eq!(state.balance(&account.address()), 100 * ETHER);
            assert_eq!(state.nonce(&account.address()), 0);
        }
    }
}
