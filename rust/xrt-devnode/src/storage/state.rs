// State - in-memory world state of the dev chain
use crate::contracts::Contract;
use crate::types::{AccountError, AccountInfo, Address, Balance, Nonce};
use std::collections::BTreeMap;

/// Accounts and deployed contracts
///
/// Cloning is the snapshot mechanism: reverted transactions, `eth_call` and
/// `evm_snapshot` all work on or restore a clone.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    accounts: BTreeMap<Address, AccountInfo>,
    contracts: BTreeMap<Address, Contract>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, address: &Address) -> AccountInfo {
        self.accounts.get(address).cloned().unwrap_or_default()
    }

    pub fn balance(&self, address: &Address) -> Balance {
        self.accounts.get(address).map(|a| a.balance).unwrap_or(0)
    }

    pub fn nonce(&self, address: &Address) -> Nonce {
        self.accounts.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    pub fn set_account(&mut self, address: Address, info: AccountInfo) {
        self.accounts.insert(address, info);
    }

    pub fn account_mut(&mut self, address: Address) -> &mut AccountInfo {
        self.accounts.entry(address).or_default()
    }

    /// Move native value between accounts
    pub fn transfer(&mut self, from: Address, to: Address, value: Balance) -> Result<(), AccountError> {
        if value == 0 {
            return Ok(());
        }
        self.account_mut(from).debit(value)?;
        self.account_mut(to).credit(value)
    }

    pub fn contract(&self, address: &Address) -> Option<&Contract> {
        self.contracts.get(address)
    }

    pub fn is_contract(&self, address: &Address) -> bool {
        self.contracts.contains_key(address)
    }

    pub fn insert_contract(&mut self, address: Address, contract: Contract) {
        self.contracts.insert(address, contract);
    }

    /// Take a contract out for execution; put it back with `insert_contract`
    pub fn take_contract(&mut self, address: &Address) -> Option<Contract> {
        self.contracts.remove(address)
    }

    pub fn contracts_mut(&mut self) -> &mut BTreeMap<Address, Contract> {
        &mut self.contracts
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::InterfaceRegistry;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn test_transfer() {
        let mut state = WorldState::new();
        state.set_account(addr(1), AccountInfo::new(100));
        state.transfer(addr(1), addr(2), 30).unwrap();
        assert_eq!(state.balance(&addr(1)), 70);
        assert_eq!(state.balance(&addr(2)), 30);
        assert!(state.transfer(addr(2), addr(1), 31).is_err());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut state = WorldState::new();
        state.set_account(addr(1), AccountInfo::new(100));
        state.insert_contract(addr(9), Contract::Registry(InterfaceRegistry::new()));

        let snapshot = state.clone();
        state.transfer(addr(1), addr(2), 50).unwrap();
        state.take_contract(&addr(9));

        assert_eq!(snapshot.balance(&addr(1)), 100);
        assert!(snapshot.is_contract(&addr(9)));
        assert!(!state.is_contract(&addr(9)));
    }
}
