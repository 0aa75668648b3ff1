// Transaction - signed state transitions
use super::primitives::{Address, Balance, Gas, Hash, Nonce};
use super::signature::{domain_separate, Signature64, DOMAIN_TRANSACTION};
use crate::contracts::ContractInit;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Signed transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub public_key: [u8; 32],
    pub signature: Signature64,
}

impl SignedTransaction {
    pub fn new(transaction: Transaction, public_key: [u8; 32], signature: Signature64) -> Self {
        Self {
            transaction,
            public_key,
            signature,
        }
    }

    /// Checks that the key belongs to `from` and that it signed the payload
    pub fn verify(&self) -> bool {
        if Address::from_public_key(&self.public_key) != self.transaction.from {
            return false;
        }

        let message = match Self::signing_message(&self.transaction) {
            Some(message) => message,
            None => return false,
        };

        let key = match VerifyingKey::from_bytes(&self.public_key) {
            Ok(key) => key,
            Err(_) => return false,
        };

        key.verify(&message, &Signature::from_bytes(self.signature.as_bytes()))
            .is_ok()
    }

    /// Domain-separated bytes that get signed
    pub fn signing_message(transaction: &Transaction) -> Option<Vec<u8>> {
        let tx_bytes = transaction.payload()?;
        Some(domain_separate(DOMAIN_TRANSACTION, &tx_bytes))
    }

    pub fn hash(&self) -> Hash {
        self.transaction.hash()
    }
}

/// Unsigned transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub nonce: Nonce,
    /// Gas allowance
    pub gas: Gas,
    /// Price per gas unit, in wei
    pub gas_price: Balance,
    /// Native value attached, in wei
    pub value: Balance,
    pub action: Action,
}

impl Transaction {
    /// Canonical bytes of the transaction (bincode)
    pub fn payload(&self) -> Option<Vec<u8>> {
        bincode::serialize(self).ok()
    }

    pub fn hash(&self) -> Hash {
        match self.payload() {
            Some(bytes) => Hash::hash(&bytes),
            None => {
                let mut data = Vec::new();
                data.extend_from_slice(self.from.as_bytes());
                data.extend_from_slice(&self.nonce.to_le_bytes());
                Hash::hash(&data)
            }
        }
    }

    /// Upper bound on what the sender pays: gas * gas_price + value
    pub fn max_cost(&self) -> Option<Balance> {
        (self.gas as Balance)
            .checked_mul(self.gas_price)?
            .checked_add(self.value)
    }

    /// Destination address, if any (deployments have none)
    pub fn to(&self) -> Option<Address> {
        match &self.action {
            Action::Transfer { to } | Action::Call { to, .. } => Some(*to),
            Action::Deploy { .. } => None,
        }
    }
}

/// What a transaction does
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Action {
    /// Plain value transfer
    Transfer { to: Address },

    /// Create a native contract
    Deploy { contract: ContractInit },

    /// Invoke a contract method
    Call {
        to: Address,
        method: String,
        args: Vec<serde_json::Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::account::DevAccount;

    fn sample(from: Address) -> Transaction {
        Transaction {
            from,
            nonce: 0,
            gas: 21_000,
            gas_price: 1,
            value: 5,
            action: Action::Transfer {
                to: Address::from_bytes([9; 20]),
            },
        }
    }

    fn sign(account: &DevAccount, tx: Transaction) -> SignedTransaction {
        let payload = tx.payload().unwrap();
        let signature = account.sign(&payload);
        SignedTransaction::new(tx, account.public_key(), signature)
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let account = DevAccount::from_seed("tx", 0);
        let signed = sign(&account, sample(account.address()));
        assert!(signed.verify());
    }

    #[test]
    fn test_tampered_transaction_fails() {
        let account = DevAccount::from_seed("tx", 0);
        let mut signed = sign(&account, sample(account.address()));
        signed.transaction.value = 6;
        assert!(!signed.verify());
    }

    #[test]
    fn test_foreign_key_fails() {
        let account = DevAccount::from_seed("tx", 0);
        let other = DevAccount::from_seed("tx", 1);
        let signed = sign(&other, sample(account.address()));
        assert!(!signed.verify());
    }

    #[test]
    fn test_max_cost() {
        let tx = sample(Address::ZERO);
        assert_eq!(tx.max_cost(), Some(21_005));

        let mut huge = sample(Address::ZERO);
        huge.gas_price = Balance::MAX;
        assert_eq!(huge.max_cost(), None);
    }

    #[test]
    fn test_hash_changes_with_nonce() {
        let a = sample(Address::ZERO);
        let mut b = a.clone();
        b.nonce = 1;
        assert_ne!(a.hash(), b.hash());
    }
}
