// Account - native-currency accounts and unlocked dev keys
use super::primitives::{Address, Balance, Hash, Nonce};
use super::signature::{domain_separate, Signature64, DOMAIN_TRANSACTION};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Ledger state of an address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Number of transactions sent from this address
    pub nonce: Nonce,

    /// Native balance (wei)
    #[serde(with = "super::primitives::balance_str")]
    pub balance: Balance,
}

impl AccountInfo {
    pub fn new(balance: Balance) -> Self {
        Self { nonce: 0, balance }
    }

    pub fn can_afford(&self, amount: Balance) -> bool {
        self.balance >= amount
    }

    pub fn debit(&mut self, amount: Balance) -> Result<(), AccountError> {
        if !self.can_afford(amount) {
            return Err(AccountError::InsufficientBalance {
                needed: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    pub fn credit(&mut self, amount: Balance) -> Result<(), AccountError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(AccountError::BalanceOverflow)?;
        Ok(())
    }

    pub fn increment_nonce(&mut self) {
        self.nonce = self.nonce.saturating_add(1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Balance, available: Balance },

    #[error("Balance overflow")]
    BalanceOverflow,
}

/// An account whose key the node holds, so `eth_sendTransaction` only needs `from`
#[derive(Clone)]
pub struct DevAccount {
    signing_key: SigningKey,
    address: Address,
}

impl DevAccount {
    /// Deterministic account `index` derived from `seed`
    pub fn from_seed(seed: &str, index: u32) -> Self {
        let mut material = Vec::with_capacity(seed.len() + 4);
        material.extend_from_slice(seed.as_bytes());
        material.extend_from_slice(&index.to_le_bytes());
        let secret = Hash::hash(&material);
        Self::from_signing_key(SigningKey::from_bytes(secret.as_bytes()))
    }

    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying: VerifyingKey = signing_key.verifying_key();
        let address = Address::from_public_key(verifying.as_bytes());
        Self {
            signing_key,
            address,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign a transaction payload with domain separation
    pub fn sign(&self, payload: &[u8]) -> Signature64 {
        let message = domain_separate(DOMAIN_TRANSACTION, payload);
        self.signing_key.sign(&message).into()
    }
}

impl std::fmt::Debug for DevAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevAccount")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
