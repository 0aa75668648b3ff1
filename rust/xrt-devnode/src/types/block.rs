// Block - one sealed block per accepted transaction
use super::primitives::{Address, BlockNumber, Gas, Hash, Timestamp};
use super::transaction::SignedTransaction;
use serde::{Deserialize, Serialize};

/// Sealed block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<SignedTransaction>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn number(&self) -> BlockNumber {
        self.header.number
    }

    /// Root over the transaction hashes
    pub fn compute_transactions_root(transactions: &[SignedTransaction]) -> Hash {
        if transactions.is_empty() {
            return Hash::ZERO;
        }

        let mut data = Vec::with_capacity(transactions.len() * 32);
        for tx in transactions {
            data.extend_from_slice(tx.hash().as_bytes());
        }
        Hash::hash(&data)
    }
}

/// Block header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Height
    pub number: BlockNumber,

    pub parent_hash: Hash,

    pub timestamp: Timestamp,

    pub gas_limit: Gas,

    pub gas_used: Gas,

    pub transactions_root: Hash,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        let mut data = Vec::with_capacity(8 * 4 + 64);
        data.extend_from_slice(&self.number.to_le_bytes());
        data.extend_from_slice(self.parent_hash.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.gas_limit.to_le_bytes());
        data.extend_from_slice(&self.gas_used.to_le_bytes());
        data.extend_from_slice(self.transactions_root.as_bytes());
        Hash::hash(&data)
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: Hash,
    pub block_number: BlockNumber,
    pub block_hash: Hash,
    pub from: Address,
    pub to: Option<Address>,
    /// Set for successful deployments
    pub contract_address: Option<Address>,
    pub gas_used: Gas,
    /// `true` when the action completed, `false` when it reverted
    pub status: bool,
    pub revert: Option<RevertInfo>,
    pub logs: Vec<LogEntry>,
}

/// Why a mined transaction failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertInfo {
    /// Machine-readable kind (`invalid_operation`, `insufficient_balance`, ...)
    pub kind: String,
    /// Human-readable reason
    pub reason: String,
}

/// Event emitted by a contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: Address,
    pub event: String,
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(number: BlockNumber) -> BlockHeader {
        BlockHeader {
            number,
            parent_hash: Hash::ZERO,
            timestamp: 1_700_000_000,
            gas_limit: 5_800_000,
            gas_used: 0,
            transactions_root: Hash::ZERO,
        }
    }

    #[test]
    fn test_header_hash_covers_number() {
        assert_ne!(header(1).hash(), header(2).hash());
        assert_eq!(header(1).hash(), header(1).hash());
    }

    #[test]
    fn test_empty_block_root() {
        let block = Block {
            header: header(0),
            transactions: vec![],
        };
        assert_eq!(Block::compute_transactions_root(&block.transactions), Hash::ZERO);
    }
}
