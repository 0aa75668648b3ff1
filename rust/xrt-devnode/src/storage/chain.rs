// Chain - blocks and receipts of the dev chain
use crate::types::{Block, BlockNumber, Hash, Receipt};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ChainStore {
    blocks: Vec<Block>,
    receipts: HashMap<Hash, Receipt>,
}

impl ChainStore {
    pub fn new(genesis: Block) -> Self {
        Self {
            blocks: vec![genesis],
            receipts: HashMap::new(),
        }
    }

    /// Highest block number
    pub fn best_number(&self) -> BlockNumber {
        self.blocks.last().map(|b| b.number()).unwrap_or(0)
    }

    pub fn best_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn best_hash(&self) -> Hash {
        self.blocks.last().map(|b| b.hash()).unwrap_or(Hash::ZERO)
    }

    pub fn block(&self, number: BlockNumber) -> Option<&Block> {
        self.blocks.get(usize::try_from(number).ok()?)
    }

    pub fn receipt(&self, tx_hash: &Hash) -> Option<&Receipt> {
        self.receipts.get(tx_hash)
    }

    pub fn push(&mut self, block: Block, receipts: Vec<Receipt>) {
        for receipt in receipts {
            self.receipts.insert(receipt.tx_hash, receipt);
        }
        self.blocks.push(block);
    }

    /// Drop every block above `number` and the receipts they carried
    pub fn truncate(&mut self, number: BlockNumber) {
        let keep = (number as usize).saturating_add(1);
        if keep >= self.blocks.len() {
            return;
        }
        for block in self.blocks.drain(keep..) {
            for tx in &block.transactions {
                self.receipts.remove(&tx.hash());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockHeader;

    fn block(number: BlockNumber, parent: Hash) -> Block {
        Block {
            header: BlockHeader {
                number,
                parent_hash: parent,
                timestamp: 0,
                gas_limit: 1,
                gas_used: 0,
                transactions_root: Hash::ZERO,
            },
            transactions: vec![],
        }
    }

    #[test]
    fn test_push_and_truncate() {
        let mut chain = ChainStore::new(block(0, Hash::ZERO));
        let h0 = chain.best_hash();
        chain.push(block(1, h0), vec![]);
        let h1 = chain.best_hash();
        chain.push(block(2, h1), vec![]);
        assert_eq!(chain.best_number(), 2);

        chain.truncate(1);
        assert_eq!(chain.best_number(), 1);
        assert!(chain.block(2).is_none());
        assert_eq!(chain.block(1).map(|b| b.header.parent_hash), Some(h0));

        chain.truncate(5);
        assert_eq!(chain.best_number(), 1);
    }
}
