// Node Service - the dev chain owned by the event loop
//
// All mutating operations take `&mut self`; the runner feeds them one RPC call
// at a time, so every transaction observes the effects of the previous one.

use crate::cli::config::NodeConfig;
use crate::contracts::Revert;
use crate::genesis::{GenesisBuilder, GenesisSpec};
use crate::node::producer::{BlockProducer, ExecutionError, TransactionExecutor};
use crate::rpc::types::{BlockInfo, BlockTag, CallRequest, HealthStatus, ReceiptInfo, TransactionRequest};
use crate::storage::{ChainStore, WorldState};
use crate::types::*;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// State captured by `evm_snapshot`
#[derive(Debug, Clone)]
struct Snapshot {
    state: WorldState,
    block_number: BlockNumber,
}

pub struct DevNode {
    accounts: Vec<DevAccount>,
    keys: HashMap<Address, usize>,
    state: WorldState,
    chain: ChainStore,
    producer: BlockProducer,
    snapshots: BTreeMap<u64, Snapshot>,
    next_snapshot: u64,
    gas_price: Balance,
    chain_id: u64,
}

impl DevNode {
    /// Build genesis with funded dev accounts
    pub fn new(config: &NodeConfig) -> Self {
        let accounts: Vec<DevAccount> = match &config.seed {
            Some(seed) => (0..config.total_accounts)
                .map(|i| DevAccount::from_seed(seed, i))
                .collect(),
            None => (0..config.total_accounts).map(|_| DevAccount::random()).collect(),
        };
        let keys = accounts
            .iter()
            .enumerate()
            .map(|(i, a)| (a.address(), i))
            .collect();

        let mut state = WorldState::new();
        let spec = GenesisSpec::dev(&accounts, config.default_balance, config.gas_limit);
        let genesis = GenesisBuilder::new(spec).build(&mut state);
        info!(
            accounts = accounts.len(),
            gas_limit = config.gas_limit,
            genesis = %genesis.hash().short(),
            "Dev chain initialized"
        );

        Self {
            accounts,
            keys,
            state,
            chain: ChainStore::new(genesis),
            producer: BlockProducer::new(config.gas_limit),
            snapshots: BTreeMap::new(),
            next_snapshot: 1,
            gas_price: config.gas_price,
            chain_id: config.chain_id,
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Unlocked accounts, in creation order
    pub fn accounts(&self) -> Vec<Address> {
        self.accounts.iter().map(|a| a.address()).collect()
    }

    pub fn block_number(&self) -> BlockNumber {
        self.chain.best_number()
    }

    pub fn gas_limit(&self) -> Gas {
        self.producer.gas_limit()
    }

    pub fn gas_price(&self) -> Balance {
        self.gas_price
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn balance(&self, address: &Address) -> Balance {
        self.state.balance(address)
    }

    pub fn nonce(&self, address: &Address) -> Nonce {
        self.state.nonce(address)
    }

    /// "0x" for plain accounts, hex of the contract kind otherwise
    pub fn code(&self, address: &Address) -> String {
        match self.state.contract(address) {
            Some(contract) => format!("0x{}", hex::encode(contract.kind())),
            None => "0x".to_string(),
        }
    }

    pub fn block(&self, tag: BlockTag) -> Option<BlockInfo> {
        let number = match tag {
            BlockTag::Latest => self.chain.best_number(),
            BlockTag::Earliest => 0,
            BlockTag::Number(n) => n,
        };
        self.chain.block(number).map(BlockInfo::from)
    }

    pub fn receipt(&self, tx_hash: &Hash) -> Option<ReceiptInfo> {
        self.chain.receipt(tx_hash).map(ReceiptInfo::from)
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            block_height: self.chain.best_number(),
            accounts: self.accounts.len(),
        }
    }

    // =========================================================================
    // TRANSACTIONS
    // =========================================================================

    /// Sign with the unlocked key of `from`, execute, and mine one block
    pub fn send_transaction(&mut self, request: TransactionRequest) -> Result<Hash, NodeError> {
        let index = *self
            .keys
            .get(&request.from)
            .ok_or(NodeError::UnknownAccount(request.from))?;
        let action = request.action().map_err(NodeError::InvalidRequest)?;

        let transaction = Transaction {
            from: request.from,
            nonce: request.nonce.unwrap_or_else(|| self.state.nonce(&request.from)),
            gas: request.gas.unwrap_or(DEFAULT_TX_GAS),
            gas_price: request.gas_price.unwrap_or(self.gas_price),
            value: request.value.unwrap_or(0),
            action,
        };

        let account = &self.accounts[index];
        let payload = transaction
            .payload()
            .ok_or_else(|| NodeError::InvalidRequest("transaction cannot be encoded".to_string()))?;
        let signed = SignedTransaction::new(transaction, account.public_key(), account.sign(&payload));
        let tx_hash = signed.hash();

        let gas_limit = self.gas_limit();
        let result = TransactionExecutor::execute(&mut self.state, &signed, gas_limit)?;

        let block = self
            .producer
            .seal(&self.chain, vec![signed.clone()], result.gas_used);
        let receipt = BlockProducer::receipt(&block, &signed, &result);
        info!(
            block = block.number(),
            tx = %tx_hash.short(),
            gas_used = result.gas_used,
            status = receipt.status,
            "Mined block"
        );
        self.chain.push(block, vec![receipt]);

        match result.revert {
            Some(revert) => Err(NodeError::Reverted {
                revert,
                tx_hash: Some(tx_hash),
            }),
            None => Ok(tx_hash),
        }
    }

    /// Execute a method against the latest state without persisting anything
    pub fn call(&self, request: CallRequest) -> Result<Value, NodeError> {
        TransactionExecutor::call(
            &self.state,
            request.from.unwrap_or(Address::ZERO),
            request.to,
            &request.data.method,
            &request.data.args,
            request.gas.unwrap_or_else(|| self.gas_limit()),
        )
        .map_err(|revert| NodeError::Reverted {
            revert,
            tx_hash: None,
        })
    }

    // =========================================================================
    // DEV EXTRAS
    // =========================================================================

    pub fn snapshot(&mut self) -> u64 {
        let id = self.next_snapshot;
        self.next_snapshot += 1;
        self.snapshots.insert(
            id,
            Snapshot {
                state: self.state.clone(),
                block_number: self.chain.best_number(),
            },
        );
        debug!(id, block = self.chain.best_number(), "Snapshot taken");
        id
    }

    /// Restore snapshot `id`; it and every later snapshot are consumed
    pub fn revert(&mut self, id: u64) -> bool {
        let snapshot = match self.snapshots.remove(&id) {
            Some(snapshot) => snapshot,
            None => return false,
        };
        self.snapshots.retain(|&other, _| other < id);

        self.state = snapshot.state;
        self.chain.truncate(snapshot.block_number);
        info!(id, block = snapshot.block_number, "Reverted to snapshot");
        true
    }

    /// Mine an empty block
    pub fn mine(&mut self) -> BlockNumber {
        let block = self.producer.seal(&self.chain, Vec::new(), 0);
        let number = block.number();
        self.chain.push(block, Vec::new());
        debug!(block = number, "Mined empty block");
        number
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum NodeError {
    #[error("Unknown or locked account: {0}")]
    UnknownAccount(Address),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Rejected(#[from] ExecutionError),

    #[error("Reverted: {revert}")]
    Reverted {
        revert: Revert,
        tx_hash: Option<Hash>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ContractInit;
    use crate::rpc::types::CallData;
    use serde_json::json;

    fn node() -> DevNode {
        DevNode::new(&NodeConfig::dev().with_seed("service-tests").with_gas_limit(5_800_000))
    }

    fn deploy(node: &mut DevNode, init: ContractInit) -> Address {
        let from = node.accounts()[0];
        let hash = node
            .send_transaction(TransactionRequest {
                from,
                gas: Some(4_000_000),
                deploy: Some(init),
                ..Default::default()
            })
            .unwrap();
        node.receipt(&hash).unwrap().contract_address.unwrap()
    }

    fn deploy_token(node: &mut DevNode) -> Address {
        let registry = deploy(node, ContractInit::InterfaceRegistry);
        deploy(
            node,
            ContractInit::ReferenceToken {
                name: "Reference Token".into(),
                symbol: "XRT".into(),
                granularity: UNIT / 100,
                registry,
            },
        )
    }

    fn query(node: &DevNode, to: Address, method: &str, args: Vec<Value>) -> Value {
        node.call(CallRequest {
            from: None,
            to,
            gas: None,
            data: CallData {
                method: method.to_string(),
                args,
            },
        })
        .unwrap()
    }

    fn invoke(node: &mut DevNode, from: Address, to: Address, method: &str, args: Vec<Value>) -> Result<Hash, NodeError> {
        node.send_transaction(TransactionRequest {
            from,
            to: Some(to),
            gas: Some(300_000),
            data: Some(CallData {
                method: method.to_string(),
                args,
            }),
            ..Default::default()
        })
    }

    #[test]
    fn test_genesis_accounts_funded() {
        let node = node();
        let accounts = node.accounts();
        assert_eq!(accounts.len(), 10);
        assert_eq!(node.block_number(), 0);
        for account in &accounts {
            assert_eq!(node.balance(account), DEFAULT_ACCOUNT_BALANCE);
        }
        // same seed, same accounts
        assert_eq!(accounts, self::node().accounts());
    }

    #[test]
    fn test_each_transaction_mines_one_block() {
        let mut node = node();
        let accounts = node.accounts();
        let hash = node
            .send_transaction(TransactionRequest {
                from: accounts[0],
                to: Some(accounts[1]),
                value: Some(ETHER),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(node.block_number(), 1);
        let receipt = node.receipt(&hash).unwrap();
        assert!(receipt.status);
        assert_eq!(receipt.block_number, 1);
        assert_eq!(node.balance(&accounts[1]), 101 * ETHER);
        assert_eq!(node.block(BlockTag::Latest).unwrap().transactions, vec![hash]);
    }

    #[test]
    fn test_unknown_sender_rejected_without_block() {
        let mut node = node();
        let stranger = Address::from_bytes([0x42; 20]);
        let err = node
            .send_transaction(TransactionRequest {
                from: stranger,
                to: Some(stranger),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, NodeError::UnknownAccount(a) if a == stranger));
        assert_eq!(node.block_number(), 0);
    }

    #[test]
    fn test_gas_above_block_limit_rejected() {
        let mut node = node();
        let accounts = node.accounts();
        let err = node
            .send_transaction(TransactionRequest {
                from: accounts[0],
                to: Some(accounts[1]),
                gas: Some(5_800_001),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            NodeError::Rejected(ExecutionError::GasLimitExceeded { .. })
        ));
        assert_eq!(node.block_number(), 0);
    }

    #[test]
    fn test_gas_at_block_limit_mined() {
        let mut node = node();
        let accounts = node.accounts();
        let hash = node
            .send_transaction(TransactionRequest {
                from: accounts[0],
                to: Some(accounts[1]),
                gas: Some(node.gas_limit()),
                value: Some(ETHER),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(node.block_number(), 1);
        assert!(node.receipt(&hash).unwrap().status);
        assert_eq!(node.nonce(&accounts[0]), 1);
        assert_eq!(node.balance(&accounts[1]), 101 * ETHER);
    }

    #[test]
    fn test_token_scenario() {
        let mut node = node();
        let accounts = node.accounts();
        let token = deploy_token(&mut node);

        assert_eq!(query(&node, token, "name", vec![]), json!("Reference Token"));
        assert_eq!(query(&node, token, "symbol", vec![]), json!("XRT"));
        assert_eq!(query(&node, token, "granularity", vec![]), json!("10000000000000000"));
        assert_eq!(query(&node, token, "totalSupply", vec![]), json!("0"));

        let before = node.block_number();
        invoke(
            &mut node,
            accounts[0],
            token,
            "ownerMint",
            vec![json!(accounts[1]), json!("10000000000000000000"), json!("0x")],
        )
        .unwrap();
        assert_eq!(node.block_number(), before + 1);

        invoke(
            &mut node,
            accounts[1],
            token,
            "send",
            vec![json!(accounts[2]), json!("3000000000000000000")],
        )
        .unwrap();

        let err = invoke(
            &mut node,
            accounts[1],
            token,
            "send",
            vec![json!(accounts[2]), json!("-3000000000000000000")],
        )
        .unwrap_err();
        match err {
            NodeError::Reverted { revert, tx_hash } => {
                assert_eq!(revert, Revert::InvalidOperation);
                let receipt = node.receipt(&tx_hash.unwrap()).unwrap();
                assert!(!receipt.status);
                assert_eq!(receipt.revert_kind.as_deref(), Some("invalid_operation"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert_eq!(query(&node, token, "balanceOf", vec![json!(accounts[1])]), json!("7000000000000000000"));
        assert_eq!(query(&node, token, "balanceOf", vec![json!(accounts[2])]), json!("3000000000000000000"));
        assert_eq!(query(&node, token, "totalSupply", vec![]), json!("10000000000000000000"));
    }

    #[test]
    fn test_call_does_not_mine() {
        let mut node = node();
        let token = deploy_token(&mut node);
        let height = node.block_number();
        query(&node, token, "totalSupply", vec![]);
        assert_eq!(node.block_number(), height);
    }

    #[test]
    fn test_snapshot_and_revert() {
        let mut node = node();
        let accounts = node.accounts();
        let id = node.snapshot();

        node.send_transaction(TransactionRequest {
            from: accounts[0],
            to: Some(accounts[1]),
            value: Some(ETHER),
            ..Default::default()
        })
        .unwrap();
        node.mine();
        assert_eq!(node.block_number(), 2);

        assert!(node.revert(id));
        assert_eq!(node.block_number(), 0);
        assert_eq!(node.balance(&accounts[1]), DEFAULT_ACCOUNT_BALANCE);
        assert_eq!(node.nonce(&accounts[0]), 0);

        // a snapshot can only be used once
        assert!(!node.revert(id));
    }

    #[test]
    fn test_code() {
        let mut node = node();
        let registry = deploy(&mut node, ContractInit::InterfaceRegistry);
        assert_eq!(node.code(&node.accounts()[0]), "0x");
        assert_eq!(node.code(&registry), format!("0x{}", hex::encode("InterfaceRegistry")));
    }
}
