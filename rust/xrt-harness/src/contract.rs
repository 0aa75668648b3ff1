// Deployed contract references and their typed call surfaces

use crate::client::RpcClient;
use crate::error::{HarnessError, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use xrt_devnode::contracts::ContractInit;
use xrt_devnode::rpc::{CallData, CallRequest, ReceiptInfo, TransactionRequest};
use xrt_devnode::types::{Address, Balance, Gas, Hash};

/// Sender and gas settings of a state-changing call
#[derive(Debug, Clone)]
pub struct TxOptions {
    pub from: Address,
    pub gas: Option<Gas>,
    pub gas_price: Option<Balance>,
    pub value: Option<Balance>,
}

impl TxOptions {
    pub fn from(from: Address) -> Self {
        Self {
            from,
            gas: None,
            gas_price: None,
            value: None,
        }
    }

    pub fn gas(mut self, gas: Gas) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn gas_price(mut self, price: Balance) -> Self {
        self.gas_price = Some(price);
        self
    }

    pub fn value(mut self, value: Balance) -> Self {
        self.value = Some(value);
        self
    }

    fn request(&self) -> TransactionRequest {
        TransactionRequest {
            from: self.from,
            gas: self.gas,
            gas_price: self.gas_price,
            value: self.value,
            ..Default::default()
        }
    }
}

/// Address of a deployed contract plus the client used to reach it
#[derive(Clone)]
pub struct ContractRef {
    client: Arc<RpcClient>,
    address: Address,
    receipt_poll: Duration,
}

impl ContractRef {
    pub fn at(client: Arc<RpcClient>, address: Address) -> Self {
        Self {
            client,
            address,
            receipt_poll: Duration::from_millis(50),
        }
    }

    pub fn with_receipt_poll(mut self, interval: Duration) -> Self {
        self.receipt_poll = interval;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }

    /// Submit a deployment and return the address of the new contract
    pub async fn deploy(
        client: Arc<RpcClient>,
        init: ContractInit,
        options: &TxOptions,
        receipt_poll: Duration,
    ) -> Result<Self> {
        let kind = init.kind();
        let request = TransactionRequest {
            deploy: Some(init),
            ..options.request()
        };

        let hash = client.send_transaction(&request).await?;
        let receipt = wait_for_receipt(&client, &hash, receipt_poll).await?;
        check_status(&receipt)?;

        let address = receipt.contract_address.ok_or_else(|| {
            HarnessError::Decode(format!("receipt {} has no contract address", hash))
        })?;
        debug!(contract = kind, %address, block = receipt.block_number, "Deployed");

        Ok(Self {
            client,
            address,
            receipt_poll,
        })
    }

    /// State-changing call; resolves once the transaction is mined
    pub async fn invoke(&self, method: &str, args: Vec<Value>, options: &TxOptions) -> Result<ReceiptInfo> {
        let request = TransactionRequest {
            to: Some(self.address),
            data: Some(CallData {
                method: method.to_string(),
                args,
            }),
            ..options.request()
        };

        let hash = self.client.send_transaction(&request).await?;
        let receipt = wait_for_receipt(&self.client, &hash, self.receipt_poll).await?;
        check_status(&receipt)?;
        debug!(method, block = receipt.block_number, gas_used = receipt.gas_used, "Mined");
        Ok(receipt)
    }

    /// Read-only call against the latest block
    pub async fn query(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        let request = CallRequest {
            from: None,
            to: self.address,
            gas: None,
            data: CallData {
                method: method.to_string(),
                args,
            },
        };
        self.client.eth_call(&request).await
    }

    pub async fn query_as<T: DeserializeOwned>(&self, method: &str, args: Vec<Value>) -> Result<T> {
        let value = self.query(method, args).await?;
        serde_json::from_value(value).map_err(|e| HarnessError::Decode(format!("{}: {}", method, e)))
    }

    async fn query_amount(&self, method: &str, args: Vec<Value>) -> Result<i128> {
        let value = self.query(method, args).await?;
        parse_amount(method, &value)
    }
}

async fn wait_for_receipt(client: &RpcClient, hash: &Hash, poll: Duration) -> Result<ReceiptInfo> {
    loop {
        if let Some(receipt) = client.receipt(hash).await? {
            return Ok(receipt);
        }
        tokio::time::sleep(poll).await;
    }
}

fn check_status(receipt: &ReceiptInfo) -> Result<()> {
    if receipt.status {
        return Ok(());
    }
    Err(HarnessError::Reverted {
        reason: receipt.revert_reason.clone().unwrap_or_default(),
        kind: receipt
            .revert_kind
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        tx_hash: Some(receipt.transaction_hash),
    })
}

fn parse_amount(method: &str, value: &Value) -> Result<i128> {
    let text = value
        .as_str()
        .ok_or_else(|| HarnessError::Decode(format!("{}: expected amount string, got {}", method, value)))?;
    text.parse()
        .map_err(|_| HarnessError::Decode(format!("{}: invalid amount {:?}", method, text)))
}

fn amount_arg(amount: i128) -> Value {
    json!(amount.to_string())
}

fn bytes_arg(data: &[u8]) -> Value {
    json!(format!("0x{}", hex::encode(data)))
}

// =============================================================================
// INTERFACE REGISTRY
// =============================================================================

/// EIP-820 style interface registry
#[derive(Clone)]
pub struct InterfaceRegistry {
    contract: ContractRef,
}

impl InterfaceRegistry {
    pub async fn deploy(client: Arc<RpcClient>, options: &TxOptions, receipt_poll: Duration) -> Result<Self> {
        let contract =
            ContractRef::deploy(client, ContractInit::InterfaceRegistry, options, receipt_poll).await?;
        Ok(Self { contract })
    }

    pub fn at(contract: ContractRef) -> Self {
        Self { contract }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub fn contract(&self) -> &ContractRef {
        &self.contract
    }

    pub async fn interface_hash(&self, name: &str) -> Result<Hash> {
        self.contract.query_as("interfaceHash", vec![json!(name)]).await
    }

    pub async fn get_manager(&self, address: Address) -> Result<Address> {
        self.contract.query_as("getManager", vec![json!(address)]).await
    }

    pub async fn set_manager(&self, address: Address, manager: Address, options: &TxOptions) -> Result<ReceiptInfo> {
        self.contract
            .invoke("setManager", vec![json!(address), json!(manager)], options)
            .await
    }

    pub async fn get_interface_implementer(&self, address: Address, interface: &str) -> Result<Address> {
        self.contract
            .query_as("getInterfaceImplementer", vec![json!(address), json!(interface)])
            .await
    }

    pub async fn set_interface_implementer(
        &self,
        address: Address,
        interface: &str,
        implementer: Address,
        options: &TxOptions,
    ) -> Result<ReceiptInfo> {
        self.contract
            .invoke(
                "setInterfaceImplementer",
                vec![json!(address), json!(interface), json!(implementer)],
                options,
            )
            .await
    }
}

// =============================================================================
// REFERENCE TOKEN
// =============================================================================

/// EIP-777 style token with ERC-20 compatibility; amounts are signed base units
#[derive(Clone)]
pub struct ReferenceToken {
    contract: ContractRef,
}

impl ReferenceToken {
    pub async fn deploy(
        client: Arc<RpcClient>,
        name: &str,
        symbol: &str,
        granularity: Balance,
        registry: Address,
        options: &TxOptions,
        receipt_poll: Duration,
    ) -> Result<Self> {
        let init = ContractInit::ReferenceToken {
            name: name.to_string(),
            symbol: symbol.to_string(),
            granularity,
            registry,
        };
        let contract = ContractRef::deploy(client, init, options, receipt_poll).await?;
        Ok(Self { contract })
    }

    pub fn at(contract: ContractRef) -> Self {
        Self { contract }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub fn contract(&self) -> &ContractRef {
        &self.contract
    }

    // Views

    pub async fn name(&self) -> Result<String> {
        self.contract.query_as("name", vec![]).await
    }

    pub async fn symbol(&self) -> Result<String> {
        self.contract.query_as("symbol", vec![]).await
    }

    pub async fn decimals(&self) -> Result<u8> {
        self.contract.query_as("decimals", vec![]).await
    }

    pub async fn granularity(&self) -> Result<i128> {
        self.contract.query_amount("granularity", vec![]).await
    }

    pub async fn owner(&self) -> Result<Address> {
        self.contract.query_as("owner", vec![]).await
    }

    pub async fn total_supply(&self) -> Result<i128> {
        self.contract.query_amount("totalSupply", vec![]).await
    }

    pub async fn balance_of(&self, holder: Address) -> Result<i128> {
        self.contract.query_amount("balanceOf", vec![json!(holder)]).await
    }

    pub async fn is_operator_for(&self, operator: Address, holder: Address) -> Result<bool> {
        self.contract
            .query_as("isOperatorFor", vec![json!(operator), json!(holder)])
            .await
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<i128> {
        self.contract
            .query_amount("allowance", vec![json!(owner), json!(spender)])
            .await
    }

    // Writes

    pub async fn owner_mint(
        &self,
        to: Address,
        amount: i128,
        operator_data: &[u8],
        options: &TxOptions,
    ) -> Result<ReceiptInfo> {
        self.contract
            .invoke(
                "ownerMint",
                vec![json!(to), amount_arg(amount), bytes_arg(operator_data)],
                options,
            )
            .await
    }

    pub async fn send(&self, to: Address, amount: i128, options: &TxOptions) -> Result<ReceiptInfo> {
        self.send_with_data(to, amount, &[], options).await
    }

    pub async fn send_with_data(
        &self,
        to: Address,
        amount: i128,
        user_data: &[u8],
        options: &TxOptions,
    ) -> Result<ReceiptInfo> {
        self.contract
            .invoke(
                "send",
                vec![json!(to), amount_arg(amount), bytes_arg(user_data)],
                options,
            )
            .await
    }

    pub async fn operator_send(
        &self,
        from: Address,
        to: Address,
        amount: i128,
        user_data: &[u8],
        operator_data: &[u8],
        options: &TxOptions,
    ) -> Result<ReceiptInfo> {
        self.contract
            .invoke(
                "operatorSend",
                vec![
                    json!(from),
                    json!(to),
                    amount_arg(amount),
                    bytes_arg(user_data),
                    bytes_arg(operator_data),
                ],
                options,
            )
            .await
    }

    pub async fn burn(&self, amount: i128, holder_data: &[u8], options: &TxOptions) -> Result<ReceiptInfo> {
        self.contract
            .invoke("burn", vec![amount_arg(amount), bytes_arg(holder_data)], options)
            .await
    }

    pub async fn authorize_operator(&self, operator: Address, options: &TxOptions) -> Result<ReceiptInfo> {
        self.contract
            .invoke("authorizeOperator", vec![json!(operator)], options)
            .await
    }

    pub async fn revoke_operator(&self, operator: Address, options: &TxOptions) -> Result<ReceiptInfo> {
        self.contract
            .invoke("revokeOperator", vec![json!(operator)], options)
            .await
    }

    pub async fn transfer(&self, to: Address, amount: i128, options: &TxOptions) -> Result<ReceiptInfo> {
        self.contract
            .invoke("transfer", vec![json!(to), amount_arg(amount)], options)
            .await
    }

    pub async fn approve(&self, spender: Address, amount: i128, options: &TxOptions) -> Result<ReceiptInfo> {
        self.contract
            .invoke("approve", vec![json!(spender), amount_arg(amount)], options)
            .await
    }

    pub async fn transfer_from(
        &self,
        from: Address,
        to: Address,
        amount: i128,
        options: &TxOptions,
    ) -> Result<ReceiptInfo> {
        self.contract
            .invoke(
                "transferFrom",
                vec![json!(from), json!(to), amount_arg(amount)],
                options,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(status: bool) -> ReceiptInfo {
        ReceiptInfo {
            transaction_hash: Hash::hash(b"tx"),
            block_number: 3,
            block_hash: Hash::ZERO,
            from: Address::ZERO,
            to: None,
            contract_address: None,
            gas_used: 21_000,
            status,
            revert_reason: (!status).then(|| "invalid opcode".to_string()),
            revert_kind: (!status).then(|| "invalid_operation".to_string()),
            logs: Vec::new(),
        }
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(&receipt(true)).is_ok());

        let err = check_status(&receipt(false)).unwrap_err();
        assert_eq!(err.revert_kind(), Some("invalid_operation"));
        assert_eq!(err.tx_hash(), Some(Hash::hash(b"tx")));
    }

    #[test]
    fn test_argument_encoding() {
        assert_eq!(amount_arg(-3), json!("-3"));
        assert_eq!(amount_arg(10_000_000_000_000_000), json!("10000000000000000"));
        assert_eq!(bytes_arg(&[]), json!("0x"));
        assert_eq!(bytes_arg(&[0xde, 0xad]), json!("0xdead"));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("balanceOf", &json!("7")).unwrap(), 7);
        assert!(matches!(
            parse_amount("balanceOf", &json!(7)),
            Err(HarnessError::Decode(_))
        ));
    }

    #[test]
    fn test_tx_options() {
        let from = Address::from_bytes([1u8; 20]);
        let request = TxOptions::from(from).gas(300_000).request();
        assert_eq!(request.from, from);
        assert_eq!(request.gas, Some(300_000));
        assert!(request.to.is_none());
        assert!(request.deploy.is_none());
    }
}
