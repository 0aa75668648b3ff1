// Harness - node lifecycle, client connection and step sequencing for a suite

use crate::client::RpcClient;
use crate::config::{HarnessConfig, TransportKind};
use crate::contract::{InterfaceRegistry, ReferenceToken, TxOptions};
use crate::error::{HarnessError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};
use xrt_devnode::rpc::RpcServerError;
use xrt_devnode::types::{Address, Balance, BlockNumber};
use xrt_devnode::{start_node, RunnerError, RunningNode};

/// Ephemeral dev node owned by one suite
pub struct NodeHandle {
    node: Option<RunningNode>,
    addr: SocketAddr,
}

impl NodeHandle {
    /// Start an isolated node; fails at once if the port is already bound
    pub async fn start(config: &HarnessConfig) -> Result<Self> {
        let node_config = config
            .node_config()
            .map_err(|e| HarnessError::Config(e.to_string()))?;

        let node = start_node(node_config).await.map_err(|e| match e {
            RunnerError::Rpc(RpcServerError::BindError(msg)) => {
                HarnessError::Infrastructure(format!("Cannot bind node: {}", msg))
            }
            other => HarnessError::Infrastructure(other.to_string()),
        })?;
        let addr = node.addr();
        info!("Test node listening on {}", addr);

        Ok(Self {
            node: Some(node),
            addr,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn http_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    pub fn endpoint(&self, transport: TransportKind) -> String {
        match transport {
            TransportKind::Http => self.http_url(),
            TransportKind::Ws => self.ws_url(),
        }
    }

    /// Stop the node and wait until its port is released
    pub async fn shutdown(mut self) {
        if let Some(node) = self.node.take() {
            node.shutdown().await;
            info!("Test node on {} shut down", self.addr);
        }
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        // Dropping the running node signals its server to stop
        if self.node.is_some() {
            warn!("Test node on {} dropped without shutdown", self.addr);
        }
    }
}

/// Fixture passed to every step of a suite
pub struct Harness {
    config: HarnessConfig,
    node: NodeHandle,
    client: Arc<RpcClient>,
    accounts: Vec<Address>,
    checkpoints: Vec<BlockNumber>,
}

impl Harness {
    /// Start the node, connect a client and load the account set
    pub async fn launch(config: HarnessConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| HarnessError::Config(e.to_string()))?;

        let node = NodeHandle::start(&config).await?;
        let endpoint = node.endpoint(config.transport);

        let connected = async {
            let client = bounded(config.step_timeout(), RpcClient::connect(&endpoint)).await?;
            let accounts = bounded(config.step_timeout(), client.accounts()).await?;
            Ok::<_, HarnessError>((client, accounts))
        }
        .await;

        let (client, accounts) = match connected {
            Ok(connected) => connected,
            Err(e) => {
                node.shutdown().await;
                return Err(e);
            }
        };
        debug!(%endpoint, accounts = accounts.len(), "Harness ready");

        Ok(Self {
            config,
            node,
            client: Arc::new(client),
            accounts,
            checkpoints: Vec::new(),
        })
    }

    /// Launch, run `body`, then shut down whatever happened in between
    ///
    /// A panic inside `body` is re-raised after the node is stopped.
    pub async fn run<F>(config: HarnessConfig, body: F) -> Result<()>
    where
        F: for<'a> FnOnce(&'a mut Harness) -> BoxFuture<'a, Result<()>>,
    {
        let mut harness = Harness::launch(config).await?;
        let outcome = AssertUnwindSafe(body(&mut harness)).catch_unwind().await;
        harness.shutdown().await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Bound one network operation by the step timeout
    pub async fn step<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        bounded(self.config.step_timeout(), future).await
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn node(&self) -> &NodeHandle {
        &self.node
    }

    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// Account `index` of the node's unlocked set
    pub fn account(&self, index: usize) -> Result<Address> {
        self.accounts.get(index).copied().ok_or_else(|| {
            HarnessError::Config(format!(
                "account {} requested, node has {}",
                index,
                self.accounts.len()
            ))
        })
    }

    /// Options for a state-changing call from `from` with the default gas
    pub fn tx(&self, from: Address) -> TxOptions {
        TxOptions::from(from).gas(self.config.default_gas)
    }

    pub async fn deploy_registry(&self, from: Address) -> Result<InterfaceRegistry> {
        let options = TxOptions::from(from).gas(self.config.deploy_gas);
        let registry = self
            .step(InterfaceRegistry::deploy(
                self.client.clone(),
                &options,
                self.config.receipt_poll(),
            ))
            .await?;
        debug!("Interface registry deployed at {}", registry.address());
        Ok(registry)
    }

    pub async fn deploy_token(
        &self,
        name: &str,
        symbol: &str,
        granularity: Balance,
        registry: Address,
        from: Address,
    ) -> Result<ReferenceToken> {
        let options = TxOptions::from(from).gas(self.config.deploy_gas);
        let token = self
            .step(ReferenceToken::deploy(
                self.client.clone(),
                name,
                symbol,
                granularity,
                registry,
                &options,
                self.config.receipt_poll(),
            ))
            .await?;
        debug!("{} ({}) deployed at {}", name, symbol, token.address());
        Ok(token)
    }

    /// Record the current block number
    pub async fn checkpoint(&mut self) -> Result<BlockNumber> {
        let number = self.step(self.client.block_number()).await?;
        debug!(block = number, "Checkpoint");
        self.checkpoints.push(number);
        Ok(number)
    }

    pub fn checkpoints(&self) -> &[BlockNumber] {
        &self.checkpoints
    }

    /// Stop the node; the harness is unusable afterwards
    pub async fn shutdown(self) {
        self.client.close().await;
        self.node.shutdown().await;
    }
}

async fn bounded<T, F>(timeout: std::time::Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| HarnessError::Timeout(timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_step_timeout() {
        let result = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, HarnessError>(())
        })
        .await;
        assert!(matches!(result, Err(HarnessError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_step_passes_errors_through() {
        let result: Result<()> = bounded(Duration::from_secs(1), async {
            Err(HarnessError::Rejected("nonce".to_string()))
        })
        .await;
        assert!(matches!(result, Err(HarnessError::Rejected(_))));
    }
}
