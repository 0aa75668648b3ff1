// Runner - Node startup, RPC event loop, and graceful shutdown

use crate::cli::config::NodeConfig;
use crate::node::DevNode;
use crate::rpc::types::format_ether;
use crate::rpc::{RpcCall, RpcServer, RpcServerError, RpcServerHandle};
use crate::types::Address;
use std::net::SocketAddr;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A node serving JSON-RPC in the background
pub struct RunningNode {
    addr: SocketAddr,
    accounts: Vec<Address>,
    server: RpcServerHandle,
    event_loop: JoinHandle<()>,
}

impl RunningNode {
    /// Address the RPC server is bound to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// Stop serving and release the port
    pub async fn shutdown(self) {
        self.server.stop().await;
        self.event_loop.abort();
        let _ = self.event_loop.await;
        info!("Node on {} stopped", self.addr);
    }
}

/// Build the chain, bind the RPC server and spawn the event loop
pub async fn start_node(config: NodeConfig) -> Result<RunningNode, RunnerError> {
    config
        .validate()
        .map_err(|e| RunnerError::Config(e.to_string()))?;

    let node = DevNode::new(&config);
    let accounts = node.accounts();

    let (rpc_tx, rpc_rx) = mpsc::unbounded_channel::<RpcCall>();

    // Bind before spawning so a taken port surfaces here
    let server = RpcServer::new(&config.rpc).start_background(rpc_tx).await?;
    let addr = server.address();

    let event_loop = tokio::spawn(run_event_loop(node, rpc_rx));

    Ok(RunningNode {
        addr,
        accounts,
        server,
        event_loop,
    })
}

/// Run the node until Ctrl+C
pub async fn run_node(config: NodeConfig) -> Result<(), RunnerError> {
    let default_balance = config.default_balance;
    let running = start_node(config).await?;

    info!("Available accounts");
    for (i, account) in running.accounts().iter().enumerate() {
        info!("  ({}) {} ({})", i, account, format_ether(default_balance));
    }
    info!("Listening on http://{} and ws://{}", running.addr(), running.addr());

    tokio::select! {
        result = signal::ctrl_c() => {
            result.map_err(|e| RunnerError::Io(e.to_string()))?;
            info!("Ctrl+C received, shutting down...");
        }
    }

    running.shutdown().await;
    Ok(())
}

/// Owns the node; calls are applied one at a time in arrival order
async fn run_event_loop(mut node: DevNode, mut rpc_rx: mpsc::UnboundedReceiver<RpcCall>) {
    while let Some(call) = rpc_rx.recv().await {
        handle_rpc_call(&mut node, call);
    }
    debug!("RPC channel closed, event loop exiting");
}

fn handle_rpc_call(node: &mut DevNode, call: RpcCall) {
    match call {
        RpcCall::ChainId(resp) => {
            let _ = resp.send(node.chain_id());
        }
        RpcCall::Accounts(resp) => {
            let _ = resp.send(node.accounts());
        }
        RpcCall::BlockNumber(resp) => {
            let _ = resp.send(node.block_number());
        }
        RpcCall::GasLimit(resp) => {
            let _ = resp.send(node.gas_limit());
        }
        RpcCall::GasPrice(resp) => {
            let _ = resp.send(node.gas_price());
        }
        RpcCall::GetBalance(address, resp) => {
            let _ = resp.send(node.balance(&address));
        }
        RpcCall::GetTransactionCount(address, resp) => {
            let _ = resp.send(node.nonce(&address));
        }
        RpcCall::GetCode(address, resp) => {
            let _ = resp.send(node.code(&address));
        }
        RpcCall::GetBlock(tag, resp) => {
            let _ = resp.send(node.block(tag));
        }
        RpcCall::GetReceipt(hash, resp) => {
            let _ = resp.send(node.receipt(&hash));
        }
        RpcCall::SendTransaction(request, resp) => {
            let _ = resp.send(node.send_transaction(request));
        }
        RpcCall::Call(request, resp) => {
            let _ = resp.send(node.call(request));
        }
        RpcCall::Snapshot(resp) => {
            let _ = resp.send(node.snapshot());
        }
        RpcCall::Revert(id, resp) => {
            let _ = resp.send(node.revert(id));
        }
        RpcCall::Mine(resp) => {
            let _ = resp.send(node.mine());
        }
        RpcCall::SystemHealth(resp) => {
            let _ = resp.send(node.health());
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("RPC server error: {0}")]
    Rpc(#[from] RpcServerError),

    #[error("Config error: {0}")]
    Config(String),
}
