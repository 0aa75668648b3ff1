// CLI - Command Line Interface for the XRT dev node

pub mod config;
pub mod runner;

use clap::{Parser, Subcommand};

/// XRT dev node - ephemeral instant-mining chain for contract tests
#[derive(Parser, Debug)]
#[command(name = "xrt-devnode")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ephemeral development chain hosting the reference token and interface registry")]
#[command(long_about = r#"
Single-authority development chain with instant mining: every accepted
transaction is sealed in its own block before the RPC call returns.

Start a node for a test run:
  xrt-devnode run --port 8546 --gas-limit 5800000 --accounts 10

Print the accounts a seed produces:
  xrt-devnode accounts --seed xrt --count 3
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", env = "XRT_LOG")]
    pub log_level: String,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the node
    Run(RunCmd),

    /// List the dev accounts derived from a seed
    Accounts(AccountsCmd),
}

/// Run the node
#[derive(Parser, Debug, Clone)]
pub struct RunCmd {
    /// Listen address for JSON-RPC (HTTP and WebSocket)
    #[arg(long, default_value = "127.0.0.1", env = "XRT_HOST")]
    pub host: String,

    /// Listen port for JSON-RPC
    #[arg(short, long, default_value = "8546", env = "XRT_PORT")]
    pub port: u16,

    /// Block gas limit
    #[arg(long, default_value = "6721975", env = "XRT_GAS_LIMIT")]
    pub gas_limit: u64,

    /// Number of unlocked, pre-funded accounts
    #[arg(short, long, default_value = "10", env = "XRT_ACCOUNTS")]
    pub accounts: u32,

    /// Seed for deterministic accounts (random when omitted)
    #[arg(long, env = "XRT_SEED")]
    pub seed: Option<String>,

    /// Initial balance of each account, in ether
    #[arg(long, default_value = "100", env = "XRT_DEFAULT_BALANCE")]
    pub default_balance: u64,

    /// Default gas price, in wei
    #[arg(long, default_value = "20000000000", env = "XRT_GAS_PRICE")]
    pub gas_price: u64,
}

/// List dev accounts
#[derive(Parser, Debug)]
pub struct AccountsCmd {
    /// Seed the node would be started with
    #[arg(long, env = "XRT_SEED")]
    pub seed: String,

    /// Number of accounts
    #[arg(short, long, default_value = "10")]
    pub count: u32,
}
