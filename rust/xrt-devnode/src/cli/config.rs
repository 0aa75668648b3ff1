// CLI Configuration - Convert CLI args to node config

use crate::cli::RunCmd;
use crate::rpc::RpcConfig;
use crate::types::{Balance, Gas, DEFAULT_ACCOUNT_BALANCE, DEFAULT_BLOCK_GAS_LIMIT, DEFAULT_GAS_PRICE, DEV_CHAIN_ID, ETHER};
use std::net::{IpAddr, Ipv4Addr};

/// Complete node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// RPC listen configuration
    pub rpc: RpcConfig,
    /// Number of unlocked dev accounts
    pub total_accounts: u32,
    /// Seed for deterministic accounts; random keys when `None`
    pub seed: Option<String>,
    /// Initial balance of every dev account (wei)
    pub default_balance: Balance,
    /// Block gas limit
    pub gas_limit: Gas,
    /// Gas price used when a transaction does not name one (wei)
    pub gas_price: Balance,
    pub chain_id: u64,
}

impl NodeConfig {
    /// Defaults of a local dev node
    pub fn dev() -> Self {
        Self {
            rpc: RpcConfig::default(),
            total_accounts: 10,
            seed: None,
            default_balance: DEFAULT_ACCOUNT_BALANCE,
            gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
            gas_price: DEFAULT_GAS_PRICE,
            chain_id: DEV_CHAIN_ID,
        }
    }

    /// Create configuration from CLI run command
    pub fn from_run_cmd(cmd: &RunCmd) -> Result<Self, ConfigError> {
        let address = Self::parse_host(&cmd.host)?;

        let default_balance = (cmd.default_balance as Balance)
            .checked_mul(ETHER)
            .ok_or_else(|| ConfigError::InvalidValue(format!("balance {}", cmd.default_balance)))?;

        let config = Self {
            rpc: RpcConfig {
                address,
                port: cmd.port,
                ..Default::default()
            },
            total_accounts: cmd.accounts,
            seed: cmd.seed.clone(),
            default_balance,
            gas_limit: cmd.gas_limit,
            gas_price: cmd.gas_price as Balance,
            chain_id: DEV_CHAIN_ID,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_host(mut self, address: IpAddr) -> Self {
        self.rpc.address = address;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.rpc.port = port;
        self
    }

    pub fn with_accounts(mut self, total: u32) -> Self {
        self.total_accounts = total;
        self
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: Gas) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_accounts == 0 {
            return Err(ConfigError::InvalidValue(
                "at least one account is required".to_string(),
            ));
        }
        if self.gas_limit < crate::execution::gas::costs::TRANSACTION {
            return Err(ConfigError::InvalidValue(format!(
                "gas limit {} is below the cost of a transaction",
                self.gas_limit
            )));
        }
        Ok(())
    }

    fn parse_host(host: &str) -> Result<IpAddr, ConfigError> {
        match host {
            "localhost" => Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            other => other
                .parse()
                .map_err(|_| ConfigError::InvalidIpAddress(other.to_string())),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::dev()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd() -> RunCmd {
        RunCmd {
            host: "localhost".to_string(),
            port: 8546,
            gas_limit: 5_800_000,
            accounts: 10,
            seed: Some("xrt".to_string()),
            default_balance: 100,
            gas_price: 1,
        }
    }

    #[test]
    fn test_from_run_cmd() {
        let config = NodeConfig::from_run_cmd(&cmd()).unwrap();
        assert_eq!(config.rpc.socket_addr().to_string(), "127.0.0.1:8546");
        assert_eq!(config.gas_limit, 5_800_000);
        assert_eq!(config.default_balance, 100 * ETHER);
        assert_eq!(config.seed.as_deref(), Some("xrt"));
    }

    #[test]
    fn test_invalid_host() {
        let mut bad = cmd();
        bad.host = "not-an-ip".to_string();
        assert!(matches!(
            NodeConfig::from_run_cmd(&bad),
            Err(ConfigError::InvalidIpAddress(_))
        ));
    }

    #[test]
    fn test_validation() {
        let mut no_accounts = cmd();
        no_accounts.accounts = 0;
        assert!(NodeConfig::from_run_cmd(&no_accounts).is_err());

        let mut tiny_gas = cmd();
        tiny_gas.gas_limit = 1_000;
        assert!(NodeConfig::from_run_cmd(&tiny_gas).is_err());
    }

    #[test]
    fn test_builders() {
        let config = NodeConfig::dev().with_port(0).with_accounts(2).with_seed("s");
        assert_eq!(config.rpc.port, 0);
        assert_eq!(config.total_accounts, 2);
        assert_eq!(config.seed.as_deref(), Some("s"));
    }
}
