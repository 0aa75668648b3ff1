//! Harness Configuration
//!
//! Node and client parameters for a test suite. Defaults match the
//! reference-token suite: a 10-account node on 127.0.0.1:8546 with a
//! 5.8M block gas limit, reached over WebSocket.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use xrt_devnode::types::Gas;
use xrt_devnode::NodeConfig;

/// How the client reaches the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Ws,
}

impl std::str::FromStr for TransportKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(TransportKind::Http),
            "ws" | "websocket" => Ok(TransportKind::Ws),
            other => anyhow::bail!("unknown transport {:?} (expected http or ws)", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    // === Node ===

    /// Listen address of the node
    pub host: String,

    /// Listen port (0 picks a free port)
    pub port: u16,

    /// Block gas limit
    pub gas_limit: Gas,

    /// Number of unlocked accounts
    pub accounts: u32,

    /// Account seed; random accounts when absent
    pub seed: Option<String>,

    // === Client ===

    pub transport: TransportKind,

    /// Upper bound on any single step (milliseconds)
    pub step_timeout_ms: u64,

    /// Gas for state-changing calls without an explicit limit
    pub default_gas: Gas,

    /// Gas for contract deployments
    pub deploy_gas: Gas,

    /// Interval between receipt lookups (milliseconds)
    pub receipt_poll_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8546,
            gas_limit: 5_800_000,
            accounts: 10,
            seed: None,

            transport: TransportKind::Ws,
            step_timeout_ms: 20_000,
            default_gas: 300_000,
            deploy_gas: 4_000_000,
            receipt_poll_ms: 50,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from TOML file; missing keys keep their defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// File named by `XRT_HARNESS_CONFIG`, or the defaults when unset
    pub fn from_config_env() -> anyhow::Result<Self> {
        Self::base(|key| std::env::var(key).ok())
    }

    fn base(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        match lookup("XRT_HARNESS_CONFIG") {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Apply `XRT_HARNESS_*` environment overrides
    pub fn with_env_overrides(self) -> anyhow::Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        if let Some(host) = lookup("XRT_HARNESS_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("XRT_HARNESS_PORT") {
            self.port = port.parse()?;
        }
        if let Some(gas_limit) = lookup("XRT_HARNESS_GAS_LIMIT") {
            self.gas_limit = gas_limit.parse()?;
        }
        if let Some(accounts) = lookup("XRT_HARNESS_ACCOUNTS") {
            self.accounts = accounts.parse()?;
        }
        if let Some(seed) = lookup("XRT_HARNESS_SEED") {
            self.seed = Some(seed);
        }
        if let Some(transport) = lookup("XRT_HARNESS_TRANSPORT") {
            self.transport = transport.parse()?;
        }
        if let Some(timeout) = lookup("XRT_HARNESS_STEP_TIMEOUT_MS") {
            self.step_timeout_ms = timeout.parse()?;
        }
        Ok(self)
    }

    // Builder-style methods for test overrides

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_accounts(mut self, accounts: u32) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn receipt_poll(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }

    /// Node configuration for an in-process dev node
    pub fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let address: IpAddr = match self.host.as_str() {
            "localhost" => IpAddr::from([127, 0, 0, 1]),
            host => host.parse()?,
        };
        let mut config = NodeConfig::dev()
            .with_host(address)
            .with_port(self.port)
            .with_gas_limit(self.gas_limit)
            .with_accounts(self.accounts);
        if let Some(seed) = &self.seed {
            config = config.with_seed(seed.clone());
        }
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.accounts < 2 {
            anyhow::bail!("accounts ({}) must be at least 2", self.accounts);
        }

        if self.default_gas > self.gas_limit {
            anyhow::bail!(
                "default_gas ({}) must not exceed gas_limit ({})",
                self.default_gas,
                self.gas_limit
            );
        }

        if self.deploy_gas > self.gas_limit {
            anyhow::bail!(
                "deploy_gas ({}) must not exceed gas_limit ({})",
                self.deploy_gas,
                self.gas_limit
            );
        }

        if self.step_timeout_ms == 0 {
            anyhow::bail!("step_timeout_ms must be positive");
        }

        self.node_config()?;
        Ok(())
    }
}
