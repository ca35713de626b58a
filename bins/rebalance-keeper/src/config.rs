//! Command line / environment configuration of the keeper binary.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use clap::Parser;
use clients_rebalancer::{
    ChainClientConfig, ConfigError, DevDeployConfig, RebalancerConfig, TransportKind,
};
use keeper::{KeeperConfig, MAX_TICK_SPACING};

#[derive(Parser, Debug, Clone)]
#[command(name = "rebalance-keeper")]
#[command(about = "Drives a rebalancer contract's summarization and rebalancing on every block")]
pub struct Cli {
    /// Node endpoint: an http URL or an IPC socket path
    #[arg(long, env = "PROVIDER")]
    pub provider: Option<String>,

    /// Transport used to reach the node: `ipc` or `http`
    #[arg(long, env = "PROVIDER_TYPE")]
    pub provider_type: Option<String>,

    /// Runtime mode; `development` deploys a fresh rebalancer at startup
    #[arg(long, env = "NODE_ENV", default_value = "production")]
    pub node_env: String,

    /// Address of the deployed rebalancer (required outside development)
    #[arg(long, env = "REBALANCER_ADDRESS")]
    pub rebalancer_address: Option<String>,

    /// Hardhat artifact of the RebalancerFactory (required in development)
    #[arg(long = "factory-artifact", env = "REBALANCER_FACTORY_ARTIFACT")]
    pub factory_artifact: Option<PathBuf>,

    /// Hex private key used to sign transactions; the node's first account otherwise
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Bounded wait per transaction, in seconds
    #[arg(long, env = "TX_TIMEOUT_SECS", default_value_t = 120)]
    pub tx_timeout_secs: u64,

    #[arg(long, env = "MAX_STEPS_PER_BLOCK", default_value_t = 64)]
    pub max_steps_per_block: usize,

    /// Start a summarization run every N blocks
    #[arg(long, env = "SUMMARIZE_EVERY", default_value_t = 1)]
    pub summarize_every: u64,

    #[arg(long, env = "TICK_SPACING", default_value_t = 60)]
    pub tick_spacing: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Development,
    Production,
}

impl RuntimeMode {
    fn from_node_env(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("development") {
            RuntimeMode::Development
        } else {
            RuntimeMode::Production
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeMode::Development => write!(f, "development"),
            RuntimeMode::Production => write!(f, "production"),
        }
    }
}

/// Where the rebalancer comes from.
#[derive(Debug, Clone)]
pub enum RebalancerTarget {
    Existing(RebalancerConfig),
    Deploy(DevDeployConfig),
}

/// Validated startup configuration.
pub struct AgentConfig {
    pub mode: RuntimeMode,
    pub chain: ChainClientConfig,
    pub target: RebalancerTarget,
    pub signer: Option<PrivateKeySigner>,
    pub keeper: KeeperConfig,
}

impl AgentConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let endpoint = cli
            .provider
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::MissingEndpoint)?;
        let transport = cli
            .provider_type
            .ok_or(ConfigError::MissingTransport)?
            .parse::<TransportKind>()?;
        if transport == TransportKind::Http {
            url::Url::parse(&endpoint).map_err(|e| ConfigError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;
        }

        let mode = RuntimeMode::from_node_env(&cli.node_env);
        let target = match mode {
            RuntimeMode::Development => {
                let artifact = cli.factory_artifact.ok_or(ConfigError::MissingArtifact)?;
                RebalancerTarget::Deploy(DevDeployConfig::with_artifact(artifact))
            }
            RuntimeMode::Production => {
                let raw = cli.rebalancer_address.ok_or(ConfigError::MissingAddress)?;
                let address = Address::from_str(raw.trim())
                    .map_err(|_| ConfigError::InvalidAddress(raw.clone()))?;
                RebalancerTarget::Existing(RebalancerConfig { address })
            }
        };

        if !(1..=MAX_TICK_SPACING).contains(&cli.tick_spacing) {
            return Err(ConfigError::InvalidTickSpacing(
                cli.tick_spacing,
                MAX_TICK_SPACING,
            ));
        }

        let signer = match cli.private_key {
            Some(key) => Some(
                PrivateKeySigner::from_str(key.trim())
                    .map_err(|_| ConfigError::InvalidPrivateKey)?,
            ),
            None => None,
        };

        Ok(Self {
            mode,
            chain: ChainClientConfig {
                endpoint,
                transport,
                poll_interval_ms: cli.poll_interval_ms,
            },
            target,
            signer,
            keeper: KeeperConfig {
                tx_timeout_secs: cli.tx_timeout_secs,
                max_steps_per_block: cli.max_steps_per_block,
                summarize_every: cli.summarize_every,
                tick_spacing: cli.tick_spacing,
            },
        })
    }
}
