//! Configuration types for the chain and rebalancer clients.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// WETH on Ethereum mainnet, token A of the development pool
pub const DEV_TOKEN_A: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
/// USDC on Ethereum mainnet, token B of the development pool
pub const DEV_TOKEN_B: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
/// Pool fee tier of the development pool (0.3%)
pub const DEV_POOL_FEE: u32 = 3000;

/// How the agent talks to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Local socket, endpoint is a filesystem path
    Ipc,
    /// JSON-RPC over HTTP, endpoint is a URL
    Http,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ipc" => Ok(TransportKind::Ipc),
            "http" => Ok(TransportKind::Http),
            other => Err(ConfigError::UnknownTransport(other.to_string())),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Ipc => write!(f, "ipc"),
            TransportKind::Http => write!(f, "http"),
        }
    }
}

/// Configuration for RpcChainClient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainClientConfig {
    /// Node endpoint: a URL for http, a socket path for ipc
    pub endpoint: String,
    /// Transport used to reach the endpoint
    pub transport: TransportKind,
    /// Delay between two block height polls, in milliseconds
    pub poll_interval_ms: u64,
}

/// Configuration for RpcRebalancer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancerConfig {
    /// The contract address of the deployed Rebalancer
    pub address: Address,
}

/// Parameters for deploying a throwaway rebalancer in development mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevDeployConfig {
    /// Hardhat artifact of the RebalancerFactory contract
    pub factory_artifact: PathBuf,
    pub token_a: Address,
    pub token_b: Address,
    pub fee: u32,
}

impl DevDeployConfig {
    /// Deploys against the WETH/USDC 0.3% pool.
    pub fn with_artifact(factory_artifact: PathBuf) -> Self {
        Self {
            factory_artifact,
            token_a: DEV_TOKEN_A,
            token_b: DEV_TOKEN_B,
            fee: DEV_POOL_FEE,
        }
    }
}
