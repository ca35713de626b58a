mod chain;
mod config;
mod contracts;
mod deploy;
mod error;
mod rebalancer;
mod types;

pub use chain::{ChainClient, RpcChainClient, DEFAULT_POLL_INTERVAL, MAX_POLL_BACKOFF};
pub use config::{
    ChainClientConfig, DevDeployConfig, RebalancerConfig, TransportKind, DEV_POOL_FEE,
    DEV_TOKEN_A, DEV_TOKEN_B,
};
pub use deploy::deploy_dev_rebalancer;
pub use error::{ClientError, ConfigError};
pub use rebalancer::{ContractHandle, RpcRebalancer};
pub use types::{
    BlockHeight, PositionState, RebalanceParams, SummarizationStage, TxHandle, TxReceipt,
};
