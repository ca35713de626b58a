//! Domain types read from or written to the rebalancer contract.

use std::fmt;

use alloy::primitives::{TxHash, U256};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Sequential block number identifying chain progress.
pub type BlockHeight = u64;

/// On-chain progress marker of the summarization workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummarizationStage {
    Idle,
    Started,
    /// Number of steps already executed in the current run.
    InProgress(u64),
}

impl SummarizationStage {
    const RAW_IDLE: u8 = 0;
    const RAW_STARTED: u8 = 1;
    const RAW_IN_PROGRESS: u8 = 2;

    /// Decodes the `(stage, stepsDone)` pair returned by `summParams()`.
    pub fn from_raw(stage: u8, steps_done: u64) -> Result<Self, ClientError> {
        match stage {
            Self::RAW_IDLE => Ok(SummarizationStage::Idle),
            Self::RAW_STARTED => Ok(SummarizationStage::Started),
            Self::RAW_IN_PROGRESS => Ok(SummarizationStage::InProgress(steps_done)),
            other => Err(ClientError::Decode(format!(
                "unknown summarization stage {}",
                other
            ))),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SummarizationStage::Idle)
    }
}

impl fmt::Display for SummarizationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummarizationStage::Idle => write!(f, "idle"),
            SummarizationStage::Started => write!(f, "started"),
            SummarizationStage::InProgress(steps) => write!(f, "in_progress({})", steps),
        }
    }
}

/// Liquidity position as reported by `getPositionState()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionState {
    /// Current pool tick
    pub current_tick: i32,
    /// Lower tick bound of the position
    pub tick_lower: i32,
    /// Upper tick bound of the position
    pub tick_upper: i32,
    /// Liquidity held by the position
    pub liquidity: u128,
    /// Pool price as a Q64.96 square root
    pub sqrt_price_x96: U256,
}

/// New tick bounds passed to `rebalance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceParams {
    pub tick_lower: i32,
    pub tick_upper: i32,
}

/// Confirmation record of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<BlockHeight>,
    /// `false` when the transaction reverted
    pub success: bool,
    pub gas_used: u64,
}

/// A submitted transaction whose inclusion has not been observed yet.
pub struct TxHandle {
    tx_hash: TxHash,
    inclusion: BoxFuture<'static, Result<TxReceipt, ClientError>>,
}

impl TxHandle {
    pub fn new(
        tx_hash: TxHash,
        inclusion: BoxFuture<'static, Result<TxReceipt, ClientError>>,
    ) -> Self {
        Self { tx_hash, inclusion }
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    /// Resolves once the transaction is mined. Unbounded; callers add their own timeout.
    pub async fn inclusion(self) -> Result<TxReceipt, ClientError> {
        self.inclusion.await
    }
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle")
            .field("tx_hash", &self.tx_hash)
            .finish_non_exhaustive()
    }
}
