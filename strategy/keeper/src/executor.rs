//! Transaction submission and outcome classification.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use alloy::primitives::TxHash;
use clients_rebalancer::{ClientError, TxHandle, TxReceipt};
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

/// Contract calls that produce a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxAction {
    StartSummarize,
    SummarizeStep,
    Rebalance,
}

impl fmt::Display for TxAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxAction::StartSummarize => write!(f, "startSummarizeTrades"),
            TxAction::SummarizeStep => write!(f, "summarizeUsersStates"),
            TxAction::Rebalance => write!(f, "rebalance"),
        }
    }
}

/// Why a transaction could not be confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnconfirmedReason {
    /// The node refused the submission.
    Rejected(String),
    /// Submission or inclusion did not finish within the timeout.
    TimedOut,
    /// The receipt could not be fetched after submission.
    Dropped(String),
}

impl fmt::Display for UnconfirmedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnconfirmedReason::Rejected(msg) => write!(f, "rejected: {}", msg),
            UnconfirmedReason::TimedOut => write!(f, "timed out"),
            UnconfirmedReason::Dropped(msg) => write!(f, "receipt unavailable: {}", msg),
        }
    }
}

/// Result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Success(TxReceipt),
    Reverted(String),
    /// True progress is unknown; re-read on-chain state before acting again.
    Unconfirmed {
        tx_hash: Option<TxHash>,
        reason: UnconfirmedReason,
    },
}

impl TxOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TxOutcome::Success(_))
    }
}

/// Submits one transaction-producing call and waits, bounded, for its receipt.
#[derive(Debug, Clone)]
pub struct TxExecutor {
    timeout: Duration,
}

impl TxExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Resolves `submit` into exactly one [`TxOutcome`].
    ///
    /// Submission and inclusion share one deadline. Nothing is retried here.
    /// Only connection-level submission failures are returned as errors.
    pub async fn execute<F>(&self, action: TxAction, submit: F) -> Result<TxOutcome, ClientError>
    where
        F: Future<Output = Result<TxHandle, ClientError>>,
    {
        let deadline = Instant::now() + self.timeout;
        let handle = match timeout_at(deadline, submit).await {
            Err(_) => {
                return Ok(self.log(action, TxOutcome::Unconfirmed {
                    tx_hash: None,
                    reason: UnconfirmedReason::TimedOut,
                }))
            }
            Ok(Err(e @ ClientError::Connection(_))) => return Err(e),
            Ok(Err(ClientError::Reverted(reason))) => {
                return Ok(self.log(action, TxOutcome::Reverted(reason)))
            }
            Ok(Err(e)) => {
                return Ok(self.log(action, TxOutcome::Unconfirmed {
                    tx_hash: None,
                    reason: UnconfirmedReason::Rejected(e.to_string()),
                }))
            }
            Ok(Ok(handle)) => handle,
        };

        let tx_hash = handle.tx_hash();
        let outcome = match timeout_at(deadline, handle.inclusion()).await {
            Err(_) => TxOutcome::Unconfirmed {
                tx_hash: Some(tx_hash),
                reason: UnconfirmedReason::TimedOut,
            },
            Ok(Err(e)) => TxOutcome::Unconfirmed {
                tx_hash: Some(tx_hash),
                reason: UnconfirmedReason::Dropped(e.to_string()),
            },
            Ok(Ok(receipt)) if receipt.success => TxOutcome::Success(receipt),
            Ok(Ok(receipt)) => TxOutcome::Reverted(format!(
                "transaction {} reverted in block {}",
                receipt.tx_hash,
                receipt
                    .block_number
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "?".to_string())
            )),
        };
        Ok(self.log(action, outcome))
    }

    fn log(&self, action: TxAction, outcome: TxOutcome) -> TxOutcome {
        match &outcome {
            TxOutcome::Success(receipt) => info!(
                %action,
                tx_hash = %receipt.tx_hash,
                block = receipt.block_number,
                gas_used = receipt.gas_used,
                "transaction confirmed"
            ),
            TxOutcome::Reverted(reason) => warn!(%action, %reason, "transaction reverted"),
            TxOutcome::Unconfirmed { tx_hash, reason } => warn!(
                %action,
                tx_hash = ?tx_hash,
                %reason,
                "transaction unconfirmed"
            ),
        }
        outcome
    }
}
