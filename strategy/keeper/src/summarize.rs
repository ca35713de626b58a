//! Summarization stage state machine.
//!
//! Every decision is taken on a stage value read immediately before it: a
//! `startSummarizeTrades` only follows an `Idle` read, a `summarizeUsersStates`
//! only follows a non-`Idle` read. Any failed or unconfirmed transaction ends the
//! work for the current block; the next block starts again from a fresh read.

use std::sync::atomic::{AtomicU64, Ordering};

use clients_rebalancer::{BlockHeight, ClientError, ContractHandle, SummarizationStage};
use tracing::{debug, info};

use crate::executor::TxAction;
use crate::keeper::BlockContext;

/// Decides whether a new summarization run should start at a given height.
pub trait SummarizationSchedule: Send + Sync {
    fn should_start(&self, height: BlockHeight) -> bool;

    /// Called once a start transaction was confirmed while handling `height`.
    fn started(&self, _height: BlockHeight) {}
}

impl<F> SummarizationSchedule for F
where
    F: Fn(BlockHeight) -> bool + Send + Sync,
{
    fn should_start(&self, height: BlockHeight) -> bool {
        self(height)
    }
}

const NEVER_STARTED: u64 = u64::MAX;

/// Starts at most one run per window of `n` blocks (`[k*n, (k+1)*n)`).
///
/// Any observed height inside a window without a confirmed start is due, so
/// skipped heights never suppress a run. A start that failed is retried on
/// the next block of the same window.
#[derive(Debug)]
pub struct EveryNBlocks {
    n: u64,
    last_window: AtomicU64,
}

impl EveryNBlocks {
    pub fn new(n: u64) -> Self {
        Self {
            n: n.max(1),
            last_window: AtomicU64::new(NEVER_STARTED),
        }
    }

    fn window(&self, height: BlockHeight) -> u64 {
        height / self.n
    }
}

impl SummarizationSchedule for EveryNBlocks {
    fn should_start(&self, height: BlockHeight) -> bool {
        if self.n == 1 {
            return true;
        }
        match self.last_window.load(Ordering::Acquire) {
            NEVER_STARTED => true,
            last => self.window(height) > last,
        }
    }

    fn started(&self, height: BlockHeight) {
        let window = self.window(height);
        let _ = self
            .last_window
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                (last == NEVER_STARTED || last < window).then_some(window)
            });
    }
}

/// What the driver did for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarizationReport {
    /// Stage was `Idle` and no run was due.
    NotDue,
    /// Stage went back to `Idle` during this block.
    Completed { started: bool, steps: usize },
    /// A transaction failed, was not confirmed, or the step cap was hit.
    Deferred { started: bool, steps: usize },
    /// Shutdown was requested between two steps.
    Interrupted { steps: usize },
}

impl SummarizationReport {
    /// Whether the rebalance phase may run after this report.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SummarizationReport::NotDue | SummarizationReport::Completed { .. }
        )
    }
}

/// Drives the on-chain summarization workflow forward, one block at a time.
pub struct SummarizationDriver<S> {
    schedule: S,
    max_steps_per_block: usize,
}

impl<S: SummarizationSchedule> SummarizationDriver<S> {
    pub fn new(schedule: S, max_steps_per_block: usize) -> Self {
        Self {
            schedule,
            max_steps_per_block,
        }
    }

    /// Runs the state machine for the block in `ctx`.
    ///
    /// Only connection failures are returned as errors.
    pub async fn drive<R: ContractHandle>(
        &self,
        ctx: &BlockContext<'_, R>,
    ) -> Result<SummarizationReport, ClientError> {
        let mut stage = read_stage(ctx).await?;
        let mut started = false;

        if stage.is_idle() {
            if !self.schedule.should_start(ctx.height) {
                debug!("no summarization due");
                return Ok(SummarizationReport::NotDue);
            }
            if ctx.shutdown.is_requested() {
                info!("shutdown requested, not starting summarization");
                return Ok(SummarizationReport::Interrupted { steps: 0 });
            }
            let outcome = ctx
                .executor
                .execute(TxAction::StartSummarize, ctx.contract.start_summarize())
                .await?;
            if !outcome.is_success() {
                return Ok(SummarizationReport::Deferred { started, steps: 0 });
            }
            self.schedule.started(ctx.height);
            started = true;
            stage = read_stage(ctx).await?;
        }

        let mut steps = 0;
        while !stage.is_idle() {
            if ctx.shutdown.is_requested() {
                info!(steps, %stage, "summarization interrupted by shutdown");
                return Ok(SummarizationReport::Interrupted { steps });
            }
            if steps >= self.max_steps_per_block {
                info!(steps, %stage, "step cap reached, continuing next block");
                return Ok(SummarizationReport::Deferred { started, steps });
            }
            let outcome = ctx
                .executor
                .execute(TxAction::SummarizeStep, ctx.contract.summarize_step())
                .await?;
            steps += 1;
            if !outcome.is_success() {
                return Ok(SummarizationReport::Deferred { started, steps });
            }
            stage = read_stage(ctx).await?;
        }

        if started || steps > 0 {
            info!(started, steps, "summarization completed");
        }
        Ok(SummarizationReport::Completed { started, steps })
    }
}

async fn read_stage<R: ContractHandle>(
    ctx: &BlockContext<'_, R>,
) -> Result<SummarizationStage, ClientError> {
    let stage = ctx.contract.get_stage().await?;
    info!(%stage, "summarization stage");
    Ok(stage)
}
