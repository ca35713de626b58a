//! Per-block handler tying summarization and rebalancing together.

use anyhow::Context;
use async_trait::async_trait;
use clients_rebalancer::{BlockHeight, ContractHandle};
use tracing::{debug, info, warn};

use crate::block_loop::BlockHandler;
use crate::config::KeeperConfig;
use crate::decider::{RangePolicy, RebalanceDecider, RebalanceReport};
use crate::executor::TxExecutor;
use crate::shutdown::Shutdown;
use crate::summarize::{SummarizationDriver, SummarizationReport, SummarizationSchedule};

/// Everything a phase needs while handling one block.
pub struct BlockContext<'a, R> {
    pub height: BlockHeight,
    pub contract: &'a R,
    pub executor: &'a TxExecutor,
    pub shutdown: &'a Shutdown,
}

/// Phase the keeper is in while handling a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeeperPhase {
    Summarization,
    Rebalance,
}

/// What happened while handling one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    pub height: BlockHeight,
    pub summarization: SummarizationReport,
    /// `None` when the rebalance phase was skipped
    pub rebalance: Option<RebalanceReport>,
}

/// Rebalance keeper
///
/// Drives a rebalancer contract on every new block:
/// - pushes the summarization workflow forward
/// - once it settled, rebalances the position if it left its range
pub struct Keeper<R, S, P> {
    /// Rebalancer contract handle
    contract: R,
    executor: TxExecutor,
    driver: SummarizationDriver<S>,
    decider: RebalanceDecider<P>,
    shutdown: Shutdown,
}

impl<R, S, P> Keeper<R, S, P>
where
    R: ContractHandle,
    S: SummarizationSchedule,
    P: RangePolicy,
{
    /// Creates a new `Keeper`
    ///
    /// # Arguments
    /// * `config` - timeouts and per-block limits
    /// * `contract` - rebalancer contract handle
    /// * `schedule` - decides when a summarization run starts
    /// * `policy` - decides when and where the position moves
    /// * `shutdown` - checked between summarization steps
    pub fn new(
        config: &KeeperConfig,
        contract: R,
        schedule: S,
        policy: P,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            contract,
            executor: TxExecutor::new(config.tx_timeout()),
            driver: SummarizationDriver::new(schedule, config.max_steps_per_block),
            decider: RebalanceDecider::new(policy),
            shutdown,
        }
    }

    pub fn contract(&self) -> &R {
        &self.contract
    }

    /// Runs both phases for `height`, strictly one after the other.
    pub async fn process_block(&self, height: BlockHeight) -> anyhow::Result<BlockReport> {
        let ctx = BlockContext {
            height,
            contract: &self.contract,
            executor: &self.executor,
            shutdown: &self.shutdown,
        };

        debug!(phase = ?KeeperPhase::Summarization, "entering phase");
        let summarization = self
            .driver
            .drive(&ctx)
            .await
            .context("summarization phase failed")?;

        if !summarization.is_settled() {
            warn!(?summarization, "summarization not settled, skipping rebalance");
            return Ok(BlockReport {
                height,
                summarization,
                rebalance: None,
            });
        }
        if self.shutdown.is_requested() {
            return Ok(BlockReport {
                height,
                summarization,
                rebalance: None,
            });
        }

        debug!(phase = ?KeeperPhase::Rebalance, "entering phase");
        let rebalance = self
            .decider
            .run(&ctx)
            .await
            .context("rebalance phase failed")?;

        Ok(BlockReport {
            height,
            summarization,
            rebalance: Some(rebalance),
        })
    }
}

#[async_trait]
impl<R, S, P> BlockHandler for Keeper<R, S, P>
where
    R: ContractHandle,
    S: SummarizationSchedule,
    P: RangePolicy,
{
    async fn handle_block(&mut self, height: BlockHeight) -> anyhow::Result<()> {
        let report = self.process_block(height).await?;
        info!(
            summarization = ?report.summarization,
            rebalance = ?report.rebalance,
            "block processed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decider::TickRangePolicy;
    use crate::executor::TxOutcome;
    use crate::summarize::EveryNBlocks;
    use crate::testing::{assert_read_before_write, position, Call, MockContract, Write};
    use clients_rebalancer::SummarizationStage::{Idle, InProgress, Started};

    fn keeper(contract: MockContract) -> Keeper<MockContract, EveryNBlocks, TickRangePolicy> {
        let (_trigger, shutdown) = Shutdown::new();
        Keeper::new(
            &KeeperConfig::default(),
            contract,
            EveryNBlocks::new(1),
            TickRangePolicy::new(60),
            shutdown,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn summarizes_then_evaluates_rebalance() {
        let contract = MockContract::new()
            .with_stages(&[Idle, Started, InProgress(1), InProgress(2), Idle])
            .with_positions(&[position(0, -600, 600)]);
        let keeper = keeper(contract);

        let report = keeper.process_block(50).await.unwrap();

        assert_eq!(
            report.summarization,
            SummarizationReport::Completed {
                started: true,
                steps: 3
            }
        );
        assert_eq!(report.rebalance, Some(RebalanceReport::InRange));
        let calls = keeper.contract().calls();
        assert_eq!(
            calls,
            vec![
                Call::GetStage(Idle),
                Call::StartSummarize,
                Call::GetStage(Started),
                Call::SummarizeStep,
                Call::GetStage(InProgress(1)),
                Call::SummarizeStep,
                Call::GetStage(InProgress(2)),
                Call::SummarizeStep,
                Call::GetStage(Idle),
                Call::GetPosition,
            ]
        );
        assert_read_before_write(&calls);
    }

    #[tokio::test(start_paused = true)]
    async fn unsettled_summarization_skips_rebalance() {
        let contract = MockContract::new()
            .with_stages(&[Idle])
            .with_writes(&[Write::Hang])
            .with_positions(&[position(5_000, -600, 600)]);
        let keeper = keeper(contract);

        let report = keeper.process_block(51).await.unwrap();

        assert_eq!(report.rebalance, None);
        assert_eq!(
            keeper.contract().calls(),
            vec![Call::GetStage(Idle), Call::StartSummarize]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_rebalances_after_summarization() {
        let contract = MockContract::new()
            .with_stages(&[InProgress(9), Idle])
            .with_positions(&[position(5_000, -600, 600)]);
        let keeper = keeper(contract);

        let report = keeper.process_block(52).await.unwrap();

        match report.rebalance {
            Some(RebalanceReport::Submitted { outcome, .. }) => {
                assert!(matches!(outcome, TxOutcome::Success(_)))
            }
            other => panic!("unexpected rebalance report {:?}", other),
        }
        let calls = keeper.contract().calls();
        assert!(matches!(calls.last(), Some(Call::Rebalance(_))));
        assert_read_before_write(&calls);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_skips_rebalance_after_settled_summarization() {
        let contract = MockContract::new()
            .with_stages(&[Idle])
            .with_positions(&[position(5_000, -600, 600)]);
        let (trigger, shutdown) = Shutdown::new();
        let keeper = Keeper::new(
            &KeeperConfig::default(),
            contract,
            |_height: BlockHeight| false,
            TickRangePolicy::new(60),
            shutdown,
        );
        trigger.trigger();

        let report = keeper.process_block(54).await.unwrap();

        assert_eq!(report.summarization, SummarizationReport::NotDue);
        assert_eq!(report.rebalance, None);
        assert_eq!(keeper.contract().calls(), vec![Call::GetStage(Idle)]);
    }

    #[tokio::test(start_paused = true)]
    async fn connection_loss_fails_the_block() {
        let contract = MockContract::new()
            .with_stages(&[Started])
            .with_writes(&[Write::Disconnect]);
        let keeper = keeper(contract);

        assert!(keeper.process_block(53).await.is_err());
    }
}
