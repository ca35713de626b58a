//! Rebalance decision and execution.

use clients_rebalancer::{ClientError, ContractHandle, PositionState, RebalanceParams};
use tracing::info;

use crate::executor::{TxAction, TxOutcome};
use crate::keeper::BlockContext;

/// Whether a position needs to move, and where to.
///
/// Both methods must be pure: they are called on fresh state every block.
pub trait RangePolicy: Send + Sync {
    fn in_range(&self, state: &PositionState) -> bool;
    fn rebalance_params(&self, state: &PositionState) -> RebalanceParams;
}

/// Lowest tick a position can use.
pub const MIN_TICK: i32 = -887_272;
/// Highest tick a position can use.
pub const MAX_TICK: i32 = 887_272;
/// Largest tick spacing a pool can be created with.
pub const MAX_TICK_SPACING: i32 = 16_384;

/// Keeps the current tick inside the position, recentring a window of the same
/// width (aligned to the pool's tick spacing) when it drifts out.
#[derive(Debug, Clone, Copy)]
pub struct TickRangePolicy {
    tick_spacing: i32,
}

impl TickRangePolicy {
    /// `tick_spacing` is clamped to `1..=MAX_TICK_SPACING`.
    pub fn new(tick_spacing: i32) -> Self {
        Self {
            tick_spacing: tick_spacing.clamp(1, MAX_TICK_SPACING),
        }
    }
}

impl RangePolicy for TickRangePolicy {
    fn in_range(&self, state: &PositionState) -> bool {
        state.tick_lower <= state.current_tick && state.current_tick < state.tick_upper
    }

    fn rebalance_params(&self, state: &PositionState) -> RebalanceParams {
        // i64 so that no combination of ticks and spacing can overflow
        let spacing = i64::from(self.tick_spacing);
        let current = i64::from(state.current_tick);
        let min = round_up(i64::from(MIN_TICK), spacing);
        let max = floor_to(i64::from(MAX_TICK), spacing);

        let width = (i64::from(state.tick_upper) - i64::from(state.tick_lower)).max(spacing);
        let width = round_up(width, spacing).min(max - min);
        let tick_lower = floor_to(current - width / 2, spacing);
        let tick_upper = (tick_lower + width).max(floor_to(current, spacing) + spacing);

        // shift back inside the usable range, keeping the width
        let (mut tick_lower, mut tick_upper) = (tick_lower, tick_upper);
        if tick_lower < min {
            tick_upper += min - tick_lower;
            tick_lower = min;
        }
        if tick_upper > max {
            tick_lower = (tick_lower - (tick_upper - max)).max(min);
            tick_upper = max;
        }
        RebalanceParams {
            tick_lower: tick_lower as i32,
            tick_upper: tick_upper as i32,
        }
    }
}

fn floor_to(tick: i64, spacing: i64) -> i64 {
    tick.div_euclid(spacing) * spacing
}

fn round_up(value: i64, spacing: i64) -> i64 {
    (value + spacing - 1).div_euclid(spacing) * spacing
}

/// Outcome of the decision for one block. Never cached across blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceDecision {
    NoActionNeeded,
    Rebalance(RebalanceParams),
}

/// What the rebalance phase did for one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalanceReport {
    InRange,
    Submitted {
        params: RebalanceParams,
        outcome: TxOutcome,
    },
}

pub struct RebalanceDecider<P> {
    policy: P,
}

impl<P: RangePolicy> RebalanceDecider<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn decide(&self, state: &PositionState) -> RebalanceDecision {
        if self.policy.in_range(state) {
            RebalanceDecision::NoActionNeeded
        } else {
            RebalanceDecision::Rebalance(self.policy.rebalance_params(state))
        }
    }

    /// Reads the position once and submits a rebalance if it is out of range.
    ///
    /// A reverted or unconfirmed rebalance is reported, not retried: the next
    /// block decides again from fresh state.
    pub async fn run<R: ContractHandle>(
        &self,
        ctx: &BlockContext<'_, R>,
    ) -> Result<RebalanceReport, ClientError> {
        let state = ctx.contract.get_position_state().await?;
        info!(
            current_tick = state.current_tick,
            tick_lower = state.tick_lower,
            tick_upper = state.tick_upper,
            liquidity = state.liquidity,
            tick_price = utils::tick_to_price(state.current_tick),
            pool_price = utils::sqrt_price_x96_to_price(state.sqrt_price_x96, 0, 0),
            "position state"
        );

        let params = match self.decide(&state) {
            RebalanceDecision::NoActionNeeded => return Ok(RebalanceReport::InRange),
            RebalanceDecision::Rebalance(params) => params,
        };
        info!(
            new_lower = params.tick_lower,
            new_upper = params.tick_upper,
            "position out of range, rebalancing"
        );
        let outcome = ctx
            .executor
            .execute(TxAction::Rebalance, ctx.contract.rebalance(&params))
            .await?;
        Ok(RebalanceReport::Submitted { params, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TxExecutor;
    use crate::shutdown::Shutdown;
    use crate::testing::{position, Call, MockContract, Write};
    use std::time::Duration;

    #[test]
    fn upper_bound_is_exclusive() {
        let policy = TickRangePolicy::new(60);
        assert!(policy.in_range(&position(-600, -600, 600)));
        assert!(policy.in_range(&position(599, -600, 600)));
        assert!(!policy.in_range(&position(600, -600, 600)));
        assert!(!policy.in_range(&position(-601, -600, 600)));
    }

    #[test]
    fn recentres_keeping_width_and_spacing() {
        let policy = TickRangePolicy::new(60);
        let params = policy.rebalance_params(&position(1_000, -600, 600));
        assert_eq!(params.tick_lower % 60, 0);
        assert_eq!(params.tick_upper - params.tick_lower, 1_200);
        assert!(params.tick_lower <= 1_000 && 1_000 < params.tick_upper);
    }

    #[test]
    fn negative_ticks_are_floored() {
        let policy = TickRangePolicy::new(10);
        let params = policy.rebalance_params(&position(-1_005, 0, 100));
        assert_eq!(params.tick_lower, -1_060);
        assert_eq!(params.tick_upper, -960);
    }

    #[test]
    fn degenerate_width_still_contains_current_tick() {
        let policy = TickRangePolicy::new(60);
        let params = policy.rebalance_params(&position(59, 0, 0));
        assert!(params.tick_lower <= 59 && 59 < params.tick_upper);
        assert_eq!(params.tick_lower % 60, 0);
        assert_eq!(params.tick_upper % 60, 0);
    }

    #[test]
    fn huge_spacing_is_clamped_instead_of_overflowing() {
        let policy = TickRangePolicy::new(i32::MAX);
        let params = policy.rebalance_params(&position(1_000, -600, 600));
        assert_eq!(params.tick_lower % MAX_TICK_SPACING, 0);
        assert_eq!(params.tick_upper % MAX_TICK_SPACING, 0);
        assert!(params.tick_lower <= 1_000 && 1_000 < params.tick_upper);

        let policy = TickRangePolicy::new(0);
        let params = policy.rebalance_params(&position(7, 0, 0));
        assert_eq!((params.tick_lower, params.tick_upper), (7, 8));
    }

    #[test]
    fn extreme_ticks_stay_within_bounds() {
        let policy = TickRangePolicy::new(60);
        let wide = policy.rebalance_params(&position(MAX_TICK - 1, i32::MIN, i32::MAX));
        assert!(wide.tick_lower >= MIN_TICK && wide.tick_upper <= MAX_TICK);
        assert!(wide.tick_lower < wide.tick_upper);

        let low = policy.rebalance_params(&position(MIN_TICK, -600, 600));
        assert!(low.tick_lower >= MIN_TICK);
        assert_eq!(low.tick_upper - low.tick_lower, 1_200);
    }

    async fn run_block(
        decider: &RebalanceDecider<TickRangePolicy>,
        contract: &MockContract,
    ) -> RebalanceReport {
        let executor = TxExecutor::new(Duration::from_secs(30));
        let (_trigger, shutdown) = Shutdown::new();
        let ctx = BlockContext {
            height: 1,
            contract,
            executor: &executor,
            shutdown: &shutdown,
        };
        decider.run(&ctx).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn in_range_submits_nothing() {
        let contract = MockContract::new().with_positions(&[position(10, -600, 600)]);
        let decider = RebalanceDecider::new(TickRangePolicy::new(60));

        let report = run_block(&decider, &contract).await;

        assert_eq!(report, RebalanceReport::InRange);
        assert_eq!(contract.calls(), vec![Call::GetPosition]);
    }

    #[tokio::test(start_paused = true)]
    async fn reverted_rebalance_is_recomputed_next_block() {
        let contract = MockContract::new()
            .with_positions(&[position(1_000, -600, 600), position(2_000, -600, 600)])
            .with_writes(&[Write::Revert]);
        let decider = RebalanceDecider::new(TickRangePolicy::new(60));

        let first = run_block(&decider, &contract).await;
        let first_params = match first {
            RebalanceReport::Submitted { params, outcome } => {
                assert!(matches!(outcome, TxOutcome::Reverted(_)));
                params
            }
            other => panic!("unexpected report {:?}", other),
        };
        let rebalances = |c: &Call| matches!(c, Call::Rebalance(_));
        assert_eq!(contract.count(rebalances), 1);

        let second = run_block(&decider, &contract).await;
        let second_params = match second {
            RebalanceReport::Submitted { params, outcome } => {
                assert!(outcome.is_success());
                params
            }
            other => panic!("unexpected report {:?}", other),
        };
        assert_ne!(first_params, second_params);
        assert!(second_params.tick_lower <= 2_000 && 2_000 < second_params.tick_upper);
        assert_eq!(
            contract.calls(),
            vec![
                Call::GetPosition,
                Call::Rebalance(first_params),
                Call::GetPosition,
                Call::Rebalance(second_params),
            ]
        );
    }
}
