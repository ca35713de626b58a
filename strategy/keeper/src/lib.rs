//! Rebalance keeper strategy crate.
//!
//! Watches new blocks, drives the rebalancer's trade summarization workflow
//! and recentres its liquidity position when the price leaves the range.

mod block_loop;
pub mod config;
mod decider;
mod executor;
mod keeper;
mod shutdown;
mod summarize;
#[cfg(test)]
mod testing;

pub use block_loop::{BlockHandler, BlockLoop, LoopState};
pub use config::KeeperConfig;
pub use decider::{
    RangePolicy, RebalanceDecider, RebalanceDecision, RebalanceReport, TickRangePolicy, MAX_TICK,
    MAX_TICK_SPACING, MIN_TICK,
};
pub use executor::{TxAction, TxExecutor, TxOutcome, UnconfirmedReason};
pub use keeper::{BlockContext, BlockReport, Keeper, KeeperPhase};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use summarize::{
    EveryNBlocks, SummarizationDriver, SummarizationReport, SummarizationSchedule,
};
