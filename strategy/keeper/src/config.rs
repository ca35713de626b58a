//! Configuration types for the keeper.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for Keeper (parameters only; clients are passed to `Keeper::new`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Bounded wait for a transaction to be accepted and mined, in seconds
    pub tx_timeout_secs: u64,
    /// Most `summarizeUsersStates` transactions sent while handling one block
    pub max_steps_per_block: usize,
    /// Start a summarization run on every n-th block (1 = every block)
    pub summarize_every: u64,
    /// Tick spacing of the pool; new ranges are aligned to it
    pub tick_spacing: i32,
}

impl KeeperConfig {
    pub fn tx_timeout(&self) -> Duration {
        Duration::from_secs(self.tx_timeout_secs)
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            tx_timeout_secs: 120,
            max_steps_per_block: 64,
            summarize_every: 1,
            tick_spacing: 60,
        }
    }
}
