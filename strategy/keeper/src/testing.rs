//! Scripted in-memory clients for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use alloy::primitives::{TxHash, U256};
use async_trait::async_trait;
use clients_rebalancer::{
    BlockHeight, ChainClient, ClientError, ContractHandle, PositionState, RebalanceParams,
    SummarizationStage, TxHandle, TxReceipt,
};
use futures::FutureExt;

fn hash(n: u64) -> TxHash {
    TxHash::with_last_byte(n as u8)
}

fn receipt(n: u64, success: bool) -> TxReceipt {
    TxReceipt {
        tx_hash: hash(n),
        block_number: Some(n),
        success,
        gas_used: 21_000,
    }
}

pub(crate) fn handle(n: u64) -> TxHandle {
    TxHandle::new(hash(n), futures::future::ready(Ok(receipt(n, true))).boxed())
}

pub(crate) fn reverted_handle(n: u64) -> TxHandle {
    TxHandle::new(hash(n), futures::future::ready(Ok(receipt(n, false))).boxed())
}

pub(crate) fn hanging_handle(n: u64) -> TxHandle {
    TxHandle::new(hash(n), futures::future::pending().boxed())
}

pub(crate) fn position(current_tick: i32, tick_lower: i32, tick_upper: i32) -> PositionState {
    PositionState {
        current_tick,
        tick_lower,
        tick_upper,
        liquidity: 1_000_000,
        sqrt_price_x96: U256::from(1u8) << 96usize,
    }
}

/// How the next write call behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Write {
    Confirm,
    Revert,
    Reject,
    Hang,
    Disconnect,
}

/// Every call made against [`MockContract`], with what reads returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    GetStage(SummarizationStage),
    GetPosition,
    StartSummarize,
    SummarizeStep,
    Rebalance(RebalanceParams),
}

/// Contract whose stage reads and write outcomes follow a script.
///
/// Once a script runs out the last stage / position keeps being returned and
/// writes confirm.
pub(crate) struct MockContract {
    stages: Mutex<VecDeque<SummarizationStage>>,
    last_stage: Mutex<SummarizationStage>,
    positions: Mutex<VecDeque<PositionState>>,
    last_position: Mutex<PositionState>,
    writes: Mutex<VecDeque<Write>>,
    calls: Mutex<Vec<Call>>,
    tx_counter: Mutex<u64>,
}

impl MockContract {
    pub(crate) fn new() -> Self {
        Self {
            stages: Mutex::new(VecDeque::new()),
            last_stage: Mutex::new(SummarizationStage::Idle),
            positions: Mutex::new(VecDeque::new()),
            last_position: Mutex::new(position(0, -600, 600)),
            writes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            tx_counter: Mutex::new(0),
        }
    }

    pub(crate) fn with_stages(self, stages: &[SummarizationStage]) -> Self {
        self.stages.lock().unwrap().extend(stages.iter().copied());
        self
    }

    pub(crate) fn with_positions(self, positions: &[PositionState]) -> Self {
        self.positions.lock().unwrap().extend(positions.iter().cloned());
        self
    }

    pub(crate) fn with_writes(self, writes: &[Write]) -> Self {
        self.writes.lock().unwrap().extend(writes.iter().copied());
        self
    }

    pub(crate) fn push_stages(&self, stages: &[SummarizationStage]) {
        self.stages.lock().unwrap().extend(stages.iter().copied());
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub(crate) fn count(&self, wanted: fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| wanted(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn write(&self, call: Call) -> Result<TxHandle, ClientError> {
        self.record(call);
        let n = {
            let mut counter = self.tx_counter.lock().unwrap();
            *counter += 1;
            *counter
        };
        let next = self.writes.lock().unwrap().pop_front().unwrap_or(Write::Confirm);
        match next {
            Write::Confirm => Ok(handle(n)),
            Write::Revert => Ok(reverted_handle(n)),
            Write::Hang => Ok(hanging_handle(n)),
            Write::Reject => Err(ClientError::Submission("nonce too low".into())),
            Write::Disconnect => Err(ClientError::Connection("connection reset".into())),
        }
    }
}

#[async_trait]
impl ContractHandle for MockContract {
    async fn get_stage(&self) -> Result<SummarizationStage, ClientError> {
        let stage = {
            let mut last = self.last_stage.lock().unwrap();
            if let Some(next) = self.stages.lock().unwrap().pop_front() {
                *last = next;
            }
            *last
        };
        self.record(Call::GetStage(stage));
        Ok(stage)
    }

    async fn get_position_state(&self) -> Result<PositionState, ClientError> {
        let state = {
            let mut last = self.last_position.lock().unwrap();
            if let Some(next) = self.positions.lock().unwrap().pop_front() {
                *last = next;
            }
            last.clone()
        };
        self.record(Call::GetPosition);
        Ok(state)
    }

    async fn start_summarize(&self) -> Result<TxHandle, ClientError> {
        self.write(Call::StartSummarize)
    }

    async fn summarize_step(&self) -> Result<TxHandle, ClientError> {
        self.write(Call::SummarizeStep)
    }

    async fn rebalance(&self, params: &RebalanceParams) -> Result<TxHandle, ClientError> {
        self.write(Call::Rebalance(*params))
    }
}

/// Asserts the read-before-write discipline over a call log: every
/// `StartSummarize` directly follows an `Idle` read and every `SummarizeStep`
/// directly follows a non-`Idle` read.
pub(crate) fn assert_read_before_write(calls: &[Call]) {
    for (i, call) in calls.iter().enumerate() {
        let previous = i.checked_sub(1).map(|p| &calls[p]);
        match call {
            Call::StartSummarize => assert!(
                matches!(previous, Some(Call::GetStage(stage)) if stage.is_idle()),
                "startSummarize at {} not preceded by an idle read: {:?}",
                i,
                calls
            ),
            Call::SummarizeStep => assert!(
                matches!(previous, Some(Call::GetStage(stage)) if !stage.is_idle()),
                "summarizeStep at {} not preceded by a busy read: {:?}",
                i,
                calls
            ),
            _ => {}
        }
    }
}

/// Chain whose height reads follow a script; the last answer repeats forever.
pub(crate) struct ScriptedChain {
    heights: Mutex<VecDeque<Result<BlockHeight, ClientError>>>,
    last: Mutex<BlockHeight>,
}

impl ScriptedChain {
    pub(crate) fn new(heights: Vec<Result<BlockHeight, ClientError>>) -> Self {
        Self {
            heights: Mutex::new(heights.into()),
            last: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn current_height(&self) -> Result<BlockHeight, ClientError> {
        let mut last = self.last.lock().unwrap();
        match self.heights.lock().unwrap().pop_front() {
            Some(Ok(height)) => {
                *last = height;
                Ok(height)
            }
            Some(Err(e)) => Err(e),
            None => Ok(*last),
        }
    }
}
