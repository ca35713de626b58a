//! Rebalancer contract client.

use std::future::Future;

use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::aliases::I24;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder};
use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::config::RebalancerConfig;
use crate::contracts::IRebalancer;
use crate::error::ClientError;
use crate::types::{PositionState, RebalanceParams, SummarizationStage, TxHandle, TxReceipt};

/// The remote rebalancing contract.
///
/// Reads fail with [`ClientError`] when the node fails. Writes return as soon as
/// the node accepted the transaction; inclusion is awaited through the returned
/// [`TxHandle`].
#[async_trait]
pub trait ContractHandle: Send + Sync {
    async fn get_stage(&self) -> Result<SummarizationStage, ClientError>;
    async fn get_position_state(&self) -> Result<PositionState, ClientError>;
    async fn start_summarize(&self) -> Result<TxHandle, ClientError>;
    async fn summarize_step(&self) -> Result<TxHandle, ClientError>;
    async fn rebalance(&self, params: &RebalanceParams) -> Result<TxHandle, ClientError>;
}

/// ContractHandle bound to a deployed Rebalancer through an alloy provider
pub struct RpcRebalancer {
    /// Rebalancer contract instance for making RPC calls
    instance: IRebalancer::IRebalancerInstance<DynProvider>,
    /// Account transactions are sent from
    sender: Address,
}

impl RpcRebalancer {
    /// Creates a new `RpcRebalancer`
    ///
    /// # Arguments
    /// * `config` - contract address
    /// * `provider` - provider shared with the chain client
    /// * `sender` - account used as `from` for every transaction
    pub fn new(config: RebalancerConfig, provider: DynProvider, sender: Address) -> Self {
        Self {
            instance: IRebalancer::new(config.address, provider),
            sender,
        }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    /// Runs an idempotent read, retrying it once on failure.
    async fn read_once_more<T, F, Fut>(&self, what: &str, read: F) -> Result<T, ClientError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, alloy::contract::Error>>,
    {
        match read().await {
            Ok(value) => Ok(value),
            Err(first) => {
                warn!(read = what, error = %first, "contract read failed, retrying once");
                read().await.map_err(ClientError::from_read)
            }
        }
    }
}

#[async_trait]
impl ContractHandle for RpcRebalancer {
    async fn get_stage(&self) -> Result<SummarizationStage, ClientError> {
        let params = self
            .read_once_more("summParams", || async {
                self.instance.summParams().call().await
            })
            .await?;
        SummarizationStage::from_raw(params.stage, params.stepsDone)
    }

    async fn get_position_state(&self) -> Result<PositionState, ClientError> {
        let state = self
            .read_once_more("getPositionState", || async {
                self.instance.getPositionState().call().await
            })
            .await?;
        Ok(PositionState {
            current_tick: tick_to_i32(state.currentTick)?,
            tick_lower: tick_to_i32(state.tickLower)?,
            tick_upper: tick_to_i32(state.tickUpper)?,
            liquidity: state.liquidity,
            sqrt_price_x96: U256::from(state.sqrtPriceX96),
        })
    }

    async fn start_summarize(&self) -> Result<TxHandle, ClientError> {
        let pending = self
            .instance
            .startSummarizeTrades()
            .from(self.sender)
            .send()
            .await
            .map_err(ClientError::from_send)?;
        Ok(into_handle(pending))
    }

    async fn summarize_step(&self) -> Result<TxHandle, ClientError> {
        let pending = self
            .instance
            .summarizeUsersStates()
            .from(self.sender)
            .send()
            .await
            .map_err(ClientError::from_send)?;
        Ok(into_handle(pending))
    }

    async fn rebalance(&self, params: &RebalanceParams) -> Result<TxHandle, ClientError> {
        let lower = tick_from_i32(params.tick_lower)?;
        let upper = tick_from_i32(params.tick_upper)?;
        let pending = self
            .instance
            .rebalance(lower, upper)
            .from(self.sender)
            .send()
            .await
            .map_err(ClientError::from_send)?;
        Ok(into_handle(pending))
    }
}

fn into_handle(pending: PendingTransactionBuilder<Ethereum>) -> TxHandle {
    let tx_hash = *pending.tx_hash();
    debug!(%tx_hash, "transaction accepted by node");
    let inclusion = async move {
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ClientError::Rpc(e.to_string()))?;
        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash(),
            block_number: receipt.block_number(),
            success: receipt.status(),
            gas_used: receipt.gas_used(),
        })
    }
    .boxed();
    TxHandle::new(tx_hash, inclusion)
}

fn tick_to_i32(tick: I24) -> Result<i32, ClientError> {
    i32::try_from(tick).map_err(|e| ClientError::Decode(format!("tick {}: {}", tick, e)))
}

fn tick_from_i32(tick: i32) -> Result<I24, ClientError> {
    I24::try_from(tick)
        .map_err(|e| ClientError::Submission(format!("tick {} out of int24 range: {}", tick, e)))
}
