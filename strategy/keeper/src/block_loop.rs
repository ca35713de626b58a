//! Top-level block-driven loop.

use async_trait::async_trait;
use clients_rebalancer::{BlockHeight, ChainClient};
use tracing::{error, info, info_span, Instrument};

use crate::shutdown::Shutdown;

/// Work done once per new block height.
#[async_trait]
pub trait BlockHandler: Send {
    async fn handle_block(&mut self, height: BlockHeight) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    WaitingForBlock,
    Processing(BlockHeight),
    Stopped,
}

/// Polls the chain and hands every new height to the handler, one at a time.
///
/// Heights seen before startup are not replayed. A height is handled at most
/// once and always after every lower height that was handled.
pub struct BlockLoop<C, H> {
    chain: C,
    handler: H,
    shutdown: Shutdown,
    state: LoopState,
    last_seen: Option<BlockHeight>,
}

impl<C: ChainClient, H: BlockHandler> BlockLoop<C, H> {
    pub fn new(chain: C, handler: H, shutdown: Shutdown) -> Self {
        Self {
            chain,
            handler,
            shutdown,
            state: LoopState::WaitingForBlock,
            last_seen: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Runs until shutdown is requested.
    ///
    /// A block being handled when shutdown arrives is finished first. Handler
    /// errors are logged and the loop moves on to the next height.
    pub async fn run(&mut self) {
        let mut last_seen = match self.last_seen {
            Some(height) => height,
            None => {
                let height = tokio::select! {
                    height = self.chain.current_height_with_retry() => height,
                    _ = self.shutdown.requested() => return self.stop(),
                };
                info!(height, "starting from current block");
                height
            }
        };
        self.last_seen = Some(last_seen);

        loop {
            self.state = LoopState::WaitingForBlock;
            if self.shutdown.is_requested() {
                break;
            }
            let height = tokio::select! {
                height = self.chain.await_next_height(last_seen) => height,
                _ = self.shutdown.requested() => break,
            };
            last_seen = height;
            self.last_seen = Some(height);

            self.state = LoopState::Processing(height);
            info!(height, "new block");
            let span = info_span!("block", height);
            if let Err(e) = self.handler.handle_block(height).instrument(span).await {
                error!(height, error = ?e, "block processing failed");
            }
        }
        self.stop();
    }

    fn stop(&mut self) {
        self.state = LoopState::Stopped;
        info!(last_seen = ?self.last_seen, "block loop stopped");
    }
}
