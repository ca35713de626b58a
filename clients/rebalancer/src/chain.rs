//! Block height source backed by an alloy provider.

use std::time::Duration;

use alloy::network::Ethereum;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, IpcConnect, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use tracing::{debug, warn};

use crate::config::{ChainClientConfig, TransportKind};
use crate::error::ClientError;
use crate::types::BlockHeight;

/// Default delay between two height polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound of the delay between polls while the node keeps failing.
pub const MAX_POLL_BACKOFF: Duration = Duration::from_secs(30);

/// Source of block heights.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Latest block height known to the node.
    async fn current_height(&self) -> Result<BlockHeight, ClientError>;

    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Polls until a height greater than `last_seen` shows up.
    ///
    /// Never fails: poll errors are logged and retried with exponential backoff,
    /// capped at [`MAX_POLL_BACKOFF`].
    async fn await_next_height(&self, last_seen: BlockHeight) -> BlockHeight {
        let interval = self.poll_interval();
        let mut backoff = poll_backoff(interval);
        loop {
            match self.current_height().await {
                Ok(height) if height > last_seen => return height,
                Ok(height) => {
                    backoff.reset();
                    debug!(height, last_seen, "no new block yet");
                    tokio::time::sleep(interval).await;
                }
                Err(e) => {
                    let delay = backoff.next_backoff().unwrap_or(MAX_POLL_BACKOFF);
                    warn!(
                        error = %e,
                        connection = e.is_connection(),
                        retry_in_ms = delay.as_millis() as u64,
                        "block height poll failed"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Like [`ChainClient::current_height`], but retries until the node answers.
    async fn current_height_with_retry(&self) -> BlockHeight {
        let mut backoff = poll_backoff(self.poll_interval());
        loop {
            match self.current_height().await {
                Ok(height) => return height,
                Err(e) => {
                    let delay = backoff.next_backoff().unwrap_or(MAX_POLL_BACKOFF);
                    warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "block height read failed");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn poll_backoff(initial: Duration) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(initial)
        .with_max_interval(MAX_POLL_BACKOFF)
        .with_max_elapsed_time(None)
        .build()
}

/// ChainClient talking JSON-RPC to a node over http or ipc.
#[derive(Clone)]
pub struct RpcChainClient {
    provider: DynProvider,
    sender: Address,
    poll_interval: Duration,
}

impl RpcChainClient {
    /// Connects to the configured endpoint.
    ///
    /// With a `signer` transactions are signed locally; without one they are sent
    /// from the node's first managed account.
    pub async fn connect(
        config: &ChainClientConfig,
        signer: Option<PrivateKeySigner>,
    ) -> Result<Self, ClientError> {
        let local_sender = signer.as_ref().map(|s| s.address());
        let provider = match (config.transport, signer) {
            (TransportKind::Http, signer) => {
                let url = config.endpoint.parse::<url::Url>().map_err(|e| {
                    ClientError::Connection(format!("invalid endpoint {}: {}", config.endpoint, e))
                })?;
                match signer {
                    Some(signer) => ProviderBuilder::new()
                        .wallet(signer)
                        .connect_http(url)
                        .erased(),
                    None => ProviderBuilder::new().connect_http(url).erased(),
                }
            }
            (TransportKind::Ipc, signer) => {
                let ipc = IpcConnect::new(config.endpoint.clone());
                match signer {
                    Some(signer) => ProviderBuilder::new()
                        .wallet(signer)
                        .connect_ipc(ipc)
                        .await
                        .map_err(ClientError::from_transport)?
                        .erased(),
                    None => ProviderBuilder::new()
                        .connect_ipc(ipc)
                        .await
                        .map_err(ClientError::from_transport)?
                        .erased(),
                }
            }
        };

        let sender = match local_sender {
            Some(address) => address,
            None => provider
                .get_accounts()
                .await
                .map_err(ClientError::from_transport)?
                .first()
                .copied()
                .ok_or_else(|| {
                    ClientError::Rpc("node manages no accounts and no signer is configured".into())
                })?,
        };

        Ok(Self {
            provider,
            sender,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    pub fn provider(&self) -> &DynProvider<Ethereum> {
        &self.provider
    }

    /// Account transactions are sent from.
    pub fn sender(&self) -> Address {
        self.sender
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn current_height(&self) -> Result<BlockHeight, ClientError> {
        self.provider
            .get_block_number()
            .await
            .map_err(ClientError::from_transport)
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
