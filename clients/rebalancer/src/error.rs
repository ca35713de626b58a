//! Error types shared by the chain and contract clients.

use alloy::transports::{RpcError, TransportError};
use thiserror::Error;

/// Fatal configuration problems detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("node endpoint is not configured")]
    MissingEndpoint,
    #[error("transport kind is not configured, expected `ipc` or `http`")]
    MissingTransport,
    #[error("unrecognized transport kind `{0}`, expected `ipc` or `http`")]
    UnknownTransport(String),
    #[error("invalid http endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("rebalancer address is required outside development mode")]
    MissingAddress,
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("factory artifact is required in development mode")]
    MissingArtifact,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("tick spacing {0} is outside 1..={1}")]
    InvalidTickSpacing(i32, i32),
}

/// Errors raised by node reads and transaction submission.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure: the node could not be reached.
    #[error("connection error: {0}")]
    Connection(String),
    /// The node answered with an error.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// The node answered with something that does not fit the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// The node refused the transaction (nonce conflict, underpriced, ...).
    #[error("submission rejected: {0}")]
    Submission(String),
    /// The node reported revert data while accepting the call.
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("deployment failed: {0}")]
    Deploy(String),
}

impl ClientError {
    pub fn is_connection(&self) -> bool {
        matches!(self, ClientError::Connection(_))
    }

    /// Maps a failed read.
    pub(crate) fn from_read(err: alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(e) => Self::from_transport(e),
            other => ClientError::Decode(other.to_string()),
        }
    }

    /// Maps a failed submission, keeping rejections with revert data apart from
    /// plain rejections.
    pub(crate) fn from_send(err: alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(e) => {
                if let Some(data) = e.as_error_resp().and_then(|payload| payload.as_revert_data())
                {
                    return ClientError::Reverted(format!("{} (data {})", e, data));
                }
                match e {
                    RpcError::Transport(kind) => ClientError::Connection(kind.to_string()),
                    other => ClientError::Submission(other.to_string()),
                }
            }
            other => ClientError::Submission(other.to_string()),
        }
    }

    pub(crate) fn from_transport(err: TransportError) -> Self {
        match err {
            RpcError::Transport(kind) => ClientError::Connection(kind.to_string()),
            other => ClientError::Rpc(other.to_string()),
        }
    }
}
