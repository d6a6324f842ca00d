//! Error types for the WebSocket RPC client

use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that can occur while talking to the ledger server
#[derive(Debug, Error)]
pub enum ClientError {
    /// The socket has not been opened yet
    #[error("WebSocket is not open - call open() first")]
    NotConnected,

    /// Failed to establish the WebSocket connection
    #[error("Failed to connect to {url}: {source}")]
    ConnectionFailed {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    /// Failed to write a frame to the socket
    #[error("Failed to send request: {0}")]
    SendFailed(#[source] tungstenite::Error),

    /// Failed to read a frame from the socket
    #[error("Failed to receive message: {0}")]
    ReceiveFailed(#[source] tungstenite::Error),

    /// Failed to serialize a request to JSON
    #[error("Failed to serialize request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// An inbound frame was not valid JSON
    #[error("Failed to deserialize message: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// The server closed the connection
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// An outgoing request failed shape validation
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The server answered a request with a non-success status
    #[error("Unsuccessful response (status {status}): {message}")]
    FailedResponse { status: String, message: Value },

    /// A response arrived for an id with no pending request
    #[error("Response to unknown request {id}: {message}")]
    UnmatchedResponse { id: String, message: Value },

    /// The monitor worker is no longer consuming the work queue
    #[error("Monitor worker has stopped")]
    WorkerStopped,

    /// The monitor worker thread panicked
    #[error("Monitor worker thread panicked")]
    WorkerPanicked,

    /// Failed to start the monitor worker thread or its runtime
    #[error("Failed to start monitor worker: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Broad classification of a [`ClientError`]
///
/// Lets the host decide how to react (reconnect, notify, or terminate)
/// without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server and client disagree about the request/response exchange
    Protocol,
    /// An outgoing request was malformed
    Validation,
    /// The connection or the wire encoding failed
    Transport,
    /// The worker thread is gone or could not start
    Worker,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FailedResponse { .. } | Self::UnmatchedResponse { .. } => ErrorKind::Protocol,
            Self::InvalidRequest { .. } => ErrorKind::Validation,
            Self::NotConnected
            | Self::ConnectionFailed { .. }
            | Self::SendFailed(_)
            | Self::ReceiveFailed(_)
            | Self::SerializeFailed(_)
            | Self::DeserializeFailed(_)
            | Self::ConnectionClosed => ErrorKind::Transport,
            Self::WorkerStopped | Self::WorkerPanicked | Self::Runtime(_) => ErrorKind::Worker,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}
