use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error as ThisError;

use crate::frame::Frame;

/// Everything a call through the client can fail with.
///
/// The error is `Clone` because a single connect outcome or teardown reason is handed to every
/// caller that was waiting on it.
#[derive(Debug, Clone, ThisError)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("io error: {0}")]
    Io(Arc<io::Error>),
    #[error("protocol error; {0}")]
    Protocol(String),
    /// An error reply (`-ERR ...`) sent by the server.
    #[error("{0}")]
    Server(String),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("unexpected reply, expected {expected}, got {actual}")]
    UnexpectedReply { expected: String, actual: Frame },
    #[error("invalid json: {0}")]
    Json(Arc<serde_json::Error>),
}

impl ClientError {
    pub(crate) fn unexpected(expected: &str, actual: Frame) -> ClientError {
        ClientError::UnexpectedReply {
            expected: expected.to_string(),
            actual,
        }
    }

    /// Whether the failure came from the transport rather than from the server's answer.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ClientError::Connect { .. } | ClientError::ConnectionClosed | ClientError::Io(_)
        )
    }
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> ClientError {
        ClientError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> ClientError {
        ClientError::Json(Arc::new(err))
    }
}
