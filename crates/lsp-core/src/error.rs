use std::{path::PathBuf, time::Duration};

use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the transport, multiplexer, pool, and session.
#[derive(Debug, Error)]
pub enum Error {
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("server returned JSON-RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("request was cancelled")]
    Cancelled,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("operation attempted on a closed session")]
    SessionClosed,
    #[error("backend adapter configuration failed: {0}")]
    Configuration(String),
    #[error("operation not supported by this backend: {0}")]
    Unsupported(String),
    #[error("i/o error: {0}")]
    Io(#[source] std::io::Error),
    #[error("failed to serialize or deserialize JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("transport channel closed unexpectedly")]
    ChannelClosed,
    #[error("failed to write backend config at `{path}`: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
