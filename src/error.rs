//! Error types for the API layer and the export pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single call against the remote API
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 429; `retry_after` is the server-suggested wait in seconds
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("HTTP {status} from {method}")]
    Status { method: String, status: u16 },

    /// 2xx response whose envelope carried `ok: false`
    #[error("{method} failed: {error}")]
    Slack { method: String, error: String },

    #[error("request to {method} failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode {method} response: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }
}

/// Fatal failure while fetching or archiving a conversation
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{call}: {source}")]
    Api {
        call: String,
        #[source]
        source: ApiError,
    },

    #[error("unexpected start of thread {root}: first reply is {found:?}")]
    ThreadRootMismatch { root: String, found: Option<String> },

    #[error("invalid message timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("pagination of {call} exceeded {limit} pages")]
    PaginationLimit { call: String, limit: u32 },

    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ExportError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
