use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilebusError {
    /// Bus connect/send/receive failure. Fatal to the calling process.
    #[error("bus transport error: {0}")]
    Transport(String),

    /// The object store listing call failed. The broker logs this and keeps
    /// serving from the previously built index.
    #[error("object store listing unavailable: {0}")]
    StoreUnavailable(String),

    /// URL signing failed for a single request.
    #[error("presign failed: {0}")]
    Presign(String),

    /// The broker answered with an empty URL, meaning it could not sign.
    #[error("broker could not issue a signed url for '{0}'")]
    Grant(String),

    /// No correlated broker reply arrived within the configured bound.
    #[error("timed out after {0:?} waiting for a broker response")]
    Timeout(Duration),

    /// The data-plane HTTP request could not be performed.
    #[error("http request failed: {0}")]
    Http(String),

    /// The object store rejected the transfer.
    #[error("transfer failed: status {status}: {body}")]
    TransferFailed { status: u16, body: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FilebusError>;
