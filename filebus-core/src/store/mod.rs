//! Boundary to the cloud object store.
//!
//! The broker is the only peer that talks to this layer; everyone else only
//! ever sees the presigned URLs it hands out.

pub mod memory;
pub mod s3;

use crate::message::WireHeaders;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// One stored object version as reported by the store's listing.
#[derive(Debug, Clone, PartialEq)]
pub struct FileVersion {
    pub name: String,
    pub modified: DateTime<Utc>,
    pub size: u64,
    pub version_id: Option<String>,
}

/// The direction a presigned URL authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferVerb {
    Fetch,
    Store,
}

impl fmt::Display for TransferVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::Store => f.write_str("store"),
        }
    }
}

/// A time-limited signed URL plus the headers that must accompany it, copied
/// verbatim onto the data-plane request.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    pub url: String,
    pub headers: WireHeaders,
}

impl SignedRequest {
    /// The degraded grant a broker sends when signing failed. Receivers must
    /// treat it as a failed grant, never dereference it.
    pub fn empty() -> Self {
        Self {
            url: String::new(),
            headers: WireHeaders::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }
}

#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Full listing of the store, in the store's own order. Failure is
    /// [`crate::FilebusError::StoreUnavailable`].
    async fn list_versions(&self) -> Result<Vec<FileVersion>>;

    /// Sign one URL for `key` with the given validity window. A store-verb
    /// signature must not bind to a payload size, so the client can stream a
    /// body of any length against it.
    async fn presign(&self, key: &str, verb: TransferVerb, ttl: Duration)
        -> Result<SignedRequest>;
}
