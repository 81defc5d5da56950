//! In-memory store backend with failure injection, for tests and local
//! wiring without cloud credentials.

use super::{FileVersion, SignedRequest, StoreBackend, TransferVerb};
use crate::error::FilebusError;
use crate::message::WireHeaders;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    objects: Vec<FileVersion>,
    next_version: u64,
    fail_listing: bool,
    fail_presign: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an object version. Listing order is insertion order, matching a
    /// store that appends to its version history.
    pub fn put_object(&self, name: &str, size: u64, modified: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("memory store lock");
        inner.next_version += 1;
        let version_id = Some(format!("v{}", inner.next_version));
        inner.objects.push(FileVersion {
            name: name.to_string(),
            modified,
            size,
            version_id,
        });
    }

    pub fn fail_listing(&self, fail: bool) {
        self.inner.lock().expect("memory store lock").fail_listing = fail;
    }

    pub fn fail_presign(&self, fail: bool) {
        self.inner.lock().expect("memory store lock").fail_presign = fail;
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn list_versions(&self) -> Result<Vec<FileVersion>> {
        let inner = self.inner.lock().expect("memory store lock");
        if inner.fail_listing {
            return Err(FilebusError::StoreUnavailable(
                "listing disabled by test".to_string(),
            ));
        }
        Ok(inner.objects.clone())
    }

    async fn presign(
        &self,
        key: &str,
        verb: TransferVerb,
        ttl: Duration,
    ) -> Result<SignedRequest> {
        let inner = self.inner.lock().expect("memory store lock");
        if inner.fail_presign {
            return Err(FilebusError::Presign(
                "presign disabled by test".to_string(),
            ));
        }

        let mut headers = WireHeaders::new();
        headers.insert("x-filebus-verb".to_string(), vec![verb.to_string()]);
        Ok(SignedRequest {
            url: format!("memory://{}?verb={}&ttl={}", key, verb, ttl.as_secs()),
            headers,
        })
    }
}
