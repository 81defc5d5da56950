use super::{FileVersion, SignedRequest, StoreBackend, TransferVerb};
use crate::error::FilebusError;
use crate::message::WireHeaders;
use crate::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::ObjectStore;
use reqwest::Method;
use std::time::Duration;

/// S3-backed store. Credentials come from the standard AWS environment
/// (`AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` and friends); nothing in
/// this process ever forwards them to a peer.
pub struct S3Store {
    store: AmazonS3,
    bucket: String,
}

impl S3Store {
    pub fn new(bucket: &str, region: &str) -> Result<Self> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region)
            .build()
            .map_err(|error| FilebusError::Config(error.to_string()))?;

        Ok(Self {
            store,
            bucket: bucket.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl StoreBackend for S3Store {
    async fn list_versions(&self) -> Result<Vec<FileVersion>> {
        let mut listing = self.store.list(None);
        let mut versions = Vec::new();
        while let Some(entry) = listing.next().await {
            let meta =
                entry.map_err(|error| FilebusError::StoreUnavailable(error.to_string()))?;
            versions.push(FileVersion {
                name: meta.location.to_string(),
                modified: meta.last_modified,
                size: meta.size as u64,
                version_id: meta.version,
            });
        }
        Ok(versions)
    }

    async fn presign(
        &self,
        key: &str,
        verb: TransferVerb,
        ttl: Duration,
    ) -> Result<SignedRequest> {
        let method = match verb {
            TransferVerb::Fetch => Method::GET,
            TransferVerb::Store => Method::PUT,
        };
        let path = ObjectPath::from(key);
        let url = self
            .store
            .signed_url(method, &path, ttl)
            .await
            .map_err(|error| FilebusError::Presign(error.to_string()))?;

        // Query-string signing: the grant travels entirely in the URL, so no
        // extra headers are required on the data-plane request.
        Ok(SignedRequest {
            url: url.to_string(),
            headers: WireHeaders::new(),
        })
    }
}
