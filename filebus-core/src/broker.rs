use crate::bus::BusChannel;
use crate::index::VersionIndex;
use crate::message::{FileEntry, Message};
use crate::store::{SignedRequest, StoreBackend, TransferVerb};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Validity window for every issued URL. This bound is the system's only
/// containment of a leaked URL.
pub const URL_TTL: Duration = Duration::from_secs(15 * 60);

/// The credential-holding peer: one dispatch loop over the bus, answering
/// URL and listing requests out of its [`VersionIndex`].
///
/// Requests are handled strictly one at a time, and an index refresh runs
/// synchronously inside the loop. That serializes refresh with request
/// handling on purpose: a query must never observe a half-rebuilt index.
pub struct Broker {
    store: Arc<dyn StoreBackend>,
    index: VersionIndex,
}

impl Broker {
    pub fn new(store: Arc<dyn StoreBackend>) -> Self {
        Self {
            store,
            index: VersionIndex::new(),
        }
    }

    pub fn index(&self) -> &VersionIndex {
        &self.index
    }

    /// Serve forever. Returns only on bus transport failure, which is fatal
    /// to the broker process.
    pub async fn run(&mut self, conn: &mut dyn BusChannel) -> Result<()> {
        self.refresh_index().await;
        tracing::info!(
            "broker {} serving, {} objects indexed",
            conn.identity(),
            self.index.len()
        );

        loop {
            let raw = conn.recv().await?;
            let Some(message) = raw.decode() else {
                tracing::trace!(
                    "skipping unrecognized bus frame: type={:?}",
                    raw.message_type()
                );
                continue;
            };
            if let Some(reply) = self.handle(message).await {
                conn.send(&reply).await?;
            }
        }
    }

    /// Handle one decoded message; `Some` is the reply to publish. Requests
    /// are stateless against the current index and credentials.
    pub async fn handle(&mut self, message: Message) -> Option<Message> {
        match message {
            Message::RequestDownloadUrl {
                requestor,
                filename,
                latest,
            } => {
                let filename = if latest.unwrap_or(false) {
                    match self.index.latest() {
                        Some(version) => version.name.clone(),
                        None => {
                            tracing::info!(
                                "{} asked for the latest file but the index is empty",
                                requestor
                            );
                            return None;
                        }
                    }
                } else {
                    match filename.filter(|name| !name.is_empty()) {
                        Some(name) => name,
                        None => {
                            tracing::warn!(
                                "download request from {} has neither filename nor latest flag",
                                requestor
                            );
                            return None;
                        }
                    }
                };

                tracing::info!("issuing download url for '{}' to {}", filename, requestor);
                let signed = self.issue(&filename, TransferVerb::Fetch).await;
                Some(Message::DownloadUrlAvailable {
                    requestor,
                    filename,
                    url: signed.url,
                    headers: signed.headers,
                })
            }
            Message::RequestUploadUrl {
                requestor,
                filename,
            } => {
                tracing::info!("issuing upload url for '{}' to {}", filename, requestor);
                let signed = self.issue(&filename, TransferVerb::Store).await;
                Some(Message::UploadUrlAvailable {
                    requestor,
                    filename,
                    url: signed.url,
                    headers: signed.headers,
                })
            }
            Message::FileUploaded => {
                tracing::info!("upload notification received, refreshing index");
                self.refresh_index().await;
                None
            }
            Message::RequestFileList { requestor, count } => {
                let files: Vec<FileEntry> = self
                    .index
                    .first(count)
                    .iter()
                    .map(|version| FileEntry {
                        name: version.name.clone(),
                        size: version.size,
                        modified: version.modified,
                    })
                    .collect();
                tracing::info!("listing {} files for {}", files.len(), requestor);
                Some(Message::FileListing { requestor, files })
            }
            // responses from this or another broker; not ours to handle
            Message::DownloadUrlAvailable { .. }
            | Message::UploadUrlAvailable { .. }
            | Message::FileListing { .. } => None,
        }
    }

    async fn issue(&self, key: &str, verb: TransferVerb) -> SignedRequest {
        match self.store.presign(key, verb, URL_TTL).await {
            Ok(signed) => signed,
            Err(error) => {
                tracing::error!("presign {} failed for '{}': {}", verb, key, error);
                SignedRequest::empty()
            }
        }
    }

    async fn refresh_index(&mut self) {
        match self.index.refresh(self.store.as_ref()).await {
            Ok(count) => tracing::debug!("index refreshed, {} objects", count),
            Err(error) => {
                tracing::warn!("index refresh failed, keeping previous index: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn at(minute: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    fn broker_with(store: &MemoryStore) -> Broker {
        Broker::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn upload_request_gets_addressed_grant() {
        let store = MemoryStore::new();
        let mut broker = broker_with(&store);

        let reply = broker
            .handle(Message::RequestUploadUrl {
                requestor: "file-put-a".to_string(),
                filename: "x.txt".to_string(),
            })
            .await;

        match reply {
            Some(Message::UploadUrlAvailable {
                requestor,
                filename,
                url,
                ..
            }) => {
                assert_eq!(requestor, "file-put-a");
                assert_eq!(filename, "x.txt");
                assert!(!url.is_empty());
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn presign_failure_degrades_to_empty_url() {
        let store = MemoryStore::new();
        store.fail_presign(true);
        let mut broker = broker_with(&store);

        let reply = broker
            .handle(Message::RequestUploadUrl {
                requestor: "file-put-a".to_string(),
                filename: "x.txt".to_string(),
            })
            .await;

        match reply {
            Some(Message::UploadUrlAvailable { url, headers, .. }) => {
                assert!(url.is_empty());
                assert!(headers.is_empty());
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn latest_download_on_empty_index_stays_silent() {
        let store = MemoryStore::new();
        let mut broker = broker_with(&store);

        let reply = broker
            .handle(Message::RequestDownloadUrl {
                requestor: "file-get-a".to_string(),
                filename: None,
                latest: Some(true),
            })
            .await;

        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn latest_download_resolves_most_recent() {
        let store = MemoryStore::new();
        store.put_object("old.txt", 1, at(0));
        store.put_object("new.txt", 2, at(30));
        let mut broker = broker_with(&store);
        broker.refresh_index().await;

        let reply = broker
            .handle(Message::RequestDownloadUrl {
                requestor: "file-get-a".to_string(),
                filename: None,
                latest: Some(true),
            })
            .await;

        match reply {
            Some(Message::DownloadUrlAvailable { filename, .. }) => {
                assert_eq!(filename, "new.txt");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn named_download_does_not_consult_index() {
        let store = MemoryStore::new();
        let mut broker = broker_with(&store);

        let reply = broker
            .handle(Message::RequestDownloadUrl {
                requestor: "file-get-a".to_string(),
                filename: Some("anything.bin".to_string()),
                latest: None,
            })
            .await;

        assert!(matches!(
            reply,
            Some(Message::DownloadUrlAvailable { filename, .. }) if filename == "anything.bin"
        ));
    }

    #[tokio::test]
    async fn upload_notification_refreshes_empty_index() {
        let store = MemoryStore::new();
        let mut broker = broker_with(&store);
        broker.refresh_index().await;
        assert!(broker.index().is_empty());

        store.put_object("fresh.txt", 9, at(5));
        assert!(broker.handle(Message::FileUploaded).await.is_none());

        let reply = broker
            .handle(Message::RequestFileList {
                requestor: "file-list-a".to_string(),
                count: 10,
            })
            .await;

        match reply {
            Some(Message::FileListing { files, .. }) => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].name, "fresh.txt");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_refresh_keeps_serving_stale_index() {
        let store = MemoryStore::new();
        store.put_object("stale.txt", 1, at(0));
        let mut broker = broker_with(&store);
        broker.refresh_index().await;

        store.fail_listing(true);
        assert!(broker.handle(Message::FileUploaded).await.is_none());

        let reply = broker
            .handle(Message::RequestFileList {
                requestor: "file-list-a".to_string(),
                count: 10,
            })
            .await;

        assert!(matches!(
            reply,
            Some(Message::FileListing { files, .. }) if files.len() == 1
        ));
    }

    #[tokio::test]
    async fn listing_is_truncated_and_ordered() {
        let store = MemoryStore::new();
        store.put_object("a.txt", 1, at(1));
        store.put_object("c.txt", 3, at(3));
        store.put_object("b.txt", 2, at(2));
        let mut broker = broker_with(&store);
        broker.refresh_index().await;

        let reply = broker
            .handle(Message::RequestFileList {
                requestor: "file-list-a".to_string(),
                count: 2,
            })
            .await;

        match reply {
            Some(Message::FileListing { files, .. }) => {
                let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, ["c.txt", "b.txt"]);
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn zero_count_listing_is_empty_not_an_error() {
        let store = MemoryStore::new();
        store.put_object("a.txt", 1, at(1));
        let mut broker = broker_with(&store);
        broker.refresh_index().await;

        let reply = broker
            .handle(Message::RequestFileList {
                requestor: "file-list-a".to_string(),
                count: 0,
            })
            .await;

        assert!(matches!(
            reply,
            Some(Message::FileListing { files, .. }) if files.is_empty()
        ));
    }

    #[tokio::test]
    async fn foreign_responses_are_ignored() {
        let store = MemoryStore::new();
        let mut broker = broker_with(&store);

        let reply = broker
            .handle(Message::UploadUrlAvailable {
                requestor: "file-put-someone".to_string(),
                filename: "x.txt".to_string(),
                url: "memory://x.txt".to_string(),
                headers: Default::default(),
            })
            .await;

        assert!(reply.is_none());
    }
}
