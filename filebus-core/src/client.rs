use crate::bus::BusChannel;
use crate::error::FilebusError;
use crate::message::{FileEntry, Message};
use crate::store::SignedRequest;
use crate::Result;
use std::time::Duration;

/// What a download request names.
#[derive(Debug, Clone, Copy)]
pub enum DownloadTarget<'a> {
    Named(&'a str),
    Latest,
}

/// A granted download: the filename the broker resolved plus the signed
/// request to run against the store.
#[derive(Debug, Clone)]
pub struct DownloadGrant {
    pub filename: String,
    pub signed: SignedRequest,
}

/// Client side of the request/await pattern shared by get, put and list.
///
/// One request is sent tagged with the connection's own identity, then the
/// inbound stream is scanned until a reply matches that identity (and, for
/// file-specific requests, the filename). Everything else on the bus is
/// discarded.
///
/// The wait is bounded by an explicit timeout; `None` waits forever, which
/// hangs indefinitely when no broker is listening.
pub struct BrokerClient<'a> {
    conn: &'a mut dyn BusChannel,
    timeout: Option<Duration>,
}

impl<'a> BrokerClient<'a> {
    pub fn new(conn: &'a mut dyn BusChannel, timeout: Option<Duration>) -> Self {
        Self { conn, timeout }
    }

    pub async fn request_download(
        &mut self,
        target: DownloadTarget<'_>,
    ) -> Result<DownloadGrant> {
        let requestor = self.conn.identity().as_str().to_string();
        let (filename, latest) = match target {
            DownloadTarget::Named(name) => (Some(name.to_string()), None),
            DownloadTarget::Latest => (None, Some(true)),
        };

        self.conn
            .send(&Message::RequestDownloadUrl {
                requestor: requestor.clone(),
                filename: filename.clone(),
                latest,
            })
            .await?;

        let grant = self
            .await_match(move |message| match message {
                Message::DownloadUrlAvailable {
                    requestor: to,
                    filename: name,
                    url,
                    headers,
                } if to == requestor
                    && filename.as_deref().is_none_or(|wanted| wanted == name) =>
                {
                    Some(DownloadGrant {
                        filename: name,
                        signed: SignedRequest { url, headers },
                    })
                }
                _ => None,
            })
            .await?;

        if grant.signed.is_empty() {
            return Err(FilebusError::Grant(grant.filename));
        }
        Ok(grant)
    }

    pub async fn request_upload(&mut self, filename: &str) -> Result<SignedRequest> {
        let requestor = self.conn.identity().as_str().to_string();
        self.conn
            .send(&Message::RequestUploadUrl {
                requestor: requestor.clone(),
                filename: filename.to_string(),
            })
            .await?;

        let wanted = filename.to_string();
        let signed = self
            .await_match(move |message| match message {
                Message::UploadUrlAvailable {
                    requestor: to,
                    filename: name,
                    url,
                    headers,
                } if to == requestor && name == wanted => {
                    Some(SignedRequest { url, headers })
                }
                _ => None,
            })
            .await?;

        if signed.is_empty() {
            return Err(FilebusError::Grant(filename.to_string()));
        }
        Ok(signed)
    }

    pub async fn request_list(&mut self, count: usize) -> Result<Vec<FileEntry>> {
        let requestor = self.conn.identity().as_str().to_string();
        self.conn
            .send(&Message::RequestFileList {
                requestor: requestor.clone(),
                count,
            })
            .await?;

        self.await_match(move |message| match message {
            Message::FileListing {
                requestor: to,
                files,
            } if to == requestor => Some(files),
            _ => None,
        })
        .await
    }

    /// Tell every listening broker that an upload just landed, so indexes
    /// get rebuilt. Fire-and-forget.
    pub async fn announce_upload(&mut self) -> Result<()> {
        self.conn.send(&Message::FileUploaded).await
    }

    async fn await_match<T>(
        &mut self,
        mut matcher: impl FnMut(Message) -> Option<T>,
    ) -> Result<T> {
        let limit = self.timeout;
        let wait = async {
            loop {
                let raw = self.conn.recv().await?;
                let Some(message) = raw.decode() else {
                    continue;
                };
                if let Some(found) = matcher(message) {
                    return Ok(found);
                }
            }
        };

        match limit {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| FilebusError::Timeout(limit))?,
            None => wait.await,
        }
    }
}
