use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Header name to ordered list of values, copied verbatim onto the
/// data-plane request by the receiving client.
pub type WireHeaders = HashMap<String, Vec<String>>;

/// One object-store entry as reported in a `FileListing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Every message exchanged over the bus, keyed by the `type` discriminator.
///
/// Anything on the bus that does not decode into one of these variants is
/// skipped by receivers, never errored: the bus carries unrelated traffic by
/// design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "RequestDownloadURL")]
    RequestDownloadUrl {
        requestor: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        latest: Option<bool>,
    },
    #[serde(rename = "DownloadURLAvailable")]
    DownloadUrlAvailable {
        requestor: String,
        filename: String,
        url: String,
        headers: WireHeaders,
    },
    #[serde(rename = "RequestUploadURL")]
    RequestUploadUrl { requestor: String, filename: String },
    #[serde(rename = "UploadURLAvailable")]
    UploadUrlAvailable {
        requestor: String,
        filename: String,
        url: String,
        headers: WireHeaders,
    },
    /// Broadcast after a successful store-bound PUT; carries no payload.
    FileUploaded,
    RequestFileList { requestor: String, count: usize },
    FileListing {
        requestor: String,
        files: Vec<FileEntry>,
    },
}

impl Message {
    pub fn to_wire(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn request_carries_type_discriminator() {
        let message = Message::RequestUploadUrl {
            requestor: "file-put-abc".to_string(),
            filename: "notes.txt".to_string(),
        };
        let wire: serde_json::Value =
            serde_json::from_str(&message.to_wire().unwrap()).unwrap();
        assert_eq!(wire["type"], "RequestUploadURL");
        assert_eq!(wire["requestor"], "file-put-abc");
        assert_eq!(wire["filename"], "notes.txt");
    }

    #[test]
    fn optional_request_fields_are_omitted() {
        let message = Message::RequestDownloadUrl {
            requestor: "file-get-abc".to_string(),
            filename: None,
            latest: Some(true),
        };
        let wire: serde_json::Value =
            serde_json::from_str(&message.to_wire().unwrap()).unwrap();
        assert_eq!(wire["latest"], true);
        assert!(wire.get("filename").is_none());
    }

    #[test]
    fn decodes_download_grant_with_multi_value_headers() {
        let raw = r#"{
            "type": "DownloadURLAvailable",
            "requestor": "file-get-abc",
            "filename": "notes.txt",
            "url": "https://bucket.s3.amazonaws.com/notes.txt?sig=x",
            "headers": {"x-amz-meta-tag": ["a", "b"]}
        }"#;
        let message: Message = serde_json::from_str(raw).unwrap();
        match message {
            Message::DownloadUrlAvailable {
                filename, headers, ..
            } => {
                assert_eq!(filename, "notes.txt");
                assert_eq!(headers["x-amz-meta-tag"], vec!["a", "b"]);
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn file_uploaded_needs_no_payload() {
        let message: Message = serde_json::from_str(r#"{"type":"FileUploaded"}"#).unwrap();
        assert_eq!(message, Message::FileUploaded);
    }

    #[test]
    fn unknown_type_fails_decode() {
        let result: std::result::Result<Message, _> =
            serde_json::from_str(r#"{"type":"Notification","text":"hi"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn listing_round_trips() {
        let message = Message::FileListing {
            requestor: "file-list-abc".to_string(),
            files: vec![FileEntry {
                name: "a.bin".to_string(),
                size: 42,
                modified: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            }],
        };
        let decoded: Message =
            serde_json::from_str(&message.to_wire().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }
}
