//! Filebus Core - file transfer between untrusted peers and S3 over a shared
//! message bus.
//!
//! One peer (the broker) holds the only cloud credentials and answers URL and
//! listing requests; every other peer requests a short-lived presigned URL
//! over the bus and then transfers directly against the object store. The bus
//! is a plain broadcast channel: request/response correlation is done by
//! tagging every request with a self-assigned identity and filtering replies
//! on it.

pub mod broker;
pub mod bus;
pub mod client;
pub mod error;
pub mod identity;
pub mod index;
pub mod message;
pub mod store;
pub mod transfer;

pub use broker::{Broker, URL_TTL};
pub use bus::memory::{MemoryBus, MemoryBusChannel};
pub use bus::redis::RedisBus;
pub use bus::{BusChannel, RawMessage};
pub use client::{BrokerClient, DownloadGrant, DownloadTarget};
pub use error::{FilebusError, Result};
pub use identity::Identity;
pub use index::VersionIndex;
pub use message::{FileEntry, Message, WireHeaders};
pub use store::memory::MemoryStore;
pub use store::s3::S3Store;
pub use store::{FileVersion, SignedRequest, StoreBackend, TransferVerb};
