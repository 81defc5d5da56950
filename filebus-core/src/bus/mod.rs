//! Boundary to the shared publish/subscribe bus.
//!
//! The bus is an unordered broadcast channel: every connected peer observes
//! every message sent by every other peer. Delivery is fire-and-forget; the
//! only ordering assumption anywhere in the protocol is FIFO per sender.

pub mod memory;
pub mod redis;

use crate::identity::Identity;
use crate::message::Message;
use crate::Result;
use async_trait::async_trait;

/// One inbound bus frame: the decoded JSON field mapping plus the original
/// raw text it was decoded from.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub contents: serde_json::Value,
    pub raw: String,
}

impl RawMessage {
    /// Parse a wire frame. Frames that are not JSON objects are not messages
    /// and are dropped at the transport edge.
    pub fn from_wire(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let contents: serde_json::Value = serde_json::from_str(&raw).ok()?;
        contents.is_object().then_some(Self { contents, raw })
    }

    /// The `type` discriminator, if present.
    pub fn message_type(&self) -> Option<&str> {
        self.contents.get("type")?.as_str()
    }

    /// Decode into a typed [`Message`]. `None` means the frame does not match
    /// any known shape and must be skipped, not errored.
    pub fn decode(&self) -> Option<Message> {
        serde_json::from_str(&self.raw).ok()
    }
}

/// A live connection to the bus, bound to one self-assigned [`Identity`].
#[async_trait]
pub trait BusChannel: Send {
    fn identity(&self) -> &Identity;

    /// Block until the next inbound frame arrives. Transport failure here is
    /// fatal to the calling loop.
    async fn recv(&mut self) -> Result<RawMessage>;

    /// Publish one message to every connected peer. Fire-and-forget: returns
    /// once handed to the transport, with no delivery confirmation.
    async fn send(&mut self, message: &Message) -> Result<()>;
}
