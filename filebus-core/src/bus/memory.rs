//! In-process broadcast bus.
//!
//! A faithful stand-in for the real transport: every channel sees every
//! frame, including frames it published itself. Used by the test suite and
//! usable for single-process wiring.

use super::{BusChannel, RawMessage};
use crate::error::FilebusError;
use crate::identity::Identity;
use crate::message::Message;
use crate::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 256;

/// Shared hub. Clone it anywhere a new connection is needed.
#[derive(Clone)]
pub struct MemoryBus {
    sender: broadcast::Sender<String>,
}

impl MemoryBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn connect(&self, identity: Identity) -> MemoryBusChannel {
        MemoryBusChannel {
            identity,
            sender: self.sender.clone(),
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryBusChannel {
    identity: Identity,
    sender: broadcast::Sender<String>,
    receiver: broadcast::Receiver<String>,
}

#[async_trait]
impl BusChannel for MemoryBusChannel {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn recv(&mut self) -> Result<RawMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(frame) => {
                    if let Some(raw) = RawMessage::from_wire(frame) {
                        return Ok(raw);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("memory bus receiver lagged, {} frames lost", missed);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(FilebusError::Transport("memory bus closed".to_string()));
                }
            }
        }
    }

    async fn send(&mut self, message: &Message) -> Result<()> {
        let frame = message.to_wire()?;
        self.sender
            .send(frame)
            .map_err(|_| FilebusError::Transport("memory bus has no receivers".to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_channel_sees_every_frame() {
        let bus = MemoryBus::new();
        let mut a = bus.connect(Identity::generate("file-get"));
        let mut b = bus.connect(Identity::generate("file-put"));

        a.send(&Message::FileUploaded).await.unwrap();

        let at_b = b.recv().await.unwrap();
        assert_eq!(at_b.message_type(), Some("FileUploaded"));

        // broadcast semantics include the sender itself
        let at_a = a.recv().await.unwrap();
        assert_eq!(at_a.message_type(), Some("FileUploaded"));
    }

    #[tokio::test]
    async fn frames_keep_sender_order() {
        let bus = MemoryBus::new();
        let mut sender = bus.connect(Identity::generate("file-put"));
        let mut receiver = bus.connect(Identity::generate("file-broker"));

        sender
            .send(&Message::RequestUploadUrl {
                requestor: "file-put-1".to_string(),
                filename: "first".to_string(),
            })
            .await
            .unwrap();
        sender.send(&Message::FileUploaded).await.unwrap();

        assert_eq!(
            receiver.recv().await.unwrap().message_type(),
            Some("RequestUploadURL")
        );
        assert_eq!(
            receiver.recv().await.unwrap().message_type(),
            Some("FileUploaded")
        );
    }
}
