//! Redis pub/sub transport.
//!
//! Redis pub/sub already has the bus semantics the protocol assumes: every
//! subscriber on the channel sees every published frame, publishes are
//! fire-and-forget, and ordering holds per publisher only. Subscribing and
//! publishing need separate connections, so inbound frames are pumped from
//! the subscription into an mpsc queue by a background task.

use super::{BusChannel, RawMessage};
use crate::error::FilebusError;
use crate::identity::Identity;
use crate::message::Message;
use crate::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::mpsc;

const INBOUND_QUEUE: usize = 64;

pub struct RedisBus;

impl RedisBus {
    /// Connect to the bus at `url`, subscribed to `channel`, as `identity`.
    ///
    /// `trust_transport` skips the encrypted-transport check; without it a
    /// plain `redis://` url gets a warning, since bus peers are untrusted and
    /// the transport is the only protection the protocol assumes.
    pub async fn connect(
        url: &str,
        channel: &str,
        identity: Identity,
        trust_transport: bool,
    ) -> Result<RedisBusChannel> {
        if !trust_transport && !url.starts_with("rediss://") {
            tracing::warn!(
                "bus url '{}' is not TLS; pass --trust-key to silence this",
                url
            );
        }

        let client = redis::Client::open(url)
            .map_err(|error| FilebusError::Transport(error.to_string()))?;
        let publisher = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| FilebusError::Transport(error.to_string()))?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|error| FilebusError::Transport(error.to_string()))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|error| FilebusError::Transport(error.to_string()))?;

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        tokio::spawn(async move {
            let mut stream = pubsub.into_on_message();
            while let Some(push) = stream.next().await {
                let frame: String = match push.get_payload() {
                    Ok(frame) => frame,
                    Err(error) => {
                        tracing::debug!("skipping non-text bus frame: {}", error);
                        continue;
                    }
                };
                if inbound_tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        tracing::debug!("connected to bus channel '{}' as {}", channel, identity);

        Ok(RedisBusChannel {
            identity,
            channel: channel.to_string(),
            publisher,
            inbound: inbound_rx,
        })
    }
}

pub struct RedisBusChannel {
    identity: Identity,
    channel: String,
    publisher: MultiplexedConnection,
    inbound: mpsc::Receiver<String>,
}

#[async_trait]
impl BusChannel for RedisBusChannel {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn recv(&mut self) -> Result<RawMessage> {
        loop {
            let frame = self.inbound.recv().await.ok_or_else(|| {
                FilebusError::Transport("bus subscription closed".to_string())
            })?;
            if let Some(raw) = RawMessage::from_wire(frame) {
                return Ok(raw);
            }
        }
    }

    async fn send(&mut self, message: &Message) -> Result<()> {
        let frame = message.to_wire()?;
        let _subscribers: i64 = self
            .publisher
            .publish(&self.channel, frame)
            .await
            .map_err(|error| FilebusError::Transport(error.to_string()))?;
        Ok(())
    }
}
