use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::credentials::Credential;
use crate::models::error::LabError;
use crate::session::wire::{LiveConnectConfig, MediaChunk, ServerMessage};

/// Everything a duplex channel can report after `connect` returns.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Opened,
    Message(ServerMessage),
    Closed,
    Error(String),
}

/// Where a transport delivers its events, in arrival order.
pub type EventSender = mpsc::UnboundedSender<ChannelEvent>;

/// Opens long-lived bidirectional streaming channels.
#[async_trait]
pub trait DuplexConnector: Send + Sync {
    /// Start opening a channel bound to `credential`.
    ///
    /// The returned handle is usable once `ChannelEvent::Opened` has been sent.
    async fn connect(
        &self,
        credential: Credential,
        config: LiveConnectConfig,
        events: EventSender,
    ) -> Result<Arc<dyn DuplexChannel>, LabError>;
}

/// An open streaming channel.
#[async_trait]
pub trait DuplexChannel: Send + Sync {
    async fn send_realtime_input(&self, chunk: MediaChunk) -> Result<(), LabError>;

    /// Close the channel. Idempotent, never blocks.
    fn close(&self);
}
