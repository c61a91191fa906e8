use crate::domain::message::Message;
use crate::errors::EngineError;
use async_trait::async_trait;

/// Best-effort gossip to every peer.
///
/// `recv` returns messages from peers in arrival order and `None` once
/// the endpoint is closed and drained. `send` fans a message out to all
/// peers; delivery is not guaranteed and duplicates are expected, the
/// layers above tolerate both.
#[async_trait]
pub trait Broadcast: Send + Sync + 'static {
    async fn recv(&self) -> Option<Message>;
    async fn send(&self, msg: Message) -> Result<(), EngineError>;
    /// Stop receiving; buffered messages remain readable until drained.
    async fn close(&self);
}
