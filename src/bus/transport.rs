use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::bus::message::{Envelope, MessageKind, MessagePayload};
use crate::core::errors::Result;

/// Per-kind inbound message handler.
///
/// A returned payload is routed back to the requester as a reply correlated
/// by the inbound transaction id.
#[async_trait]
pub trait BusHandler: Send + Sync {
    async fn handle(&self, envelope: &Envelope) -> Option<MessagePayload>;
}

/// Message-bus primitives consumed by the runtime core.
///
/// The transport itself is an external collaborator; this trait is the
/// contract the core holds it to.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Stable id of this participant
    fn client_id(&self) -> &str;

    /// Next bus-wide unique transaction id
    fn next_uid(&self) -> u64;

    /// Bound applied to gathers issued without an explicit timeout
    fn default_timeout(&self) -> Duration;

    /// Broadcast a message, fire-and-forget
    async fn send(&self, payload: MessagePayload) -> Result<()>;

    /// Broadcast a query and collect all replies arriving within the bound
    async fn gather(&self, payload: MessagePayload, timeout: Duration) -> Result<Vec<Envelope>>;

    /// Register the handler for one inbound message kind
    fn register_handler(&self, kind: MessageKind, handler: Arc<dyn BusHandler>);
}
