use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bus::message::{Envelope, MessageKind, MessagePayload};
use crate::bus::transport::{BusHandler, MessageBus};
use crate::core::errors::{Result, TetherError};

/// Default bound for gathers issued without an explicit timeout
pub const DEFAULT_GATHER_TIMEOUT: Duration = Duration::from_secs(10);

const HUB_CAPACITY: usize = 1024;

/// In-process message hub shared by every [`LocalBus`] participant.
///
/// Every envelope is broadcast to every participant; each participant's
/// dispatch loop skips its own traffic and routes replies back to the
/// gathering requester by transaction id.
pub struct LocalBusHub {
    sender: async_broadcast::Sender<Envelope>,
    // keeps the channel open while participants come and go
    _keepalive: async_broadcast::InactiveReceiver<Envelope>,
    uid: AtomicU64,
    default_timeout: Duration,
}

impl LocalBusHub {
    pub fn new() -> Arc<Self> {
        Self::with_timeout(DEFAULT_GATHER_TIMEOUT)
    }

    /// Hub whose participants use the given default gather bound
    pub fn with_timeout(default_timeout: Duration) -> Arc<Self> {
        let (mut sender, receiver) = async_broadcast::broadcast(HUB_CAPACITY);
        sender.set_overflow(true);
        Arc::new(Self {
            sender,
            _keepalive: receiver.deactivate(),
            uid: AtomicU64::new(1),
            default_timeout,
        })
    }

    pub fn next_uid(&self) -> u64 {
        self.uid.fetch_add(1, Ordering::Relaxed)
    }

    /// Join the hub as a new participant
    pub fn connect(self: &Arc<Self>, client_id: impl Into<String>) -> Arc<LocalBus> {
        let client_id = client_id.into();
        let handlers: Arc<DashMap<MessageKind, Arc<dyn BusHandler>>> = Arc::new(DashMap::new());
        let pending: Arc<DashMap<u64, mpsc::UnboundedSender<Envelope>>> = Arc::new(DashMap::new());

        let mut receiver = self.sender.new_receiver();
        let hub = self.clone();
        let loop_client = client_id.clone();
        let loop_handlers = handlers.clone();
        let loop_pending = pending.clone();
        let dispatch = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(envelope) => {
                        if envelope.sender == loop_client {
                            continue;
                        }
                        if let Some(reply_uid) = envelope.reply_to {
                            // replies go straight to the gathering requester
                            if let Some(waiter) = loop_pending.get(&reply_uid) {
                                let _ = waiter.send(envelope.clone());
                            }
                            continue;
                        }
                        let handler = loop_handlers.get(&envelope.kind()).map(|h| h.clone());
                        match handler {
                            Some(handler) => {
                                if let Some(payload) = handler.handle(&envelope).await {
                                    let reply =
                                        envelope.reply(hub.next_uid(), &loop_client, payload);
                                    if hub.sender.broadcast(reply).await.is_err() {
                                        warn!(client = %loop_client, "local bus closed while replying");
                                    }
                                }
                            }
                            None => {
                                debug!(client = %loop_client, kind = ?envelope.kind(), "no handler for inbound message");
                            }
                        }
                    }
                    Err(async_broadcast::RecvError::Overflowed(missed)) => {
                        warn!(client = %loop_client, missed, "local bus receiver lagged");
                    }
                    Err(async_broadcast::RecvError::Closed) => break,
                }
            }
        });

        Arc::new(LocalBus {
            hub: self.clone(),
            client_id,
            handlers,
            pending,
            dispatch,
        })
    }

    /// Join with a generated client id
    pub fn connect_anonymous(self: &Arc<Self>) -> Arc<LocalBus> {
        self.connect(format!("client-{}", Uuid::new_v4()))
    }
}

/// One participant on a [`LocalBusHub`]
pub struct LocalBus {
    hub: Arc<LocalBusHub>,
    client_id: String,
    handlers: Arc<DashMap<MessageKind, Arc<dyn BusHandler>>>,
    pending: Arc<DashMap<u64, mpsc::UnboundedSender<Envelope>>>,
    dispatch: tokio::task::JoinHandle<()>,
}

impl Drop for LocalBus {
    fn drop(&mut self) {
        self.dispatch.abort();
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn next_uid(&self) -> u64 {
        self.hub.next_uid()
    }

    fn default_timeout(&self) -> Duration {
        self.hub.default_timeout
    }

    async fn send(&self, payload: MessagePayload) -> Result<()> {
        let envelope = Envelope::new(self.next_uid(), &self.client_id, payload);
        self.hub
            .sender
            .broadcast(envelope)
            .await
            .map_err(|e| TetherError::remote("send", e.to_string()))?;
        Ok(())
    }

    async fn gather(&self, payload: MessagePayload, timeout: Duration) -> Result<Vec<Envelope>> {
        let uid = self.next_uid();
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.pending.insert(uid, tx);

        let envelope = Envelope::new(uid, &self.client_id, payload);
        if let Err(e) = self.hub.sender.broadcast(envelope).await {
            self.pending.remove(&uid);
            return Err(TetherError::remote("gather", e.to_string()));
        }

        // collect every reply arriving within the bound; the participant
        // count is unknown, so the full window is always waited out
        let mut replies = Vec::new();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(envelope)) => replies.push(envelope),
                Ok(None) | Err(_) => break,
            }
        }
        self.pending.remove(&uid);
        Ok(replies)
    }

    fn register_handler(&self, kind: MessageKind, handler: Arc<dyn BusHandler>) {
        self.handlers.insert(kind, handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SerialResponder;

    #[async_trait]
    impl BusHandler for SerialResponder {
        async fn handle(&self, envelope: &Envelope) -> Option<MessagePayload> {
            assert!(matches!(envelope.payload, MessagePayload::SerialRequest));
            Some(MessagePayload::SerialReply { serial: 99 })
        }
    }

    #[tokio::test]
    async fn test_gather_collects_replies() {
        let hub = LocalBusHub::with_timeout(Duration::from_millis(200));
        let asker = hub.connect("asker");
        let responder = hub.connect("responder");
        responder.register_handler(MessageKind::SerialRequest, Arc::new(SerialResponder));

        let replies = asker
            .gather(MessagePayload::SerialRequest, asker.default_timeout())
            .await
            .unwrap();
        assert_eq!(replies.len(), 1);
        assert!(matches!(
            replies[0].payload,
            MessagePayload::SerialReply { serial: 99 }
        ));
    }

    #[tokio::test]
    async fn test_own_messages_are_skipped() {
        let hub = LocalBusHub::with_timeout(Duration::from_millis(200));
        let solo = hub.connect("solo");
        solo.register_handler(MessageKind::SerialRequest, Arc::new(SerialResponder));

        // the only registered handler belongs to the sender itself
        let replies = solo
            .gather(MessagePayload::SerialRequest, solo.default_timeout())
            .await
            .unwrap();
        assert!(replies.is_empty());
    }
}
