use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::bus::message::{Envelope, MessageKind, MessagePayload};
use crate::bus::transport::{BusHandler, MessageBus};
use crate::exec::invocation::InvocationCache;
use crate::exec::registry::ExecutorMap;

/// How long a cancel worker waits for its target to appear in the
/// invocation cache; the target may not have arrived yet due to message
/// ordering, or may already be gone
pub const CANCEL_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Turns inbound cancel messages into cancel calls on every local handler.
///
/// The canceled unit may be a composite whose nested calls are owned by
/// different handlers, so fan-out goes to every registered executor, not a
/// presumed owner. Each receipt is handled on its own spawned worker so
/// cancellation never blocks ingestion of further bus messages.
pub struct CancelReceiver {
    executors: Arc<ExecutorMap>,
    cache: Arc<InvocationCache>,
    lookup_timeout: Duration,
}

impl CancelReceiver {
    pub fn new(executors: Arc<ExecutorMap>, cache: Arc<InvocationCache>) -> Arc<Self> {
        Self::with_lookup_timeout(executors, cache, CANCEL_LOOKUP_TIMEOUT)
    }

    /// Receiver with a non-default cache-lookup bound
    pub fn with_lookup_timeout(
        executors: Arc<ExecutorMap>,
        cache: Arc<InvocationCache>,
        lookup_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            executors,
            cache,
            lookup_timeout,
        })
    }

    /// Subscribe to cancel requests on the bus
    pub fn register_with_bus(self: &Arc<Self>, bus: &Arc<dyn MessageBus>) {
        bus.register_handler(
            MessageKind::CancelRequest,
            Arc::new(CancelHandler {
                receiver: self.clone(),
            }),
        );
    }

    /// Handle one cancel request (runs on a spawned worker)
    async fn run_cancel(&self, uid: u64) {
        let invocation = match self.cache.wait_for(uid, self.lookup_timeout).await {
            Some(invocation) => invocation,
            None => {
                warn!(
                    uid,
                    timeout_ms = self.lookup_timeout.as_millis() as u64,
                    "cancel target never appeared in invocation cache, dropping"
                );
                return;
            }
        };
        let handlers = self.executors.get_all();
        debug!(uid, handlers = handlers.len(), "fanning out cancel");
        join_all(
            handlers
                .iter()
                .map(|handler| handler.cancel(invocation.clone())),
        )
        .await;
    }
}

struct CancelHandler {
    receiver: Arc<CancelReceiver>,
}

#[async_trait]
impl BusHandler for CancelHandler {
    async fn handle(&self, envelope: &Envelope) -> Option<MessagePayload> {
        if let MessagePayload::CancelRequest { uid } = envelope.payload {
            let receiver = self.receiver.clone();
            tokio::spawn(async move {
                receiver.run_cancel(uid).await;
            });
        }
        None
    }
}
