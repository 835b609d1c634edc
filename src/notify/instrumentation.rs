use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bus::message::{Envelope, MessageKind, MessagePayload};
use crate::bus::transport::{BusHandler, MessageBus};

/// Locally registered instrumentation implementation
#[async_trait]
pub trait Instrumentation: Send + Sync {
    async fn start_watching(&self);
    async fn stop_watching(&self);
}

/// Bus-wide start/stop of user-action reporting.
///
/// Outbound requests are fire-and-forget broadcasts; send failures are
/// logged, not thrown. Inbound transitions are queued to one dedicated
/// worker so local implementations observe start/stop in bus-receipt order
/// despite concurrent delivery.
pub struct InstrumentationControl {
    bus: Arc<dyn MessageBus>,
    implementations: Arc<RwLock<Vec<Arc<dyn Instrumentation>>>>,
    lane: Mutex<Option<mpsc::UnboundedSender<bool>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InstrumentationControl {
    pub fn new(bus: Arc<dyn MessageBus>) -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<bool>();
        let implementations: Arc<RwLock<Vec<Arc<dyn Instrumentation>>>> =
            Arc::new(RwLock::new(Vec::new()));

        let worker_impls = implementations.clone();
        let worker = tokio::spawn(async move {
            while let Some(watching) = rx.recv().await {
                let snapshot = worker_impls
                    .read()
                    .expect("instrumentation set poisoned")
                    .clone();
                for implementation in snapshot {
                    if watching {
                        implementation.start_watching().await;
                    } else {
                        implementation.stop_watching().await;
                    }
                }
            }
        });

        Arc::new(Self {
            bus,
            implementations,
            lane: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Subscribe to inbound watch transitions on the bus.
    ///
    /// Both the request and the rebroadcast notification form are accepted:
    /// a platform coordinator relays requests as notifications, while flat
    /// buses deliver the request directly.
    pub fn register_with_bus(self: &Arc<Self>) {
        let handler = Arc::new(WatchHandler {
            control: self.clone(),
        });
        self.bus
            .register_handler(MessageKind::WatchRequest, handler.clone());
        self.bus.register_handler(MessageKind::WatchNotify, handler);
    }

    pub fn add_implementation(&self, implementation: Arc<dyn Instrumentation>) {
        self.implementations
            .write()
            .expect("instrumentation set poisoned")
            .push(implementation);
    }

    pub fn remove_implementation(&self, implementation: &Arc<dyn Instrumentation>) {
        self.implementations
            .write()
            .expect("instrumentation set poisoned")
            .retain(|i| !Arc::ptr_eq(i, implementation));
    }

    /// Request bus-wide start of user-action reporting
    pub async fn start_watching(&self) {
        self.broadcast(true).await;
    }

    /// Request bus-wide stop of user-action reporting
    pub async fn stop_watching(&self) {
        self.broadcast(false).await;
    }

    async fn broadcast(&self, watching: bool) {
        if let Err(e) = self
            .bus
            .send(MessagePayload::WatchRequest { watching })
            .await
        {
            warn!(watching, "watch broadcast failed: {e}");
        }
    }

    fn enqueue(&self, watching: bool) {
        let lane = self.lane.lock().expect("lane handle poisoned");
        match lane.as_ref() {
            Some(tx) => {
                if tx.send(watching).is_err() {
                    warn!("instrumentation worker gone, dropping watch transition");
                }
            }
            None => warn!("instrumentation control shut down, dropping watch transition"),
        }
    }

    /// Stop the worker lane
    pub async fn shutdown(&self) {
        self.lane.lock().expect("lane handle poisoned").take();
        let worker = self.worker.lock().expect("worker handle poisoned").take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

struct WatchHandler {
    control: Arc<InstrumentationControl>,
}

#[async_trait]
impl BusHandler for WatchHandler {
    async fn handle(&self, envelope: &Envelope) -> Option<MessagePayload> {
        match envelope.payload {
            MessagePayload::WatchRequest { watching }
            | MessagePayload::WatchNotify { watching } => {
                debug!(watching, from = %envelope.sender, "watch transition received");
                self.control.enqueue(watching);
            }
            _ => {}
        }
        None
    }
}
