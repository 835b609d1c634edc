use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::exec::invocation::ActionInvocation;

/// Monitor of invocation starts across the whole platform
#[async_trait]
pub trait GlobalActionListener: Send + Sync {
    async fn action_started(&self, invocation: &ActionInvocation) -> anyhow::Result<()>;
}

/// Ordered fan-out of invocation-start events to global monitors.
///
/// One unbounded FIFO queue, one dedicated consumer worker. Listeners for
/// one event run sequentially and never observe two events concurrently;
/// a later event's delivery begins only after the earlier event's listeners
/// have fully drained. A failing listener is logged and isolated. After all
/// listeners have run, the invocation's start-notification gate is
/// signaled.
pub struct GlobalActionNotifier {
    queue: Mutex<Option<mpsc::UnboundedSender<Arc<ActionInvocation>>>>,
    listeners: Arc<RwLock<Vec<Arc<dyn GlobalActionListener>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl GlobalActionNotifier {
    pub fn new() -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<ActionInvocation>>();
        let listeners: Arc<RwLock<Vec<Arc<dyn GlobalActionListener>>>> =
            Arc::new(RwLock::new(Vec::new()));

        let worker_listeners = listeners.clone();
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let snapshot = worker_listeners
                    .read()
                    .expect("listener set poisoned")
                    .clone();
                for listener in snapshot {
                    if let Err(e) = listener.action_started(&event).await {
                        error!(
                            uid = event.uid(),
                            action = %event.action(),
                            "global listener failed: {e:#}"
                        );
                    }
                }
                event.start_notified();
            }
        });

        Arc::new(Self {
            queue: Mutex::new(Some(tx)),
            listeners,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn GlobalActionListener>) {
        self.listeners
            .write()
            .expect("listener set poisoned")
            .push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn GlobalActionListener>) {
        self.listeners
            .write()
            .expect("listener set poisoned")
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Enqueue an invocation-start event for delivery
    pub fn new_invocation(&self, event: Arc<ActionInvocation>) {
        let queue = self.queue.lock().expect("queue handle poisoned");
        match queue.as_ref() {
            Some(tx) => {
                if tx.send(event).is_err() {
                    warn!("global notifier worker gone, dropping start event");
                }
            }
            None => warn!("global notifier shut down, dropping start event"),
        }
    }

    /// Drain the queue and stop the worker
    pub async fn shutdown(&self) {
        self.queue.lock().expect("queue handle poisoned").take();
        let worker = self.worker.lock().expect("worker handle poisoned").take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}
