use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::chain::callback::ErrorInfo;
use crate::types::value::Value;

/// Lifecycle status of one action or procedure invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvocationStatus {
    Created,
    Running,
    Paused,
    Succeeded,
    Failed,
}

impl InvocationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvocationStatus::Succeeded | InvocationStatus::Failed)
    }
}

/// Observer of one invocation's progress.
///
/// Execution-time errors arrive through `error`, never as a thrown failure,
/// since execution may be remote or asynchronous.
#[async_trait]
pub trait StatusListener: Send + Sync {
    async fn error(&self, invocation: &ActionInvocation, error: ErrorInfo);
    async fn new_status(&self, invocation: &ActionInvocation, status: InvocationStatus);
}

/// One live invocation of an action or procedure.
///
/// Identified bus-wide by its transaction id; the optional parent id links
/// it into the caller chain used by cancellation matching.
pub struct ActionInvocation {
    uid: u64,
    action: String,
    parent: Option<u64>,
    inputs: Vec<Value>,
    outputs: RwLock<Vec<Value>>,
    status: RwLock<InvocationStatus>,
    listeners: RwLock<Vec<Arc<dyn StatusListener>>>,
    // flipped once the global notifier has drained all listeners for the
    // start event
    started: watch::Sender<bool>,
}

impl ActionInvocation {
    pub fn new(uid: u64, action: impl Into<String>, parent: Option<u64>, inputs: Vec<Value>) -> Arc<Self> {
        let (started, _) = watch::channel(false);
        Arc::new(Self {
            uid,
            action: action.into(),
            parent,
            inputs,
            outputs: RwLock::new(Vec::new()),
            status: RwLock::new(InvocationStatus::Created),
            listeners: RwLock::new(Vec::new()),
            started,
        })
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn parent(&self) -> Option<u64> {
        self.parent
    }

    pub fn inputs(&self) -> &[Value] {
        &self.inputs
    }

    pub fn outputs(&self) -> Vec<Value> {
        self.outputs.read().expect("outputs poisoned").clone()
    }

    pub fn set_outputs(&self, outputs: Vec<Value>) {
        *self.outputs.write().expect("outputs poisoned") = outputs;
    }

    pub fn status(&self) -> InvocationStatus {
        *self.status.read().expect("status poisoned")
    }

    pub fn add_status_listener(&self, listener: Arc<dyn StatusListener>) {
        self.listeners
            .write()
            .expect("listener set poisoned")
            .push(listener);
    }

    fn listener_snapshot(&self) -> Vec<Arc<dyn StatusListener>> {
        self.listeners
            .read()
            .expect("listener set poisoned")
            .clone()
    }

    /// Transition to a new status and fan the change out to listeners
    pub async fn set_status(&self, status: InvocationStatus) {
        {
            let mut current = self.status.write().expect("status poisoned");
            if *current == status {
                return;
            }
            *current = status;
        }
        debug!(uid = self.uid, action = %self.action, ?status, "invocation status changed");
        for listener in self.listener_snapshot() {
            listener.new_status(self, status).await;
        }
    }

    /// Deliver an execution-time error to every status listener
    pub async fn report_error(&self, error: ErrorInfo) {
        for listener in self.listener_snapshot() {
            listener.error(self, error.clone()).await;
        }
    }

    /// Mark the start-notification phase complete (called by the notifier)
    pub fn start_notified(&self) {
        self.started.send_replace(true);
    }

    /// Wait until the global notifier has finished delivering this
    /// invocation's start event
    pub async fn await_start_notification(&self) {
        let mut rx = self.started.subscribe();
        if *rx.borrow() {
            return;
        }
        // sender lives in self, so changed() cannot fail while we hold &self
        let _ = rx.changed().await;
    }
}

impl std::fmt::Debug for ActionInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionInvocation")
            .field("uid", &self.uid)
            .field("action", &self.action)
            .field("parent", &self.parent)
            .field("status", &self.status())
            .finish()
    }
}

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Arena of live invocations keyed by transaction id.
///
/// Entries appear when an invocation starts and disappear when it
/// completes; the cancellation path reads it with a bounded wait because
/// the target may not have arrived yet, or may already be gone.
pub struct InvocationCache {
    entries: DashMap<u64, Arc<ActionInvocation>>,
}

impl InvocationCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn insert(&self, invocation: Arc<ActionInvocation>) {
        self.entries.insert(invocation.uid(), invocation);
    }

    pub fn remove(&self, uid: u64) -> Option<Arc<ActionInvocation>> {
        self.entries.remove(&uid).map(|(_, inv)| inv)
    }

    pub fn get(&self, uid: u64) -> Option<Arc<ActionInvocation>> {
        self.entries.get(&uid).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wait up to `bound` for the invocation to appear in the cache
    pub async fn wait_for(&self, uid: u64, bound: Duration) -> Option<Arc<ActionInvocation>> {
        let deadline = tokio::time::Instant::now() + bound;
        loop {
            if let Some(invocation) = self.get(uid) {
                return Some(invocation);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Whether `uid` was directly or transitively invoked by `ancestor`.
    ///
    /// Walks parent ids through the arena with a visited set guarding
    /// against cycles.
    pub fn is_descendant_of(&self, uid: u64, ancestor: u64) -> bool {
        let mut visited = HashSet::new();
        let mut current = uid;
        loop {
            if current == ancestor {
                return true;
            }
            if !visited.insert(current) {
                return false;
            }
            match self.get(current).and_then(|inv| inv.parent()) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}

impl Default for InvocationCache {
    fn default() -> Self {
        Self::new()
    }
}
