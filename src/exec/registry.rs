use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::bus::message::{Envelope, MessageKind, MessagePayload};
use crate::bus::transport::{BusHandler, MessageBus};
use crate::core::errors::{Result, TetherError};
use crate::exec::executor::ActionExecutor;

/// Action-name namespace always routed to the built-in procedure executor.
/// Names under it are never user-registrable.
pub const PROCEDURE_NAMESPACE: &str = "procedure";

fn in_reserved_namespace(action: &str) -> bool {
    action
        .strip_prefix(PROCEDURE_NAMESPACE)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

/// Distributed name-to-handler registry.
///
/// At most one local handler per name; registration additionally verifies
/// the claim against every bus participant before committing. Lookup is
/// purely local. The check-then-commit window is a known race: two
/// simultaneous registrations from distinct participants can both observe
/// an unclaimed name and both commit.
pub struct ExecutorMap {
    bus: Arc<dyn MessageBus>,
    executors: Mutex<HashMap<String, Arc<dyn ActionExecutor>>>,
    procedure_executor: Arc<dyn ActionExecutor>,
}

impl ExecutorMap {
    pub fn new(bus: Arc<dyn MessageBus>, procedure_executor: Arc<dyn ActionExecutor>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            executors: Mutex::new(HashMap::new()),
            procedure_executor,
        })
    }

    /// Register the inbound existence-query handler on the bus
    pub fn register_with_bus(self: &Arc<Self>) {
        self.bus.register_handler(
            MessageKind::ExecutorQuery,
            Arc::new(ExistenceQueryHandler {
                map: Arc::downgrade(self),
            }),
        );
    }

    /// Bind a handler to an action name, verified bus-wide.
    ///
    /// Blocks for one gather round trip bounded by the bus default timeout.
    /// Fails atomically with DuplicateExecutor when the name is claimed
    /// locally or by any other participant; reserved-namespace names are
    /// silently ignored.
    pub async fn put(&self, action: &str, executor: Arc<dyn ActionExecutor>) -> Result<()> {
        if in_reserved_namespace(action) {
            debug!(action, "ignoring registration in reserved namespace");
            return Ok(());
        }

        {
            let executors = self.executors.lock().expect("executor table poisoned");
            if executors.contains_key(action) {
                return Err(TetherError::duplicate_executor(
                    action,
                    self.bus.client_id(),
                ));
            }
        }

        let replies = self
            .bus
            .gather(
                MessagePayload::ExecutorQuery {
                    action: action.to_string(),
                },
                self.bus.default_timeout(),
            )
            .await?;
        for reply in replies {
            if let MessagePayload::ExecutorReply { claimed: true, .. } = reply.payload {
                return Err(TetherError::duplicate_executor(action, reply.sender));
            }
        }

        let mut executors = self.executors.lock().expect("executor table poisoned");
        if executors.contains_key(action) {
            return Err(TetherError::duplicate_executor(
                action,
                self.bus.client_id(),
            ));
        }
        executors.insert(action.to_string(), executor);
        debug!(action, "executor registered");
        Ok(())
    }

    /// Local lookup, no network I/O; reserved names resolve to the built-in
    /// procedure executor
    pub fn get(&self, action: &str) -> Option<Arc<dyn ActionExecutor>> {
        if in_reserved_namespace(action) {
            return Some(self.procedure_executor.clone());
        }
        self.executors
            .lock()
            .expect("executor table poisoned")
            .get(action)
            .cloned()
    }

    pub fn contains(&self, action: &str) -> bool {
        self.executors
            .lock()
            .expect("executor table poisoned")
            .contains_key(action)
    }

    /// Unregister a local handler; reserved-namespace names are a no-op
    pub fn remove(&self, action: &str) -> Option<Arc<dyn ActionExecutor>> {
        if in_reserved_namespace(action) {
            return None;
        }
        self.executors
            .lock()
            .expect("executor table poisoned")
            .remove(action)
    }

    /// Snapshot of every handler that should see a cancellation: all local
    /// registrations plus the always-present procedure executor
    pub fn get_all(&self) -> Vec<Arc<dyn ActionExecutor>> {
        let mut all: Vec<_> = self
            .executors
            .lock()
            .expect("executor table poisoned")
            .values()
            .cloned()
            .collect();
        all.push(self.procedure_executor.clone());
        all
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.executors
            .lock()
            .expect("executor table poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

/// Answers broadcast existence queries about local registrations
struct ExistenceQueryHandler {
    map: Weak<ExecutorMap>,
}

#[async_trait]
impl BusHandler for ExistenceQueryHandler {
    async fn handle(&self, envelope: &Envelope) -> Option<MessagePayload> {
        let map = match self.map.upgrade() {
            Some(map) => map,
            None => return None,
        };
        // queries from this same participant are not answered
        if envelope.sender == map.bus.client_id() {
            return None;
        }
        match &envelope.payload {
            MessagePayload::ExecutorQuery { action } => Some(MessagePayload::ExecutorReply {
                action: action.clone(),
                claimed: map.contains(action),
            }),
            other => {
                warn!(kind = ?other.kind(), "unexpected payload on executor-query handler");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::invocation::ActionInvocation;
    use std::time::Duration;

    struct NoopExecutor;

    #[async_trait]
    impl ActionExecutor for NoopExecutor {
        async fn execute(&self, _invocation: Arc<ActionInvocation>) -> anyhow::Result<()> {
            Ok(())
        }

        async fn cancel(&self, _event: Arc<ActionInvocation>) {}
    }

    struct DownBus;

    #[async_trait]
    impl MessageBus for DownBus {
        fn client_id(&self) -> &str {
            "solo"
        }

        fn next_uid(&self) -> u64 {
            1
        }

        fn default_timeout(&self) -> Duration {
            Duration::from_millis(10)
        }

        async fn send(&self, _payload: MessagePayload) -> Result<()> {
            Err(TetherError::remote("send", "peer unreachable"))
        }

        async fn gather(
            &self,
            _payload: MessagePayload,
            _timeout: Duration,
        ) -> Result<Vec<Envelope>> {
            Err(TetherError::remote("gather", "peer unreachable"))
        }

        fn register_handler(&self, _kind: MessageKind, _handler: Arc<dyn BusHandler>) {}
    }

    #[tokio::test]
    async fn test_gather_failure_propagates_typed() {
        let map = ExecutorMap::new(Arc::new(DownBus), Arc::new(NoopExecutor));
        let err = map.put("demo/open", Arc::new(NoopExecutor)).await.unwrap_err();
        match err {
            TetherError::RemoteCommunication { operation, message, .. } => {
                assert_eq!(operation, "gather");
                assert_eq!(message, "peer unreachable");
            }
            other => panic!("expected remote-communication error, got {other}"),
        }
        // nothing committed on a failed round trip
        assert!(!map.contains("demo/open"));
    }

    #[test]
    fn test_reserved_namespace_spelling() {
        assert!(in_reserved_namespace("procedure/run"));
        assert!(in_reserved_namespace("procedure/nested/name"));
        assert!(!in_reserved_namespace("procedures/run"));
        assert!(!in_reserved_namespace("procedure"));
        assert!(!in_reserved_namespace("demo/open"));
    }
}
