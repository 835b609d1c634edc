// Core infrastructure modules
pub mod core;

// Runtime substrate
pub mod bridge; // lifecycle wiring for one bus participant
pub mod bus; // message-bus contract, kinds, in-process transport
pub mod chain; // async composition primitives
pub mod exec; // executor registry, invocations, cancellation
pub mod notify; // global notification + instrumentation lanes
pub mod types; // native/string/term marshaling

// Re-exports for convenience
pub use crate::core::errors::{Result, TetherError};

pub use bridge::Bridge;
pub use bus::{Envelope, LocalBus, LocalBusHub, MessageBus, MessageKind, MessagePayload};
pub use chain::{AsyncChain, Cancelable, CallbackHandler, ErrorCode, ErrorInfo, SyncCallbackAdapter};
pub use exec::{
    ActionExecutor, ActionInvocation, CancelReceiver, ExecutorMap, InvocationCache,
    InvocationStatus, StatusListener, StepCommand,
};
pub use notify::{GlobalActionListener, GlobalActionNotifier, Instrumentation, InstrumentationControl};
pub use types::{
    CustomFactory, Literal, StringForm, StructDef, StructValue, Term, TypeDef, TypeRegistry, Value,
};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingExecutor {
        executions: AtomicUsize,
        cancels: AtomicUsize,
    }

    impl CountingExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                executions: AtomicUsize::new(0),
                cancels: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ActionExecutor for CountingExecutor {
        async fn execute(&self, invocation: Arc<ActionInvocation>) -> anyhow::Result<()> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            invocation.set_status(InvocationStatus::Running).await;
            invocation.set_status(InvocationStatus::Succeeded).await;
            Ok(())
        }

        async fn cancel(&self, _event: Arc<ActionInvocation>) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_bridge_smoke() {
        let hub = LocalBusHub::with_timeout(Duration::from_millis(200));
        let bus: Arc<dyn MessageBus> = hub.connect("host");
        let procedure_executor = CountingExecutor::new();
        let bridge = Bridge::start(bus, procedure_executor.clone()).unwrap();

        // register a handler and dispatch through the map
        let opener = CountingExecutor::new();
        bridge.executors().put("demo/open", opener.clone()).await.unwrap();
        let handler = bridge.executors().get("demo/open").unwrap();

        let invocation = bridge.begin_invocation("demo/open", None, vec![Value::Int(1)]);
        invocation.await_start_notification().await;
        handler.execute(invocation.clone()).await.unwrap();
        assert_eq!(opener.executions.load(Ordering::SeqCst), 1);
        assert_eq!(invocation.status(), InvocationStatus::Succeeded);

        // reserved names route to the built-in procedure executor; stepped
        // execution falls back to plain execution for handlers without
        // stepping support
        let built_in = bridge.executors().get("procedure/run").unwrap();
        let proc_invocation = bridge.begin_invocation("procedure/run", None, vec![]);
        built_in.execute_stepped(proc_invocation.clone()).await.unwrap();
        built_in
            .continue_stepping(proc_invocation, StepCommand::Continue)
            .await
            .unwrap();
        assert_eq!(procedure_executor.executions.load(Ordering::SeqCst), 1);

        bridge
            .finish_invocation(&invocation, InvocationStatus::Succeeded)
            .await;
        assert!(bridge.invocations().get(invocation.uid()).is_none());

        bridge.shutdown().await;
    }
}
