use std::sync::Arc;

use tracing::info;

use crate::bus::transport::MessageBus;
use crate::core::errors::Result;
use crate::exec::cancel::CancelReceiver;
use crate::exec::executor::ActionExecutor;
use crate::exec::invocation::{ActionInvocation, InvocationCache, InvocationStatus};
use crate::exec::registry::ExecutorMap;
use crate::notify::global::GlobalActionNotifier;
use crate::notify::instrumentation::InstrumentationControl;
use crate::types::custom::CustomFactory;
use crate::types::registry::TypeRegistry;
use crate::types::storage::RemoteTypeStorage;
use crate::types::value::Value;

/// Runtime lifecycle object wiring the whole client side together.
///
/// One bridge per bus participant; start it once, hold it for the life of
/// the host session, shut it down on the way out. Every component takes the
/// pieces it depends on explicitly, so there is no process-wide state.
pub struct Bridge {
    bus: Arc<dyn MessageBus>,
    types: Arc<TypeRegistry>,
    conversions: Arc<CustomFactory>,
    invocations: Arc<InvocationCache>,
    executors: Arc<ExecutorMap>,
    cancel: Arc<CancelReceiver>,
    notifier: Arc<GlobalActionNotifier>,
    instrumentation: Arc<InstrumentationControl>,
    storage: Arc<RemoteTypeStorage>,
}

impl Bridge {
    /// Wire up and subscribe all inbound handlers.
    ///
    /// `procedure_executor` is the fixed handler behind the reserved
    /// namespace; it also receives every cancellation fan-out.
    pub fn start(
        bus: Arc<dyn MessageBus>,
        procedure_executor: Arc<dyn ActionExecutor>,
    ) -> Result<Arc<Self>> {
        let types = Arc::new(TypeRegistry::new());
        let conversions = Arc::new(CustomFactory::with_builtins());
        let invocations = Arc::new(InvocationCache::new());

        let executors = ExecutorMap::new(bus.clone(), procedure_executor);
        executors.register_with_bus();

        let cancel = CancelReceiver::new(executors.clone(), invocations.clone());
        cancel.register_with_bus(&bus);

        let notifier = GlobalActionNotifier::new();

        let instrumentation = InstrumentationControl::new(bus.clone());
        instrumentation.register_with_bus();

        let storage = Arc::new(RemoteTypeStorage::new(
            bus.clone(),
            types.clone(),
            conversions.clone(),
        ));

        info!(client = %bus.client_id(), "bridge started");
        Ok(Arc::new(Self {
            bus,
            types,
            conversions,
            invocations,
            executors,
            cancel,
            notifier,
            instrumentation,
            storage,
        }))
    }

    pub fn bus(&self) -> &Arc<dyn MessageBus> {
        &self.bus
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn conversions(&self) -> &Arc<CustomFactory> {
        &self.conversions
    }

    pub fn invocations(&self) -> &Arc<InvocationCache> {
        &self.invocations
    }

    pub fn executors(&self) -> &Arc<ExecutorMap> {
        &self.executors
    }

    pub fn cancel_receiver(&self) -> &Arc<CancelReceiver> {
        &self.cancel
    }

    pub fn notifier(&self) -> &Arc<GlobalActionNotifier> {
        &self.notifier
    }

    pub fn instrumentation(&self) -> &Arc<InstrumentationControl> {
        &self.instrumentation
    }

    pub fn storage(&self) -> &Arc<RemoteTypeStorage> {
        &self.storage
    }

    /// Create a new invocation, cache it, and announce it to the global
    /// monitors
    pub fn begin_invocation(
        &self,
        action: impl Into<String>,
        parent: Option<u64>,
        inputs: Vec<Value>,
    ) -> Arc<ActionInvocation> {
        let invocation = ActionInvocation::new(self.bus.next_uid(), action, parent, inputs);
        self.invocations.insert(invocation.clone());
        self.notifier.new_invocation(invocation.clone());
        invocation
    }

    /// Drive an invocation to a terminal status and drop it from the cache
    pub async fn finish_invocation(&self, invocation: &Arc<ActionInvocation>, status: InvocationStatus) {
        invocation.set_status(status).await;
        self.invocations.remove(invocation.uid());
    }

    /// Tear down the worker lanes; the bridge is unusable afterwards
    pub async fn shutdown(&self) {
        self.notifier.shutdown().await;
        self.instrumentation.shutdown().await;
        info!(client = %self.bus.client_id(), "bridge shut down");
    }
}
