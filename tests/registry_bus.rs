// Bus-wide registry coordination, cancellation fan-out, and the
// platform-service round trips (serial numbers, evaluation, type storage).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tether::bus::{evaluate, next_serial, BusHandler};
use tether::types::{to_document, Literal, Term, TypeDef, TypeStorage};
use tether::{
    ActionExecutor, ActionInvocation, CancelReceiver, Envelope, ExecutorMap, InvocationCache,
    LocalBusHub, MessageBus, MessageKind, MessagePayload, TetherError,
};

struct CountingExecutor {
    cancels: AtomicUsize,
}

impl CountingExecutor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cancels: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ActionExecutor for CountingExecutor {
    async fn execute(&self, _invocation: Arc<ActionInvocation>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn cancel(&self, _event: Arc<ActionInvocation>) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

fn short_hub() -> Arc<LocalBusHub> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    LocalBusHub::with_timeout(Duration::from_millis(200))
}

#[tokio::test]
async fn test_staggered_registration_detects_duplicate() {
    let hub = short_hub();
    let bus_a: Arc<dyn MessageBus> = hub.connect("alpha");
    let bus_b: Arc<dyn MessageBus> = hub.connect("beta");

    let map_a = ExecutorMap::new(bus_a, CountingExecutor::new());
    map_a.register_with_bus();
    let map_b = ExecutorMap::new(bus_b, CountingExecutor::new());
    map_b.register_with_bus();

    map_a.put("demo/open", CountingExecutor::new()).await.unwrap();

    // second claimant arrives after the first has committed
    let err = map_b
        .put("demo/open", CountingExecutor::new())
        .await
        .unwrap_err();
    match err {
        TetherError::DuplicateExecutor { action, owner } => {
            assert_eq!(action, "demo/open");
            assert_eq!(owner, "alpha");
        }
        other => panic!("expected duplicate-executor error, got {other}"),
    }
    assert!(!map_b.contains("demo/open"));

    // an unclaimed name still registers fine on the same participant
    map_b.put("demo/close", CountingExecutor::new()).await.unwrap();
    assert!(map_b.contains("demo/close"));
}

#[tokio::test]
async fn test_local_duplicate_fails_without_gather() {
    let hub = short_hub();
    let bus: Arc<dyn MessageBus> = hub.connect("solo");
    let map = ExecutorMap::new(bus, CountingExecutor::new());
    map.register_with_bus();

    map.put("demo/open", CountingExecutor::new()).await.unwrap();
    let start = std::time::Instant::now();
    let err = map.put("demo/open", CountingExecutor::new()).await.unwrap_err();
    assert!(matches!(err, TetherError::DuplicateExecutor { .. }));
    // rejected from the local table, no gather window waited
    assert!(start.elapsed() < Duration::from_millis(150));
}

#[tokio::test]
async fn test_reserved_namespace_routing() {
    let hub = short_hub();
    let bus: Arc<dyn MessageBus> = hub.connect("solo");
    let procedure_executor = CountingExecutor::new();
    let map = ExecutorMap::new(bus, procedure_executor.clone());

    // registration under the reserved prefix is ignored, not an error
    map.put("procedure/run", CountingExecutor::new()).await.unwrap();
    assert!(!map.contains("procedure/run"));
    assert!(map.registered_names().is_empty());

    // lookup always resolves to the built-in executor
    let resolved = map.get("procedure/run").unwrap();
    let invocation = ActionInvocation::new(1, "procedure/run", None, vec![]);
    resolved.cancel(invocation).await;
    assert_eq!(procedure_executor.cancels.load(Ordering::SeqCst), 1);

    assert!(map.remove("procedure/run").is_none());
}

#[tokio::test]
async fn test_cancel_fans_out_to_all_handlers() {
    let hub = short_hub();
    let sender: Arc<dyn MessageBus> = hub.connect("sender");
    let target: Arc<dyn MessageBus> = hub.connect("target");

    let procedure_executor = CountingExecutor::new();
    let map = ExecutorMap::new(target.clone(), procedure_executor.clone());
    map.register_with_bus();
    let opener = CountingExecutor::new();
    map.put("demo/open", opener.clone()).await.unwrap();

    let cache = Arc::new(InvocationCache::new());
    let receiver = CancelReceiver::new(map, cache.clone());
    receiver.register_with_bus(&target);

    let invocation = ActionInvocation::new(77, "demo/open", None, vec![]);
    cache.insert(invocation);

    sender
        .send(MessagePayload::CancelRequest { uid: 77 })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // every local handler sees the cancel, the procedure executor included
    assert_eq!(opener.cancels.load(Ordering::SeqCst), 1);
    assert_eq!(procedure_executor.cancels.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancel_for_unknown_target_is_dropped() {
    let hub = short_hub();
    let sender: Arc<dyn MessageBus> = hub.connect("sender");
    let target: Arc<dyn MessageBus> = hub.connect("target");

    let procedure_executor = CountingExecutor::new();
    let map = ExecutorMap::new(target.clone(), procedure_executor.clone());
    let cache = Arc::new(InvocationCache::new());
    let receiver =
        CancelReceiver::with_lookup_timeout(map, cache, Duration::from_millis(50));
    receiver.register_with_bus(&target);

    sender
        .send(MessagePayload::CancelRequest { uid: 999 })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(procedure_executor.cancels.load(Ordering::SeqCst), 0);
}

struct SerialProvider {
    counter: AtomicUsize,
}

#[async_trait]
impl BusHandler for SerialProvider {
    async fn handle(&self, _envelope: &Envelope) -> Option<MessagePayload> {
        let serial = self.counter.fetch_add(1, Ordering::SeqCst) as u64;
        Some(MessagePayload::SerialReply { serial })
    }
}

#[tokio::test]
async fn test_serial_numbers_from_provider() {
    let hub = short_hub();
    let asker: Arc<dyn MessageBus> = hub.connect("asker");
    let provider = hub.connect_anonymous();
    provider.register_handler(
        MessageKind::SerialRequest,
        Arc::new(SerialProvider {
            counter: AtomicUsize::new(10),
        }),
    );

    assert_eq!(next_serial(&asker).await.unwrap(), 10);
    assert_eq!(next_serial(&asker).await.unwrap(), 11);
}

#[tokio::test]
async fn test_serial_without_provider_is_remote_error() {
    let hub = short_hub();
    let asker: Arc<dyn MessageBus> = hub.connect("asker");
    let err = next_serial(&asker).await.unwrap_err();
    assert!(matches!(err, TetherError::RemoteCommunication { .. }));
}

struct Evaluator;

#[async_trait]
impl BusHandler for Evaluator {
    async fn handle(&self, envelope: &Envelope) -> Option<MessagePayload> {
        let MessagePayload::EvalRequest { expr, bindings } = &envelope.payload else {
            return None;
        };
        // resolves a lone variable against the binding set
        match expr {
            Term::Variable(name) => match bindings.get(name) {
                Some(bound) => Some(MessagePayload::EvalResult {
                    value: Some(bound.clone()),
                    error: None,
                }),
                None => Some(MessagePayload::EvalResult {
                    value: None,
                    error: Some(format!("unbound variable '{name}'")),
                }),
            },
            _ => Some(MessagePayload::EvalResult {
                value: None,
                error: Some("unsupported expression".to_string()),
            }),
        }
    }
}

#[tokio::test]
async fn test_evaluate_against_bindings() {
    let hub = short_hub();
    let asker: Arc<dyn MessageBus> = hub.connect("asker");
    let peer = hub.connect("evaluator");
    peer.register_handler(MessageKind::EvalRequest, Arc::new(Evaluator));

    let mut bindings = HashMap::new();
    bindings.insert("X".to_string(), Term::Literal(Literal::Int(5)));

    let value = evaluate(&asker, Term::Variable("X".to_string()), bindings.clone())
        .await
        .unwrap();
    assert!(matches!(value, Term::Literal(Literal::Int(5))));

    let err = evaluate(&asker, Term::Variable("Y".to_string()), bindings)
        .await
        .unwrap_err();
    match err {
        TetherError::RemoteCommunication { message, .. } => {
            assert!(message.contains("unbound variable 'Y'"));
        }
        other => panic!("expected remote-communication error, got {other}"),
    }
}

#[tokio::test]
async fn test_evaluate_without_peer_is_remote_error() {
    let hub = short_hub();
    let asker: Arc<dyn MessageBus> = hub.connect("asker");
    let err = evaluate(&asker, Term::Variable("X".to_string()), HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TetherError::RemoteCommunication { .. }));
}

struct StorageProvider {
    documents: Mutex<HashMap<String, JsonValue>>,
}

#[async_trait]
impl BusHandler for StorageProvider {
    async fn handle(&self, envelope: &Envelope) -> Option<MessagePayload> {
        let documents = self.documents.lock().unwrap();
        match &envelope.payload {
            MessagePayload::TypeQuery { name } => Some(MessagePayload::TypeResult {
                name: name.clone(),
                document: documents.get(name).cloned(),
            }),
            MessagePayload::TypeListQuery => Some(MessagePayload::TypeListResult {
                names: documents.keys().cloned().collect(),
            }),
            _ => None,
        }
    }
}

#[tokio::test]
async fn test_remote_type_storage_roundtrip() {
    let hub = short_hub();
    let client: Arc<dyn MessageBus> = hub.connect("client");
    let provider = hub.connect("storage");

    let int_type = Arc::new(TypeDef::primitive("core/integer", "integer"));
    let ints = TypeDef::list("demo/ints", int_type);
    let mut documents = HashMap::new();
    documents.insert("demo/ints".to_string(), to_document(&ints));
    let handler = Arc::new(StorageProvider {
        documents: Mutex::new(documents),
    });
    provider.register_handler(MessageKind::TypeQuery, handler.clone());
    provider.register_handler(MessageKind::TypeListQuery, handler);

    let bridge = tether::Bridge::start(client, CountingExecutor::new()).unwrap();
    let storage = bridge.storage();

    let names = storage.list_types().await.unwrap();
    assert_eq!(names, vec!["demo/ints".to_string()]);

    let loaded = storage.load_type("demo/ints").await.unwrap();
    assert_eq!(loaded.name(), "demo/ints");
    assert_eq!(loaded.element().unwrap().name(), "core/integer");

    // loaded declarations are interned, later loads resolve locally
    assert!(bridge.types().contains("demo/ints"));
    let again = storage.load_type("demo/ints").await.unwrap();
    assert!(Arc::ptr_eq(&loaded, &again));

    let err = storage.load_type("demo/unknown").await.unwrap_err();
    assert!(matches!(err, TetherError::MissingAction { .. }));

    bridge.shutdown().await;
}
