use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use modelstore_core::{OperationError, ResourceId, ResourceKind, Value};
use modelstore_engine::{
    Diagnostic, EngineConfig, EngineError, HandlerOutput, OperationRegistry, TransactionManager,
    ValidationReport, builtin,
};

/// Install a test-friendly subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Names of every operation dispatched through the bench's instrumented
/// handlers, in dispatch order.
#[derive(Clone, Default)]
pub struct DispatchLog(Arc<Mutex<Vec<String>>>);

impl DispatchLog {
    pub fn record(&self, name: &str) {
        self.0.lock().push(name.to_string());
    }

    pub fn names(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// A manager over a fresh in-memory store with the built-in operations
/// registered for both kinds, plus instrumented model operations:
///
/// - `op_a` / `op_c`: set `a` / `c` to true
/// - `bad_op`: always fails with a domain error
///
/// The validator rejects any document whose `count` is negative.
pub struct TestBench {
    pub manager: TransactionManager,
    pub dispatched: DispatchLog,
}

impl TestBench {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        init_tracing();
        let dispatched = DispatchLog::default();
        let registry = build_registry(&dispatched)?;
        let store = Arc::new(config.build_store());
        let manager = TransactionManager::new(store, Arc::new(registry))
            .with_validator(Arc::new(non_negative_count))
            .with_config(config);
        Ok(Self {
            manager,
            dispatched,
        })
    }

    /// Create a model resource holding `{count: n}`.
    pub fn create_counter(&self, n: i64) -> Result<ResourceId, EngineError> {
        let (id, _) = self.manager.create(ResourceKind::Model, counter(n), None)?;
        Ok(id)
    }

    pub fn count(&self, resource_id: ResourceId) -> Result<Option<i64>, EngineError> {
        Ok(self
            .manager
            .get(resource_id)?
            .value
            .get("count")
            .and_then(Value::as_integer))
    }
}

/// `{count: n}`
pub fn counter(n: i64) -> Value {
    Value::from_pairs([("count", Value::Integer(n))])
}

/// Params for the built-in `increment` against the `count` field.
pub fn increment_by(by: i64) -> Value {
    Value::from_pairs([("path", Value::from("count")), ("by", Value::Integer(by))])
}

fn build_registry(dispatched: &DispatchLog) -> Result<OperationRegistry, EngineError> {
    let mut registry = OperationRegistry::new();
    builtin::register_builtins(&mut registry, ResourceKind::Model)?;
    builtin::register_builtins(&mut registry, ResourceKind::Layout)?;

    for (name, field) in [("op_a", "a"), ("op_c", "c")] {
        let log = dispatched.clone();
        registry.register(
            ResourceKind::Model,
            name,
            move |_: &Value, document: &Value| -> Result<HandlerOutput, OperationError> {
                log.record(name);
                let mut map = document.as_map().cloned().unwrap_or_default();
                map.insert(field.to_string(), Value::Boolean(true));
                Ok(HandlerOutput::new(Value::Map(map)))
            },
        )?;
    }

    let log = dispatched.clone();
    registry.register(
        ResourceKind::Model,
        "bad_op",
        move |_: &Value, _: &Value| -> Result<HandlerOutput, OperationError> {
            log.record("bad_op");
            Err(OperationError::domain("rejected", "bad_op always fails"))
        },
    )?;

    Ok(registry)
}

fn non_negative_count(_: ResourceKind, document: &Value) -> ValidationReport {
    match document.get("count").and_then(Value::as_integer) {
        Some(n) if n < 0 => ValidationReport::with(vec![
            Diagnostic::error(format!("count must not be negative, got {n}")).at("count"),
        ]),
        _ => ValidationReport::pass(),
    }
}
