use std::collections::HashMap;
use std::sync::Arc;

use modelstore_core::{OperationError, OperationRecord, ResourceKind, Value};
use tracing::trace;

use crate::error::EngineError;

/// What a handler produces: the updated document plus any values it wants
/// reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutput {
    pub document: Value,
    pub output: Value,
}

impl HandlerOutput {
    pub fn new(document: Value) -> Self {
        Self {
            document,
            output: Value::Null,
        }
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = output;
        self
    }
}

/// A named mutation over a document.
///
/// Handlers must be deterministic: the same `(params, document)` always
/// yields the same document or the same class of error. They receive the
/// working copy by reference and return a new value; they never perform I/O.
pub trait OperationHandler: Send + Sync {
    fn apply(&self, params: &Value, document: &Value) -> Result<HandlerOutput, OperationError>;
}

impl<F> OperationHandler for F
where
    F: Fn(&Value, &Value) -> Result<HandlerOutput, OperationError> + Send + Sync,
{
    fn apply(&self, params: &Value, document: &Value) -> Result<HandlerOutput, OperationError> {
        self(params, document)
    }
}

/// Lookup table from `(kind, name)` to handler. Populated once at startup,
/// then shared read-only behind an `Arc`.
#[derive(Default)]
pub struct OperationRegistry {
    handlers: HashMap<(ResourceKind, String), Arc<dyn OperationHandler>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        kind: ResourceKind,
        name: &str,
        handler: impl OperationHandler + 'static,
    ) -> Result<(), EngineError> {
        self.register_shared(kind, name, Arc::new(handler))
    }

    pub fn register_shared(
        &mut self,
        kind: ResourceKind,
        name: &str,
        handler: Arc<dyn OperationHandler>,
    ) -> Result<(), EngineError> {
        let key = (kind, name.to_string());
        if self.handlers.contains_key(&key) {
            return Err(EngineError::DuplicateOperation {
                kind,
                name: name.to_string(),
            });
        }
        self.handlers.insert(key, handler);
        Ok(())
    }

    pub fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        self.handlers.contains_key(&(kind, name.to_string()))
    }

    /// Registered operation names for a kind, sorted.
    pub fn names(&self, kind: ResourceKind) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .handlers
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn dispatch(
        &self,
        kind: ResourceKind,
        name: &str,
        params: &Value,
        document: &Value,
    ) -> Result<HandlerOutput, OperationError> {
        let handler = self
            .handlers
            .get(&(kind, name.to_string()))
            .ok_or_else(|| OperationError::UnknownOperation {
                kind,
                name: name.to_string(),
            })?;
        trace!(%kind, name, "dispatching operation");
        handler.apply(params, document)
    }

    /// Re-dispatch every applied record of a log against `baseline`.
    /// Failed records are skipped, since they never changed the working copy.
    pub fn replay(
        &self,
        kind: ResourceKind,
        baseline: &Value,
        log: &[OperationRecord],
    ) -> Result<Value, OperationError> {
        let mut document = baseline.clone();
        for record in log.iter().filter(|r| r.is_applied()) {
            document = self
                .dispatch(kind, &record.name, &record.params, &document)?
                .document;
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(_: &Value, document: &Value) -> Result<HandlerOutput, OperationError> {
        let mut map = document.as_map().cloned().unwrap_or_default();
        map.insert("touched".into(), Value::Boolean(true));
        Ok(HandlerOutput::new(Value::Map(map)))
    }

    #[test]
    fn unknown_name_is_reported() {
        let registry = OperationRegistry::new();
        let err = registry
            .dispatch(ResourceKind::Model, "add_pump", &Value::Null, &Value::map())
            .unwrap_err();
        assert_eq!(
            err,
            OperationError::UnknownOperation {
                kind: ResourceKind::Model,
                name: "add_pump".into(),
            }
        );
    }

    #[test]
    fn vocabularies_are_per_kind() {
        let mut registry = OperationRegistry::new();
        registry.register(ResourceKind::Layout, "touch", touch).unwrap();

        assert!(registry.contains(ResourceKind::Layout, "touch"));
        assert!(!registry.contains(ResourceKind::Model, "touch"));
        assert!(
            registry
                .dispatch(ResourceKind::Model, "touch", &Value::Null, &Value::map())
                .is_err()
        );
        let out = registry
            .dispatch(ResourceKind::Layout, "touch", &Value::Null, &Value::map())
            .unwrap();
        assert_eq!(out.document.get("touched"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = OperationRegistry::new();
        registry.register(ResourceKind::Model, "touch", touch).unwrap();
        let err = registry.register(ResourceKind::Model, "touch", touch).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateOperation { .. }));
        assert_eq!(registry.names(ResourceKind::Model), vec!["touch"]);
    }
}
