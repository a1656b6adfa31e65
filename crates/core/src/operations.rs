use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::ResourceKind;
use crate::value::Value;

/// A named, parameterized mutation submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCall {
    pub name: String,
    pub params: Value,
}

impl OperationCall {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// An operation that takes no parameters.
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, Value::map())
    }
}

/// Structured failure reported by an operation handler.
///
/// `Invalid` means the parameters themselves are wrong; `Domain` means the
/// parameters were well-formed but cannot be applied to the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum OperationError {
    #[error("invalid input ({code}): {message}")]
    Invalid { code: String, message: String },

    #[error("domain error ({code}): {message}")]
    Domain { code: String, message: String },

    #[error("unknown operation '{name}' for {kind} resources")]
    UnknownOperation { kind: ResourceKind, name: String },
}

impl OperationError {
    pub fn invalid(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn domain(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Domain {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Invalid { code, .. } | Self::Domain { code, .. } => code,
            Self::UnknownOperation { .. } => "unknown_operation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationOutcome {
    /// The handler succeeded. `output` carries any values it returned
    /// (`Value::Null` when it returned nothing).
    Applied { output: Value },
    Failed(OperationError),
}

/// One entry of a transaction's append-only operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Position in the transaction log, starting at 0.
    pub seq: u64,
    pub name: String,
    pub params: Value,
    pub outcome: OperationOutcome,
}

impl OperationRecord {
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, OperationOutcome::Applied { .. })
    }

    pub fn error(&self) -> Option<&OperationError> {
        match &self.outcome {
            OperationOutcome::Failed(err) => Some(err),
            OperationOutcome::Applied { .. } => None,
        }
    }

    pub fn call(&self) -> OperationCall {
        OperationCall::new(self.name.clone(), self.params.clone())
    }
}
