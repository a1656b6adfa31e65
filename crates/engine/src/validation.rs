use std::fmt;

use modelstore_core::{ResourceKind, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path of the offending node, when the validator can name one.
    pub path: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: None,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: None,
            message: message.into(),
        }
    }

    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.path {
            Some(path) => write!(f, "{level} at {path}: {}", self.message),
            None => write!(f, "{level}: {}", self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn with(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// Warnings alone do not fail validation.
    pub fn passed(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

/// Whole-document check run on a working copy before it is published.
pub trait Validator: Send + Sync {
    fn validate(&self, kind: ResourceKind, document: &Value) -> ValidationReport;
}

impl<F> Validator for F
where
    F: Fn(ResourceKind, &Value) -> ValidationReport + Send + Sync,
{
    fn validate(&self, kind: ResourceKind, document: &Value) -> ValidationReport {
        self(kind, document)
    }
}

/// Installed when no validator is configured.
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _kind: ResourceKind, _document: &Value) -> ValidationReport {
        ValidationReport::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_fail() {
        let report = ValidationReport::with(vec![Diagnostic::warning("unconnected nozzle")]);
        assert!(report.passed());
        let report = ValidationReport::with(vec![
            Diagnostic::warning("unconnected nozzle"),
            Diagnostic::error("duplicate tag").at("equipment.P-101"),
        ]);
        assert!(!report.passed());
        assert_eq!(
            report.diagnostics[1].to_string(),
            "error at equipment.P-101: duplicate tag"
        );
    }
}
