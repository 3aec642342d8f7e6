use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Fatal failures of a Boolean operation. No result is produced.
#[derive(Debug, Error)]
pub enum BooleanError {
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    #[error("operation cancelled")]
    OperationCancelled,
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("scheduler error: {0}")]
    Scheduler(String),
    #[error("ambiguous interference (entity {entity:?}): {message}")]
    AmbiguousInterference { entity: Option<usize>, message: String },
    #[error("open wire while rebuilding face (entity {entity:?}): {message}")]
    OpenWire { entity: Option<usize>, message: String },
    #[error("unsupported face split (entity {entity:?}): {message}")]
    UnsupportedFaceSplit { entity: Option<usize>, message: String },
    #[error("unresolved classification (entity {entity:?}): {message}")]
    UnresolvedClassification { entity: Option<usize>, message: String },
    #[error("inconsistent shell: {message}")]
    InconsistentShell { entity: Option<usize>, message: String },
}

impl BooleanError {
    /// Hard error matching a recoverable diagnostic, used in strict mode.
    pub fn from_diagnostic(d: &Diagnostic) -> Self {
        let (entity, message) = (d.entity, d.message.clone());
        match d.code {
            DiagnosticCode::AmbiguousInterference => BooleanError::AmbiguousInterference { entity, message },
            DiagnosticCode::OpenWire => BooleanError::OpenWire { entity, message },
            DiagnosticCode::UnsupportedFaceSplit => BooleanError::UnsupportedFaceSplit { entity, message },
            DiagnosticCode::UnresolvedClassification => {
                BooleanError::UnresolvedClassification { entity, message }
            }
            DiagnosticCode::InconsistentShell => BooleanError::InconsistentShell { entity, message },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticCode {
    AmbiguousInterference,
    OpenWire,
    UnsupportedFaceSplit,
    UnresolvedClassification,
    InconsistentShell,
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticCode::AmbiguousInterference => "ambiguous-interference",
            DiagnosticCode::OpenWire => "open-wire",
            DiagnosticCode::UnsupportedFaceSplit => "unsupported-face-split",
            DiagnosticCode::UnresolvedClassification => "unresolved-classification",
            DiagnosticCode::InconsistentShell => "inconsistent-shell",
        };
        f.write_str(name)
    }
}

/// A recoverable problem, keyed by registry entity id when one applies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub entity: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, entity: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            code,
            entity,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity {
            Some(id) => write!(f, "[{}] entity {}: {}", self.code, id, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

/// Warnings gathered over one operation, in the order they were raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub warnings: Vec<Diagnostic>,
}

impl DiagnosticReport {
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.warnings.iter().filter(|d| d.code == code).count()
    }

    pub fn has(&self, code: DiagnosticCode) -> bool {
        self.count(code) > 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_keeps_entity() {
        let d = Diagnostic::new(DiagnosticCode::OpenWire, Some(7), "dangling edge");
        match BooleanError::from_diagnostic(&d) {
            BooleanError::OpenWire { entity, message } => {
                assert_eq!(entity, Some(7));
                assert_eq!(message, "dangling edge");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_report_counts_and_json() {
        let report = DiagnosticReport {
            warnings: vec![
                Diagnostic::new(DiagnosticCode::AmbiguousInterference, Some(1), "no convergence"),
                Diagnostic::new(DiagnosticCode::AmbiguousInterference, None, "degenerate"),
            ],
        };
        assert_eq!(report.count(DiagnosticCode::AmbiguousInterference), 2);
        assert!(!report.has(DiagnosticCode::OpenWire));
        let json = report.to_json().unwrap();
        assert!(json.contains("AmbiguousInterference"));
        assert_eq!(report.warnings[0].to_string(), "[ambiguous-interference] entity 1: no convergence");
    }
}
