use std::fmt;

use serde::{Deserialize, Serialize};

use crate::oracle::OracleError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("property `{property}` requires parameter `{parameter}`")]
    MissingParameter { property: String, parameter: String },
    #[error("unknown property kind `{0}`")]
    UnknownProperty(String),
    #[error("unknown checker `{0}`")]
    UnknownChecker(String),
    #[error("template `{0}` is not instantiated")]
    UnknownTemplate(String),
    #[error("model does not compile: {}", summarize(.0))]
    Compile(Vec<Problem>),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("validation cancelled")]
    Cancelled,
    #[error("query `{0}` produced no trace")]
    MissingTrace(String),
    #[error("malformed validation spec: {0}")]
    Spec(#[from] serde_json::Error),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A structural problem found while compiling or validating a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub severity: Severity,
    /// Readable source location, e.g. `template P/edge 2/guard`.
    pub path: String,
    pub message: String,
}

impl Problem {
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Problem {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Problem {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}: {}", self.path, severity, self.message)
    }
}

fn summarize(problems: &[Problem]) -> String {
    match problems.iter().find(|p| p.is_error()).or(problems.first()) {
        None => "no diagnostics".to_string(),
        Some(first) if problems.len() == 1 => first.to_string(),
        Some(first) => format!("{} (and {} more)", first, problems.len() - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_compile_error_message() {
        let err = Error::Compile(vec![
            Problem::warning("template P", "unused variable"),
            Problem::error("template P/edge 0/guard", "unknown identifier `y`"),
        ]);
        assert_eq!(
            err.to_string(),
            "model does not compile: template P/edge 0/guard: error: unknown identifier `y` (and 1 more)"
        );
    }

    #[test]
    fn test_missing_parameter_message() {
        let err = Error::MissingParameter {
            property: "Condition".to_string(),
            parameter: "condition".to_string(),
        };
        assert_eq!(err.to_string(), "property `Condition` requires parameter `condition`");
    }
}
