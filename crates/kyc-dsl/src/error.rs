//! Codec errors and structured validation violations.

use std::fmt;

use thiserror::Error;

/// Errors raised while reading, binding, or validating snapshots.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The snapshot text is not well-formed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The text is well-formed but does not describe a case.
    #[error("bind error in {case}: {reason}")]
    Bind {
        /// Case name, or `<document>` before one is known.
        case: String,
        reason: String,
    },

    /// The case failed structural or schema checks.
    #[error("case {case} failed validation:\n{violations}")]
    Validation {
        case: String,
        violations: Violations,
    },

    /// No schema is registered under the requested reference.
    #[error("unknown schema '{0}'")]
    UnknownSchema(String),

    /// A registered schema could not be compiled.
    #[error("schema '{schema_ref}' could not be built: {reason}")]
    SchemaBuild { schema_ref: String, reason: String },
}

/// A single validation violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer into the case, empty for the root.
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.path, self.message)
        }
    }
}

/// Every violation found in one case.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}
