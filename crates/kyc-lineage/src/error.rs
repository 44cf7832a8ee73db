//! Errors raised while compiling and running derivation rules.

use thiserror::Error;

/// A rule failed to compile. Aborts the whole compile call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("compile error for {code}: {reason}")]
pub struct CompileError {
    /// Derived attribute whose rule failed.
    pub code: String,
    /// Parser or binding failure.
    pub reason: String,
}

/// A single rule failed at evaluation time. Recorded in that rule's
/// result; the rest of the batch still runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The rule referenced an attribute absent from the environment.
    #[error("undefined attribute {0}")]
    UndefinedAttribute(String),

    /// An operator or function received values of the wrong type.
    #[error("type mismatch in {op}: {detail}")]
    TypeMismatch {
        /// Operator or function name.
        op: String,
        /// What was received.
        detail: String,
    },

    #[error("division by zero")]
    DivisionByZero,

    /// `max`/`min` over an empty list.
    #[error("{0} of empty list")]
    EmptyAggregate(String),
}
