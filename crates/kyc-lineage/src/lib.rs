//! # kyc-lineage — Derived Attributes
//!
//! Computes risk-relevant facts (jurisdiction flags, ownership
//! concentration, PEP exposure) from a case's public attributes.
//!
//! - **Rule language** (`parser.rs`, `ast.rs`, `program.rs`): literals,
//!   comparison, `&&` / `||` / `!`, list membership with `in`, arithmetic,
//!   and aggregate functions over list-valued attributes.
//!
//! - **Evaluator** (`evaluator.rs`): compiles specs against the shape of
//!   the environment and evaluates them in caller order, cascading each
//!   derived value into the environment for the rules after it.
//!
//! ```text
//! attributes ──▶ compile_derivations(specs) ──▶ evaluate(specs) ──▶ Vec<EvaluationResult>
//!                                                   │
//!                                                   └──▶ env[code] = value (on success)
//! ```

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod parser;
pub mod program;
pub mod spec;
pub mod value;

pub use error::{CompileError, EvalError};
pub use evaluator::{Evaluator, NOT_COMPILED};
pub use parser::parse_expression;
pub use program::{Environment, Program};
pub use spec::{DerivedAttributeSpec, EvaluationResult, RuleSet};
pub use value::Value;
