//! # Derivation Evaluator
//!
//! Compiles derived-attribute rules against an attribute environment and
//! evaluates them in caller order, writing each successful result back
//! into the environment so later rules in the same batch can read it.
//!
//! ## Ordering
//!
//! There is no dependency resolution. A rule that reads another derived
//! attribute must come after it in the list passed to
//! [`Evaluator::evaluate()`], or it sees the attribute as undefined.
//!
//! ## Failure Isolation
//!
//! - [`Evaluator::compile_derivations()`] is all-or-nothing: the first
//!   compile failure aborts the call and none of its specs are retained.
//! - [`Evaluator::evaluate()`] records a runtime failure in that rule's
//!   result, leaves the environment untouched, and moves on.
//!
//! ## Concurrency
//!
//! Both operations mutate the environment, so they take `&mut self`. Share
//! an evaluator across tasks only behind a lock.

use std::collections::{BTreeMap, BTreeSet};

use kyc_core::Timestamp;

use crate::error::CompileError;
use crate::program::{Environment, Program};
use crate::spec::{DerivedAttributeSpec, EvaluationResult};
use crate::value::Value;

/// Error recorded for a spec evaluated without a successful compile.
pub const NOT_COMPILED: &str = "not compiled";

/// Cascading evaluator over one mutable environment.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    env: Environment,
    programs: BTreeMap<String, Program>,
    history: Option<Vec<EvaluationResult>>,
}

impl Evaluator {
    /// Start from a set of public attribute values.
    pub fn new(initial: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            env: initial.into_iter().collect(),
            programs: BTreeMap::new(),
            history: None,
        }
    }

    /// Keep every result returned by [`Evaluator::evaluate()`] until
    /// [`Evaluator::reset()`] or [`Evaluator::clear_history()`].
    pub fn with_history(mut self) -> Self {
        self.history = Some(Vec::new());
        self
    }

    /// Compile `specs` in order.
    ///
    /// A rule may reference attributes in the environment, codes compiled
    /// by earlier calls, and codes of specs earlier in this call.
    pub fn compile_derivations(&mut self, specs: &[DerivedAttributeSpec]) -> Result<(), CompileError> {
        let mut staged: BTreeMap<String, Program> = BTreeMap::new();
        for spec in specs {
            let known = |name: &str| {
                self.env.contains_key(name)
                    || self.programs.contains_key(name)
                    || staged.contains_key(name)
            };
            let program =
                Program::compile(&spec.rule_expression, known).map_err(|reason| CompileError {
                    code: spec.code.clone(),
                    reason,
                })?;
            tracing::debug!(code = %spec.code, "compiled derivation");
            staged.insert(spec.code.clone(), program);
        }
        self.programs.extend(staged);
        Ok(())
    }

    /// Whether a program exists for `code`.
    pub fn is_compiled(&self, code: &str) -> bool {
        self.programs.contains_key(code)
    }

    /// Evaluate `specs` in order, cascading successes into the environment.
    pub fn evaluate(&mut self, specs: &[DerivedAttributeSpec]) -> Vec<EvaluationResult> {
        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            let input_snapshot = spec
                .source_attribute_codes
                .iter()
                .map(|code| (code.clone(), self.env.get(code).cloned().unwrap_or(Value::Nil)))
                .collect();
            let mut result = EvaluationResult {
                derived_code: spec.code.clone(),
                value: None,
                success: false,
                error: None,
                timestamp: Timestamp::now(),
                rule_text: spec.rule_expression.clone(),
                input_snapshot,
            };

            match self.programs.get(&spec.code).map(|p| p.run(&self.env)) {
                None => result.error = Some(NOT_COMPILED.to_string()),
                Some(Ok(value)) => {
                    self.env.insert(spec.code.clone(), value.clone());
                    result.value = Some(value);
                    result.success = true;
                }
                Some(Err(e)) => {
                    tracing::debug!(code = %spec.code, error = %e, "derivation failed");
                    result.error = Some(e.to_string());
                }
            }
            results.push(result);
        }
        if let Some(history) = self.history.as_mut() {
            history.extend(results.iter().cloned());
        }
        results
    }

    /// Current value of an original or derived attribute.
    pub fn get_value(&self, code: &str) -> Option<&Value> {
        self.env.get(code)
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Retained results; empty unless built [`Evaluator::with_history()`].
    pub fn history(&self) -> &[EvaluationResult] {
        self.history.as_deref().unwrap_or(&[])
    }

    pub fn clear_history(&mut self) {
        if let Some(history) = self.history.as_mut() {
            history.clear();
        }
    }

    /// Clear history and remove every compiled code from the environment.
    /// Compiled programs stay available for the next evaluation.
    pub fn reset(&mut self) {
        self.clear_history();
        let compiled: BTreeSet<&String> = self.programs.keys().collect();
        self.env.retain(|code, _| !compiled.contains(code));
    }
}
