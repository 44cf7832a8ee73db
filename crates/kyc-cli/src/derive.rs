//! # Derive Subcommand
//!
//! Evaluates a YAML rule set against a JSON object of attribute values.
//! Runs fully offline; no store is needed.
//!
//! ```bash
//! kycctl derive --attributes case.json --rules rules/aml.yaml --explain
//! ```
//!
//! Exit code 0 when every rule succeeds, 2 when any rule fails at runtime.
//! A rule that does not compile aborts the whole run with exit code 1.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use kyc_lineage::{EvaluationResult, Evaluator, RuleSet, Value};

/// Arguments for `kycctl derive`.
#[derive(Args, Debug)]
pub struct DeriveArgs {
    /// JSON object mapping attribute codes to values.
    #[arg(long)]
    pub attributes: PathBuf,

    /// YAML rule set with a `derivations` list.
    #[arg(long)]
    pub rules: PathBuf,

    /// Print the rule, inputs, and evaluation time for every result.
    #[arg(long)]
    pub explain: bool,

    /// Print results as JSON instead of text.
    #[arg(long, conflicts_with = "explain")]
    pub json: bool,
}

/// Execute `kycctl derive`.
pub fn run_derive(args: &DeriveArgs, out: &mut dyn Write) -> Result<u8> {
    let attributes = std::fs::read_to_string(&args.attributes)
        .with_context(|| format!("failed to read attributes {}", args.attributes.display()))?;
    let rules = std::fs::read_to_string(&args.rules)
        .with_context(|| format!("failed to read rules {}", args.rules.display()))?;

    let results = derive(&attributes, &rules)?;

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &results)?;
        writeln!(out)?;
    } else {
        for result in &results {
            if args.explain {
                writeln!(out, "{}\n", result.explain())?;
            } else {
                writeln!(out, "{}", summary(result))?;
            }
        }
    }

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        tracing::warn!(failed, total = results.len(), "some derivations failed");
        return Ok(2);
    }
    Ok(0)
}

/// Compile and evaluate `rules_yaml` against `attributes_json`, in file order.
pub fn derive(attributes_json: &str, rules_yaml: &str) -> Result<Vec<EvaluationResult>> {
    let attributes: BTreeMap<String, Value> =
        serde_json::from_str(attributes_json).context("attributes must be a JSON object")?;
    let rules = RuleSet::from_yaml(rules_yaml).context("invalid rule set")?;

    let mut evaluator = Evaluator::new(attributes);
    evaluator.compile_derivations(&rules.derivations)?;
    tracing::debug!(rules = rules.derivations.len(), "compiled rule set");
    Ok(evaluator.evaluate(&rules.derivations))
}

fn summary(result: &EvaluationResult) -> String {
    match (&result.value, &result.error) {
        (Some(value), _) if result.success => format!("{} = {value}", result.derived_code),
        (_, error) => format!(
            "FAILED {}: {}",
            result.derived_code,
            error.as_deref().unwrap_or("unknown error")
        ),
    }
}
