//! Derived-attribute definitions and evaluation results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kyc_core::Timestamp;

use crate::value::Value;

/// A named rule deriving one attribute from others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAttributeSpec {
    /// Name the derived value is stored under.
    pub code: String,
    /// Attributes captured in the result's input snapshot.
    #[serde(default)]
    pub source_attribute_codes: Vec<String>,
    pub rule_expression: String,
    #[serde(default)]
    pub jurisdiction: String,
    #[serde(default)]
    pub regulation_code: String,
}

/// A YAML rule file:
///
/// ```yaml
/// derivations:
///   - code: HIGH_RISK_JURISDICTION_FLAG
///     source_attribute_codes: [TAX_RESIDENCY_COUNTRY]
///     rule_expression: 'TAX_RESIDENCY_COUNTRY in ["IR", "KP"]'
///     jurisdiction: GLOBAL
///     regulation_code: AMLD5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub derivations: Vec<DerivedAttributeSpec>,
}

impl RuleSet {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

/// Outcome of evaluating one spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub derived_code: String,
    /// Present only on success.
    pub value: Option<Value>,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: Timestamp,
    pub rule_text: String,
    /// Source attribute values as read at evaluation time. Absent sources
    /// are recorded as `nil`.
    pub input_snapshot: BTreeMap<String, Value>,
}

impl EvaluationResult {
    /// Human-readable explanation of the result.
    pub fn explain(&self) -> String {
        if !self.success {
            return format!(
                "FAILED {}: {}",
                self.derived_code,
                self.error.as_deref().unwrap_or("unknown error")
            );
        }
        let mut out = format!(
            "{} = {}\n",
            self.derived_code,
            self.value.as_ref().unwrap_or(&Value::Nil)
        );
        out.push_str(&format!("   Rule: {}\n", self.rule_text));
        out.push_str("   Inputs:\n");
        for (code, value) in &self.input_snapshot {
            out.push_str(&format!("     - {code} = {value}\n"));
        }
        out.push_str(&format!("   Evaluated at: {}", self.timestamp));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_set_from_yaml() {
        let yaml = r#"
derivations:
  - code: PEP_EXPOSURE_FLAG
    source_attribute_codes: [PEP_STATUS]
    rule_expression: PEP_STATUS == true
    jurisdiction: GLOBAL
    regulation_code: AMLD5
  - code: UBO_CONCENTRATION_SCORE
    rule_expression: max(UBO_PERCENT)
"#;
        let set = RuleSet::from_yaml(yaml).unwrap();
        assert_eq!(set.derivations.len(), 2);
        assert_eq!(set.derivations[0].source_attribute_codes, vec!["PEP_STATUS"]);
        assert!(set.derivations[1].jurisdiction.is_empty());
    }

    #[test]
    fn explain_success_lists_inputs_and_time() {
        let result = EvaluationResult {
            derived_code: "UBO_CONCENTRATION_SCORE".into(),
            value: Some(Value::Number(45.0)),
            success: true,
            error: None,
            timestamp: Timestamp::parse("2025-01-15T12:00:00Z").unwrap(),
            rule_text: "max(UBO_PERCENT)".into(),
            input_snapshot: BTreeMap::from([(
                "UBO_PERCENT".to_string(),
                Value::from(vec![35.0, 45.0, 20.0]),
            )]),
        };
        assert_eq!(
            result.explain(),
            "UBO_CONCENTRATION_SCORE = 45\n   Rule: max(UBO_PERCENT)\n   Inputs:\n     - UBO_PERCENT = [35, 45, 20]\n   Evaluated at: 2025-01-15T12:00:00Z"
        );
    }

    #[test]
    fn explain_failure() {
        let result = EvaluationResult {
            derived_code: "B".into(),
            value: None,
            success: false,
            error: Some("not compiled".into()),
            timestamp: Timestamp::now(),
            rule_text: "A == true".into(),
            input_snapshot: BTreeMap::new(),
        };
        assert_eq!(result.explain(), "FAILED B: not compiled");
    }
}
