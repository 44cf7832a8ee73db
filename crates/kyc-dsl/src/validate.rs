//! # Case Validation
//!
//! Two layers, run in order:
//!
//! 1. **Structural rules** (always): nature, purpose, and client business
//!    unit present; a token present; every function tag from the known
//!    vocabulary; token status one of `pending|approved|declined|review`.
//!
//! 2. **JSON Schema** (when a schema reference is given): the case's JSON
//!    form is checked with the `jsonschema` crate (Draft 2020-12) against a
//!    registered schema. `kyc-case.schema.json` is built in.
//!
//! Validators are compiled once when the registry is built.

use std::collections::HashMap;

use jsonschema::Validator;
use serde_json::Value;

use kyc_core::{tags, Case};

use crate::error::{CodecError, Violation, Violations};

/// Name of the built-in case schema.
pub const KYC_CASE_SCHEMA: &str = "kyc-case.schema.json";

const KYC_CASE_SCHEMA_SOURCE: &str = include_str!("../schemas/kyc-case.schema.json");

const TOKEN_STATES: [&str; 4] = ["pending", "approved", "declined", "review"];

/// Structural checks that need no schema.
pub fn structural_violations(case: &Case) -> Vec<Violation> {
    let mut out = Vec::new();
    if case.nature.is_empty() || case.purpose.is_empty() {
        out.push(Violation::new("/nature", "missing nature or purpose section"));
    }
    if case.client_business_unit.is_empty() {
        out.push(Violation::new(
            "/client_business_unit",
            "missing client-business-unit section",
        ));
    }
    match &case.token {
        None => out.push(Violation::new("/token", "missing kyc-token section")),
        Some(t) if !TOKEN_STATES.contains(&t.status.to_lowercase().as_str()) => out.push(
            Violation::new("/token/status", format!("invalid token state '{}'", t.status)),
        ),
        Some(_) => {}
    }
    for (i, f) in case.functions.iter().enumerate() {
        if !tags::is_known(&f.action) {
            out.push(Violation::new(
                format!("/functions/{i}/action"),
                format!("unknown function '{}'", f.action),
            ));
        }
    }
    out
}

/// Compiled JSON Schemas keyed by reference.
pub struct SchemaRegistry {
    validators: HashMap<String, Validator>,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaRegistry {
    /// A registry holding the built-in case schema.
    pub fn builtin() -> Result<Self, CodecError> {
        let schema: Value =
            serde_json::from_str(KYC_CASE_SCHEMA_SOURCE).map_err(|e| CodecError::SchemaBuild {
                schema_ref: KYC_CASE_SCHEMA.to_string(),
                reason: e.to_string(),
            })?;
        let mut registry = Self {
            validators: HashMap::new(),
        };
        registry.register(KYC_CASE_SCHEMA, &schema)?;
        Ok(registry)
    }

    /// Compile and register `schema` under `schema_ref`.
    pub fn register(&mut self, schema_ref: &str, schema: &Value) -> Result<(), CodecError> {
        let mut opts = jsonschema::options();
        opts.with_draft(jsonschema::Draft::Draft202012);
        let validator = opts.build(schema).map_err(|e| CodecError::SchemaBuild {
            schema_ref: schema_ref.to_string(),
            reason: e.to_string(),
        })?;
        self.validators.insert(schema_ref.to_string(), validator);
        Ok(())
    }

    pub fn contains(&self, schema_ref: &str) -> bool {
        self.validators.contains_key(schema_ref)
    }

    /// Schema violations of `instance` against `schema_ref`.
    pub fn violations(&self, schema_ref: &str, instance: &Value) -> Result<Vec<Violation>, CodecError> {
        let validator = self
            .validators
            .get(schema_ref)
            .ok_or_else(|| CodecError::UnknownSchema(schema_ref.to_string()))?;
        Ok(validator
            .iter_errors(instance)
            .map(|e| Violation {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect())
    }
}

/// Run structural rules, then `schema_ref` if given.
pub fn validate_case(
    registry: &SchemaRegistry,
    case: &Case,
    schema_ref: Option<&str>,
) -> Result<(), CodecError> {
    let mut violations = structural_violations(case);
    if let Some(schema_ref) = schema_ref {
        let instance = serde_json::to_value(case).map_err(|e| CodecError::Validation {
            case: case.name.to_string(),
            violations: Violations(vec![Violation::new("", e.to_string())]),
        })?;
        violations.extend(registry.violations(schema_ref, &instance)?);
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(CodecError::Validation {
            case: case.name.to_string(),
            violations: Violations(violations),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyc_core::{CaseName, FunctionMarker, OwnerStake, OwnershipStructure, Token};

    fn fund() -> Case {
        Case::new(
            CaseName::new("FUND-001").unwrap(),
            "Corporate",
            "Fund administration",
            "ACME-CBU",
        )
    }

    #[test]
    fn new_case_is_valid_with_and_without_schema() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert!(validate_case(&registry, &fund(), None).is_ok());
        assert!(validate_case(&registry, &fund(), Some(KYC_CASE_SCHEMA)).is_ok());
    }

    #[test]
    fn missing_token_is_structural_violation() {
        let mut case = fund();
        case.token = None;
        let v = structural_violations(&case);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].message, "missing kyc-token section");
    }

    #[test]
    fn missing_identity_sections() {
        let mut case = fund();
        case.purpose.clear();
        case.client_business_unit.clear();
        assert_eq!(structural_violations(&case).len(), 2);
    }

    #[test]
    fn unknown_function_and_token_state() {
        let mut case = fund();
        case.functions.push(FunctionMarker::pending("LAUNDER-FUNDS"));
        case.token = Some(Token {
            status: "maybe".into(),
        });
        let registry = SchemaRegistry::builtin().unwrap();
        let err = validate_case(&registry, &case, None).unwrap_err();
        let CodecError::Validation { case, violations } = err else {
            panic!("expected validation error");
        };
        assert_eq!(case, "FUND-001");
        assert_eq!(violations.len(), 2);
        assert!(violations.to_string().contains("unknown function 'LAUNDER-FUNDS'"));
        assert!(violations.to_string().contains("invalid token state 'maybe'"));
    }

    #[test]
    fn token_state_is_case_insensitive() {
        let mut case = fund();
        case.token = Some(Token {
            status: "Approved".into(),
        });
        assert!(structural_violations(&case).is_empty());
    }

    #[test]
    fn schema_catches_out_of_range_percentages() {
        let mut case = fund();
        case.ownership = Some(OwnershipStructure {
            legal_owners: vec![OwnerStake {
                name: "HOLDCO".into(),
                percent: 140.0,
            }],
            ..Default::default()
        });
        let registry = SchemaRegistry::builtin().unwrap();
        assert!(validate_case(&registry, &case, None).is_ok());
        let err = validate_case(&registry, &case, Some(KYC_CASE_SCHEMA)).unwrap_err();
        assert!(err.to_string().contains("/ownership/legal_owners/0/percent"));
    }

    #[test]
    fn unknown_schema_ref() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert_eq!(
            validate_case(&registry, &fund(), Some("nope.json")),
            Err(CodecError::UnknownSchema("nope.json".into()))
        );
    }

    #[test]
    fn custom_schema_registration() {
        let mut registry = SchemaRegistry::builtin().unwrap();
        let strict = serde_json::json!({
            "type": "object",
            "properties": { "policies": { "type": "array", "minItems": 1 } }
        });
        registry.register("needs-policy.json", &strict).unwrap();
        assert!(registry.contains("needs-policy.json"));
        assert!(validate_case(&registry, &fund(), Some("needs-policy.json")).is_err());
    }
}
