//! # Case Binder
//!
//! Turns the snapshot tree into [`Case`] values. Every top-level form must
//! be a `(kyc-case NAME ...)` form, and every section inside it must be one
//! the serializer writes; anything else is a bind error rather than
//! silently dropped data.
//!
//! ## Sections
//!
//! ```text
//! (nature-purpose (nature "..") (purpose ".."))
//! (client-business-unit NAME)
//! (policy CODE)  (obligation CODE)
//! (function ACTION [STATUS])
//! (ownership-structure (owner N 100%) (beneficial-owner N 60%)
//!                      (controller N "Role") (role N "Role"))
//! (kyc-token "status")
//! (status complete)
//! ```

use kyc_core::{
    Case, CaseName, CaseStatus, FunctionMarker, Obligation, OwnerStake, OwnershipStructure,
    Policy, RoleAssignment, Token,
};

use crate::error::CodecError;
use crate::sexpr::Sexpr;

const DOCUMENT: &str = "<document>";

/// Bind every top-level form to a case.
pub fn bind_document(forms: &[Sexpr]) -> Result<Vec<Case>, CodecError> {
    forms.iter().map(bind_case).collect()
}

fn err(case: &str, reason: impl Into<String>) -> CodecError {
    CodecError::Bind {
        case: case.to_string(),
        reason: reason.into(),
    }
}

fn bind_case(form: &Sexpr) -> Result<Case, CodecError> {
    let (head, rest) = form
        .as_form()
        .ok_or_else(|| err(DOCUMENT, "expected a (kyc-case ...) form"))?;
    if head != "kyc-case" {
        return Err(err(DOCUMENT, format!("unexpected top-level form '{head}'")));
    }
    let (name, body) = rest
        .split_first()
        .ok_or_else(|| err(DOCUMENT, "kyc-case is missing its name"))?;
    let name = name
        .as_atom()
        .ok_or_else(|| err(DOCUMENT, "case name must be a bare atom"))?;
    let name = CaseName::new(name).map_err(|e| err(name, e.to_string()))?;

    let mut case = Case::new(name, "", "", "");
    case.token = None;
    let label = case.name.to_string();

    for section in body {
        let (head, args) = section
            .as_form()
            .ok_or_else(|| err(&label, "case body entries must be forms"))?;
        match head {
            "nature-purpose" => {
                for part in args {
                    match part.as_form() {
                        Some(("nature", [v])) => case.nature = text(&label, v)?,
                        Some(("purpose", [v])) => case.purpose = text(&label, v)?,
                        _ => return Err(err(&label, "malformed nature-purpose entry")),
                    }
                }
            }
            "client-business-unit" => {
                case.client_business_unit = single_text(&label, head, args)?;
            }
            "policy" => case.policies.push(Policy {
                code: single_text(&label, head, args)?,
            }),
            "obligation" => case.obligations.push(Obligation {
                code: single_text(&label, head, args)?,
            }),
            "function" => case.functions.push(bind_function(&label, args)?),
            "ownership-structure" => {
                let ownership = case.ownership.get_or_insert_with(OwnershipStructure::default);
                bind_ownership(&label, args, ownership)?;
            }
            "kyc-token" => {
                case.token = Some(Token {
                    status: single_text(&label, head, args)?,
                })
            }
            "status" => {
                case.status = single_text(&label, head, args)?
                    .parse::<CaseStatus>()
                    .map_err(|e: kyc_core::KycError| err(&label, e.to_string()))?;
            }
            other => return Err(err(&label, format!("unknown section '{other}'"))),
        }
    }
    Ok(case)
}

fn text(case: &str, v: &Sexpr) -> Result<String, CodecError> {
    v.as_text()
        .map(str::to_string)
        .ok_or_else(|| err(case, "expected an atom or string"))
}

fn single_text(case: &str, head: &str, args: &[Sexpr]) -> Result<String, CodecError> {
    match args {
        [v] => text(case, v),
        _ => Err(err(case, format!("{head} takes exactly one value"))),
    }
}

fn bind_function(case: &str, args: &[Sexpr]) -> Result<FunctionMarker, CodecError> {
    let (action, status) = match args {
        [action] => (text(case, action)?, CaseStatus::Pending),
        [action, status] => (
            text(case, action)?,
            text(case, status)?
                .parse::<CaseStatus>()
                .map_err(|e: kyc_core::KycError| err(case, e.to_string()))?,
        ),
        _ => return Err(err(case, "function takes an action and an optional status")),
    };
    Ok(FunctionMarker { action, status })
}

fn parse_percent(case: &str, v: &Sexpr) -> Result<f64, CodecError> {
    let raw = text(case, v)?;
    raw.strip_suffix('%')
        .unwrap_or(&raw)
        .parse::<f64>()
        .map_err(|_| err(case, format!("invalid percentage '{raw}'")))
}

fn bind_ownership(
    case: &str,
    entries: &[Sexpr],
    ownership: &mut OwnershipStructure,
) -> Result<(), CodecError> {
    for entry in entries {
        let Some((kind, [who, what])) = entry.as_form() else {
            return Err(err(case, "ownership entries take a name and a value"));
        };
        let name = text(case, who)?;
        match kind {
            "owner" => ownership.legal_owners.push(OwnerStake {
                name,
                percent: parse_percent(case, what)?,
            }),
            "beneficial-owner" => ownership.beneficial_owners.push(OwnerStake {
                name,
                percent: parse_percent(case, what)?,
            }),
            "controller" => ownership.controllers.push(RoleAssignment {
                name,
                role: text(case, what)?,
            }),
            "role" => ownership.operational_roles.push(RoleAssignment {
                name,
                role: text(case, what)?,
            }),
            other => return Err(err(case, format!("unknown ownership entry '{other}'"))),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexpr::read_all;

    fn bind(text: &str) -> Result<Vec<Case>, CodecError> {
        bind_document(&read_all(text).unwrap())
    }

    const FULL: &str = r#"
(kyc-case AVIVA-EU-EQUITY-FUND
  (nature-purpose
    (nature "Corporate")
    (purpose "Equity fund onboarding")
  )
  (client-business-unit AVIVA-CBU)
  (policy KYCPOL-EU-2025)
  (obligation OBL-W8BEN-E)
  (function DISCOVER-POLICIES)
  (function ASSESS-RISK complete)
  (ownership-structure
    (owner AVIVA-HOLDINGS-LTD 100%)
    (beneficial-owner JANE-DOE 60.5%)
    (controller JANE-DOE "Director")
    (role GLOBAL-CUSTODY-BANK "Custodian")
  )
  (kyc-token "approved")
  (status complete)
)
"#;

    #[test]
    fn binds_every_section() {
        let cases = bind(FULL).unwrap();
        assert_eq!(cases.len(), 1);
        let c = &cases[0];
        assert_eq!(c.name.as_str(), "AVIVA-EU-EQUITY-FUND");
        assert_eq!(c.nature, "Corporate");
        assert_eq!(c.purpose, "Equity fund onboarding");
        assert_eq!(c.client_business_unit, "AVIVA-CBU");
        assert_eq!(c.policy_codes(), vec!["KYCPOL-EU-2025"]);
        assert_eq!(c.obligation_codes(), vec!["OBL-W8BEN-E"]);
        assert_eq!(c.functions[0].status, CaseStatus::Pending);
        assert_eq!(c.functions[1].status, CaseStatus::Complete);
        let own = c.ownership.as_ref().unwrap();
        assert_eq!(own.legal_owners[0].percent, 100.0);
        assert_eq!(own.beneficial_owners[0].percent, 60.5);
        assert_eq!(own.controllers[0].role, "Director");
        assert_eq!(own.operational_roles[0].name, "GLOBAL-CUSTODY-BANK");
        assert_eq!(c.token.as_ref().unwrap().status, "approved");
        assert_eq!(c.status, CaseStatus::Complete);
    }

    #[test]
    fn missing_sections_stay_empty() {
        let cases = bind("(kyc-case BARE)").unwrap();
        assert!(cases[0].token.is_none());
        assert!(cases[0].nature.is_empty());
        assert_eq!(cases[0].status, CaseStatus::Pending);
    }

    #[test]
    fn binds_multiple_cases() {
        let cases = bind("(kyc-case A)\n(kyc-case B)").unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].name.as_str(), "B");
    }

    #[test]
    fn rejects_unknown_forms() {
        assert!(matches!(
            bind("(kyc-policy A)"),
            Err(CodecError::Bind { .. })
        ));
        assert!(bind("(kyc-case A (risk-score 10))").is_err());
        assert!(bind("(kyc-case A (ownership-structure (entity X)))").is_err());
        assert!(bind("(kyc-case)").is_err());
        assert!(bind("(kyc-case A (policy))").is_err());
        assert!(bind("(kyc-case A (status done))").is_err());
    }

    #[test]
    fn rejects_bad_percentages() {
        let err = bind("(kyc-case A (ownership-structure (owner X lots)))").unwrap_err();
        assert!(err.to_string().contains("invalid percentage 'lots'"));
    }
}
