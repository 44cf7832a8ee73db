//! # Case Data Model
//!
//! The structured state of a KYC case as reconstructed from a snapshot.
//!
//! ```text
//! Case
//!  ├── nature / purpose / client business unit
//!  ├── policies        (ordered, duplicates allowed)
//!  ├── obligations     (ordered, duplicates allowed)
//!  ├── functions       (ordered {action, status} markers)
//!  ├── ownership       (optional: legal, beneficial, controllers, roles)
//!  ├── token           (optional finalization token {status})
//!  └── status          (pending | complete | failed)
//! ```
//!
//! A `Case` is owned by exactly one amendment at a time. Nothing in this
//! module deduplicates: appending the same policy twice yields two entries.

use serde::{Deserialize, Serialize};

use crate::error::KycError;
use crate::identity::CaseName;

/// Overall status of a case, also used for function marker status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    /// Work outstanding.
    #[default]
    Pending,
    /// Case reached a terminal decision.
    Complete,
    /// Processing failed.
    Failed,
}

impl CaseStatus {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CaseStatus {
    type Err = KycError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(KycError::InvalidStatus(other.to_string())),
        }
    }
}

/// An applicable KYC policy, e.g. `KYCPOL-UK-2025`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub code: String,
}

/// A document obligation solicited from the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    pub code: String,
}

/// A function marker recording that an action was performed on the case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMarker {
    /// Action tag, e.g. `DISCOVER-POLICIES`.
    pub action: String,
    pub status: CaseStatus,
}

impl FunctionMarker {
    /// A marker in `pending` status, the form every mutation appends.
    pub fn pending(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            status: CaseStatus::Pending,
        }
    }
}

/// Finalization token. `status` is `pending`, `approved`, `declined`, or `review`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub status: String,
}

impl Token {
    /// The status every token starts with.
    pub const PENDING: &'static str = "pending";

    /// Whether the token still awaits a decision.
    pub fn is_pending(&self) -> bool {
        self.status == Self::PENDING
    }
}

/// A named party holding a percentage stake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerStake {
    pub name: String,
    pub percent: f64,
}

/// A named party holding a control or operational role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub name: String,
    pub role: String,
}

/// Legal and beneficial ownership graph plus control roles.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OwnershipStructure {
    pub legal_owners: Vec<OwnerStake>,
    pub beneficial_owners: Vec<OwnerStake>,
    pub controllers: Vec<RoleAssignment>,
    pub operational_roles: Vec<RoleAssignment>,
}

impl OwnershipStructure {
    /// Whether no party of any kind is recorded.
    pub fn is_empty(&self) -> bool {
        self.legal_owners.is_empty()
            && self.beneficial_owners.is_empty()
            && self.controllers.is_empty()
            && self.operational_roles.is_empty()
    }
}

/// The structured state of one KYC case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub name: CaseName,
    pub nature: String,
    pub purpose: String,
    pub client_business_unit: String,
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub obligations: Vec<Obligation>,
    #[serde(default)]
    pub functions: Vec<FunctionMarker>,
    #[serde(default)]
    pub ownership: Option<OwnershipStructure>,
    #[serde(default)]
    pub token: Option<Token>,
    #[serde(default)]
    pub status: CaseStatus,
}

impl Case {
    /// A freshly created case: no policies, no markers, a pending token.
    pub fn new(
        name: CaseName,
        nature: impl Into<String>,
        purpose: impl Into<String>,
        client_business_unit: impl Into<String>,
    ) -> Self {
        Self {
            name,
            nature: nature.into(),
            purpose: purpose.into(),
            client_business_unit: client_business_unit.into(),
            policies: Vec::new(),
            obligations: Vec::new(),
            functions: Vec::new(),
            ownership: None,
            token: Some(Token {
                status: Token::PENDING.to_string(),
            }),
            status: CaseStatus::Pending,
        }
    }

    /// Whether any function marker carries `action`.
    pub fn has_action(&self, action: &str) -> bool {
        self.functions.iter().any(|f| f.action == action)
    }

    /// Policy codes in order.
    pub fn policy_codes(&self) -> Vec<&str> {
        self.policies.iter().map(|p| p.code.as_str()).collect()
    }

    /// Obligation codes in order.
    pub fn obligation_codes(&self) -> Vec<&str> {
        self.obligations.iter().map(|o| o.code.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Case {
        Case::new(
            CaseName::new("FUND-001").unwrap(),
            "Corporate",
            "Investment management",
            "ACME-CBU",
        )
    }

    #[test]
    fn new_case_starts_pending_with_pending_token() {
        let case = sample();
        assert_eq!(case.status, CaseStatus::Pending);
        assert!(case.token.as_ref().unwrap().is_pending());
        assert!(case.policies.is_empty());
        assert!(case.ownership.is_none());
    }

    #[test]
    fn has_action_scans_markers() {
        let mut case = sample();
        assert!(!case.has_action("ASSESS-RISK"));
        case.functions.push(FunctionMarker::pending("ASSESS-RISK"));
        assert!(case.has_action("ASSESS-RISK"));
    }

    #[test]
    fn status_parse_and_display() {
        for s in ["pending", "complete", "failed"] {
            let status: CaseStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("done".parse::<CaseStatus>().is_err());
    }

    #[test]
    fn case_json_round_trip() {
        let mut case = sample();
        case.ownership = Some(OwnershipStructure {
            legal_owners: vec![OwnerStake {
                name: "HOLDCO".to_string(),
                percent: 100.0,
            }],
            ..Default::default()
        });
        let json = serde_json::to_value(&case).unwrap();
        assert_eq!(json["status"], "pending");
        let back: Case = serde_json::from_value(json).unwrap();
        assert_eq!(back, case);
    }

    #[test]
    fn ownership_is_empty() {
        assert!(OwnershipStructure::default().is_empty());
    }
}
