//! # Case Mutation Library
//!
//! Named mutations that advance a case through its phases. Each appends
//! one or more `pending` function markers together with its domain data.
//!
//! Mutations are expressed as the tagged [`Action`] enum and dispatched by
//! [`Action::apply()`]; finalization carries its terminal status as data
//! ([`FinalizeAction`]) rather than as a captured closure.
//!
//! ## Known Limitations
//!
//! - Nothing deduplicates. Applying `DiscoverPolicies` twice yields six
//!   policy entries and two `DISCOVER-POLICIES` markers.
//! - Every finalization outcome sets the overall case status to
//!   `complete`, including `declined` and `review`.

use serde::{Deserialize, Serialize};

use kyc_core::{
    tags, Case, CaseStatus, FunctionMarker, Obligation, OwnerStake, OwnershipStructure, Policy,
    RoleAssignment, Token,
};

use crate::phase::{can_add_function, current_phase, validate_transition, Phase, PhaseError};

/// Policy codes appended by policy discovery.
pub const POLICY_DISCOVERY_CODES: [&str; 3] = ["KYCPOL-UK-2025", "KYCPOL-EU-2025", "AML-GLOBAL-BASE"];

/// Obligation codes appended by document solicitation.
pub const SOLICITED_OBLIGATION_CODES: [&str; 3] = [
    "OBL-W8BEN-E",
    "OBL-UBO-DECLARATION",
    "OBL-CERT-OF-INCORPORATION",
];

// ─── Finalization ────────────────────────────────────────────────────

/// Terminal token status written by finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalStatus {
    Approved,
    Declined,
    Review,
}

impl FinalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Declined => "declined",
            Self::Review => "review",
        }
    }
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finalize a case with the given token status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FinalizeAction {
    pub status: FinalStatus,
}

// ─── Action ──────────────────────────────────────────────────────────

/// A mutation the amendment pipeline can apply to a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    DiscoverPolicies,
    SolicitDocuments,
    BuildOwnership,
    AssessRisk,
    NotifyRegulator,
    Finalize(FinalizeAction),
}

impl Action {
    /// Every action, finalization in each of its statuses.
    pub const ALL: [Action; 8] = [
        Action::DiscoverPolicies,
        Action::SolicitDocuments,
        Action::BuildOwnership,
        Action::AssessRisk,
        Action::NotifyRegulator,
        Action::Finalize(FinalizeAction {
            status: FinalStatus::Approved,
        }),
        Action::Finalize(FinalizeAction {
            status: FinalStatus::Declined,
        }),
        Action::Finalize(FinalizeAction {
            status: FinalStatus::Review,
        }),
    ];

    /// Function marker tags this action appends, in order.
    pub fn tags(&self) -> &'static [&'static str] {
        match self {
            Self::DiscoverPolicies => &[tags::DISCOVER_POLICIES],
            Self::SolicitDocuments => &[tags::SOLICIT_DOCUMENTS],
            Self::BuildOwnership => &[tags::BUILD_OWNERSHIP_TREE, tags::VERIFY_OWNERSHIP],
            Self::AssessRisk => &[tags::ASSESS_RISK],
            Self::NotifyRegulator => &[tags::REGULATOR_NOTIFY],
            Self::Finalize(_) => &[],
        }
    }

    /// The phase a case is in once this action has been applied.
    pub fn target_phase(&self) -> Phase {
        match self {
            Self::DiscoverPolicies => Phase::PolicyDiscovery,
            Self::SolicitDocuments => Phase::DocumentSolicitation,
            Self::BuildOwnership => Phase::OwnershipControl,
            Self::AssessRisk | Self::NotifyRegulator => Phase::RiskReview,
            Self::Finalize(_) => Phase::Finalization,
        }
    }

    /// Step label recorded in the amendment log.
    pub fn step_label(&self) -> &'static str {
        match self {
            Self::DiscoverPolicies => "policy-discovery",
            Self::SolicitDocuments => "document-solicitation",
            Self::BuildOwnership => "ownership-discovery",
            Self::AssessRisk => "risk-assessment",
            Self::NotifyRegulator => "regulator-notify",
            Self::Finalize(f) => match f.status {
                FinalStatus::Approved => "approve",
                FinalStatus::Declined => "decline",
                FinalStatus::Review => "review",
            },
        }
    }

    /// Resolve a step label back to its action.
    pub fn from_step_label(label: &str) -> Option<Action> {
        Self::ALL.into_iter().find(|a| a.step_label() == label)
    }

    /// Apply the mutation in place.
    pub fn apply(&self, case: &mut Case) {
        match self {
            Self::DiscoverPolicies => add_policy_discovery(case),
            Self::SolicitDocuments => add_document_solicitation(case),
            Self::BuildOwnership => add_ownership_discovery(case),
            Self::AssessRisk => add_risk_assessment(case),
            Self::NotifyRegulator => add_regulator_notify(case),
            Self::Finalize(f) => finalize_case(case, f.status),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.step_label())
    }
}

/// Apply `action` to an owned case and return the result.
pub fn apply_action(mut case: Case, action: &Action) -> Case {
    action.apply(&mut case);
    case
}

/// Check that `action` is legal for the phase `case` is currently in.
///
/// The action must land in the current phase or a registered successor of
/// it, and every tag it appends must be registered for that target phase.
/// A finalized case accepts nothing. Returns the target phase.
pub fn check_action(case: &Case, action: &Action) -> Result<Phase, PhaseError> {
    let current = current_phase(case);
    if current.is_terminal() {
        return Err(PhaseError::TerminalPhase { phase: current });
    }
    let target = action.target_phase();
    if target != current {
        validate_transition(current, target)?;
    }
    if let Some(tag) = action.tags().iter().find(|t| !can_add_function(target, t)) {
        return Err(PhaseError::ActionNotAllowed {
            phase: target,
            action: tag.to_string(),
        });
    }
    Ok(target)
}

// ─── Mutations ───────────────────────────────────────────────────────

fn mark(case: &mut Case, action: &str) {
    case.functions.push(FunctionMarker::pending(action));
}

fn stake(name: &str, percent: f64) -> OwnerStake {
    OwnerStake {
        name: name.to_string(),
        percent,
    }
}

fn role(name: &str, role: &str) -> RoleAssignment {
    RoleAssignment {
        name: name.to_string(),
        role: role.to_string(),
    }
}

/// Append the applicable policies and a `DISCOVER-POLICIES` marker.
pub fn add_policy_discovery(case: &mut Case) {
    case.policies.extend(POLICY_DISCOVERY_CODES.iter().map(|code| Policy {
        code: code.to_string(),
    }));
    mark(case, tags::DISCOVER_POLICIES);
}

/// Append the solicited obligations and a `SOLICIT-DOCUMENTS` marker.
pub fn add_document_solicitation(case: &mut Case) {
    case.obligations
        .extend(SOLICITED_OBLIGATION_CODES.iter().map(|code| Obligation {
            code: code.to_string(),
        }));
    mark(case, tags::SOLICIT_DOCUMENTS);
}

/// Build the ownership graph and mark it for verification.
pub fn add_ownership_discovery(case: &mut Case) {
    mark(case, tags::BUILD_OWNERSHIP_TREE);
    mark(case, tags::VERIFY_OWNERSHIP);

    let ownership = case.ownership.get_or_insert_with(OwnershipStructure::default);
    ownership
        .legal_owners
        .push(stake("AVIVA-HOLDINGS-LTD", 100.0));
    ownership
        .beneficial_owners
        .extend([stake("JANE-DOE", 60.0), stake("JOHN-SMITH", 40.0)]);
    ownership.controllers.push(role("JANE-DOE", "Director"));
    ownership.operational_roles.extend([
        role("ACME-FUND-SERVICES", "Administrator"),
        role("GLOBAL-CUSTODY-BANK", "Custodian"),
    ]);
}

pub fn add_risk_assessment(case: &mut Case) {
    mark(case, tags::ASSESS_RISK);
}

pub fn add_regulator_notify(case: &mut Case) {
    mark(case, tags::REGULATOR_NOTIFY);
}

/// Set the token to `status` (creating it if absent) and mark the case
/// `complete`, whatever the status.
pub fn finalize_case(case: &mut Case, status: FinalStatus) {
    match case.token.as_mut() {
        Some(token) => token.status = status.as_str().to_string(),
        None => {
            case.token = Some(Token {
                status: status.as_str().to_string(),
            })
        }
    }
    case.status = CaseStatus::Complete;
}

pub fn approve_case(case: &mut Case) {
    finalize_case(case, FinalStatus::Approved);
}

pub fn decline_case(case: &mut Case) {
    finalize_case(case, FinalStatus::Declined);
}

pub fn set_case_to_review(case: &mut Case) {
    finalize_case(case, FinalStatus::Review);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyc_core::CaseName;

    fn fund() -> Case {
        Case::new(
            CaseName::new("FUND-001").unwrap(),
            "Corporate",
            "Fund administration",
            "ACME-CBU",
        )
    }

    #[test]
    fn policy_discovery_appends_codes_and_marker() {
        let case = apply_action(fund(), &Action::DiscoverPolicies);
        assert_eq!(
            case.policy_codes(),
            vec!["KYCPOL-UK-2025", "KYCPOL-EU-2025", "AML-GLOBAL-BASE"]
        );
        assert_eq!(
            case.functions,
            vec![FunctionMarker::pending(tags::DISCOVER_POLICIES)]
        );
    }

    #[test]
    fn mutations_do_not_deduplicate() {
        let mut case = fund();
        add_policy_discovery(&mut case);
        add_policy_discovery(&mut case);
        assert_eq!(case.policies.len(), 6);
        assert_eq!(case.functions.len(), 2);
    }

    #[test]
    fn document_solicitation_appends_obligations() {
        let case = apply_action(fund(), &Action::SolicitDocuments);
        assert_eq!(case.obligation_codes(), SOLICITED_OBLIGATION_CODES.to_vec());
        assert!(case.has_action(tags::SOLICIT_DOCUMENTS));
    }

    #[test]
    fn ownership_discovery_builds_graph() {
        let case = apply_action(fund(), &Action::BuildOwnership);
        let actions: Vec<&str> = case.functions.iter().map(|f| f.action.as_str()).collect();
        assert_eq!(actions, vec![tags::BUILD_OWNERSHIP_TREE, tags::VERIFY_OWNERSHIP]);

        let ownership = case.ownership.unwrap();
        assert_eq!(ownership.legal_owners.len(), 1);
        assert_eq!(ownership.beneficial_owners.len(), 2);
        assert_eq!(ownership.controllers[0].role, "Director");
        assert_eq!(ownership.operational_roles.len(), 2);
    }

    #[test]
    fn ownership_discovery_extends_existing_structure() {
        let mut case = fund();
        add_ownership_discovery(&mut case);
        add_ownership_discovery(&mut case);
        assert_eq!(case.ownership.unwrap().beneficial_owners.len(), 4);
    }

    #[test]
    fn approve_and_decline_both_complete_the_case() {
        let mut approved = fund();
        approve_case(&mut approved);
        let mut declined = fund();
        decline_case(&mut declined);

        assert_eq!(approved.token.unwrap().status, "approved");
        assert_eq!(declined.token.unwrap().status, "declined");
        assert_eq!(approved.status, CaseStatus::Complete);
        assert_eq!(declined.status, CaseStatus::Complete);
    }

    #[test]
    fn review_also_completes_the_case() {
        let mut case = fund();
        set_case_to_review(&mut case);
        assert_eq!(case.status, CaseStatus::Complete);
        assert_eq!(case.token.unwrap().status, "review");
    }

    #[test]
    fn finalize_creates_missing_token() {
        let mut case = fund();
        case.token = None;
        finalize_case(&mut case, FinalStatus::Declined);
        assert_eq!(case.token.unwrap().status, "declined");
        assert!(case.functions.is_empty());
    }

    #[test]
    fn step_labels_resolve() {
        for action in Action::ALL {
            assert_eq!(Action::from_step_label(action.step_label()), Some(action));
        }
        assert_eq!(Action::from_step_label("CASE-CREATION"), None);
        assert_eq!(
            Action::from_step_label("approve"),
            Some(Action::Finalize(FinalizeAction {
                status: FinalStatus::Approved
            }))
        );
    }

    #[test]
    fn every_tag_is_registered_for_its_target_phase() {
        for action in Action::ALL {
            for tag in action.tags() {
                assert!(can_add_function(action.target_phase(), tag), "{action}: {tag}");
                assert!(tags::is_known(tag));
            }
        }
    }

    #[test]
    fn gating_follows_lifecycle() {
        let mut case = fund();
        assert_eq!(
            check_action(&case, &Action::DiscoverPolicies),
            Ok(Phase::PolicyDiscovery)
        );
        assert!(matches!(
            check_action(&case, &Action::AssessRisk),
            Err(PhaseError::InvalidTransition {
                from: Phase::Creation,
                to: Phase::RiskReview
            })
        ));

        add_policy_discovery(&mut case);
        // Repeating an action within the current phase is allowed.
        assert!(check_action(&case, &Action::DiscoverPolicies).is_ok());
        assert!(check_action(&case, &Action::SolicitDocuments).is_ok());
    }

    #[test]
    fn gating_allows_feedback_from_risk_review() {
        let mut case = fund();
        add_risk_assessment(&mut case);
        assert!(check_action(&case, &Action::SolicitDocuments).is_ok());
        assert!(check_action(&case, &Action::NotifyRegulator).is_ok());
        assert!(check_action(&case, &Action::Finalize(FinalizeAction {
            status: FinalStatus::Review
        }))
        .is_ok());
    }

    #[test]
    fn gating_rejects_everything_after_finalization() {
        let mut case = fund();
        approve_case(&mut case);
        for action in Action::ALL {
            assert_eq!(
                check_action(&case, &action),
                Err(PhaseError::TerminalPhase {
                    phase: Phase::Finalization
                })
            );
        }
    }

    #[test]
    fn action_serde_is_tagged() {
        let json = serde_json::to_value(Action::AssessRisk).unwrap();
        assert_eq!(json["action"], "assess-risk");
        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, Action::AssessRisk);
    }
}
