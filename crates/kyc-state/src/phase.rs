//! # Case Phase Registry
//!
//! The six review phases a case passes through, the fixed table of legal
//! successors, and the inference that recovers a case's phase from the
//! markers it carries.
//!
//! ## States
//!
//! ```text
//! CREATION ──▶ POLICY_DISCOVERY ──▶ DOCUMENT_SOLICITATION ──▶ OWNERSHIP_CONTROL ──▶ RISK_REVIEW ──▶ FINALIZATION
//!                                          ▲                                            │          (terminal)
//!                                          └────────────── feedback edge ───────────────┘
//! ```
//!
//! ## Inference
//!
//! Phase is never stored. [`current_phase()`] checks markers
//! most-advanced-first, so a case that carries both obligations and an
//! approved token is in `FINALIZATION`, not `DOCUMENT_SOLICITATION`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kyc_core::{tags, Case};

// ─── Phase ───────────────────────────────────────────────────────────

/// A lifecycle stage of a KYC case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Nature, purpose, and client business unit recorded.
    Creation,
    /// Applicable policies discovered.
    PolicyDiscovery,
    /// Document obligations solicited.
    DocumentSolicitation,
    /// Ownership graph and control roles built.
    OwnershipControl,
    /// Risk assessed, regulator possibly notified.
    RiskReview,
    /// Token carries a decision (terminal).
    Finalization,
}

impl Phase {
    /// All phases in lifecycle order.
    pub const ALL: [Phase; 6] = [
        Phase::Creation,
        Phase::PolicyDiscovery,
        Phase::DocumentSolicitation,
        Phase::OwnershipControl,
        Phase::RiskReview,
        Phase::Finalization,
    ];

    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creation => "CREATION",
            Self::PolicyDiscovery => "POLICY_DISCOVERY",
            Self::DocumentSolicitation => "DOCUMENT_SOLICITATION",
            Self::OwnershipControl => "OWNERSHIP_CONTROL",
            Self::RiskReview => "RISK_REVIEW",
            Self::Finalization => "FINALIZATION",
        }
    }

    /// Whether no phase may follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalization)
    }

    /// Registry entry for this phase.
    pub fn definition(&self) -> &'static PhaseDefinition {
        // REGISTRY is ordered like Phase::ALL.
        &REGISTRY[*self as usize]
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = PhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PhaseError::UnknownPhase(s.to_string()))
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by the phase registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    /// `to` is not a registered successor of `from`.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current phase.
        from: Phase,
        /// Attempted phase.
        to: Phase,
    },

    /// The action tag is not registered for the phase it would land in.
    #[error("action {action} is not allowed in phase {phase}")]
    ActionNotAllowed {
        /// Phase the action targets.
        phase: Phase,
        /// Offending action tag.
        action: String,
    },

    /// The case is finalized and accepts no further amendments.
    #[error("case is in terminal phase {phase}")]
    TerminalPhase {
        /// The terminal phase.
        phase: Phase,
    },

    /// A phase name that matches no registry entry.
    #[error("unknown phase: {0}")]
    UnknownPhase(String),
}

// ─── Registry ────────────────────────────────────────────────────────

/// One row of the phase registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseDefinition {
    pub phase: Phase,
    /// Human-readable summary shown by `kycctl phase`.
    pub description: &'static str,
    /// Structural elements the phase adds to a snapshot.
    pub additions: &'static [&'static str],
    /// Action tags that may be recorded while in this phase.
    pub functions: &'static [&'static str],
    /// Legal successor phases.
    pub next: &'static [Phase],
}

static REGISTRY: [PhaseDefinition; 6] = [
    PhaseDefinition {
        phase: Phase::Creation,
        description: "Initialize the case with nature, purpose, and client business unit",
        additions: &["kyc-case", "nature-purpose", "client-business-unit"],
        functions: &[],
        next: &[Phase::PolicyDiscovery],
    },
    PhaseDefinition {
        phase: Phase::PolicyDiscovery,
        description: "Discover which policies apply based on product & jurisdiction",
        additions: &["policy nodes (auto-injected)"],
        functions: &[tags::DISCOVER_POLICIES],
        next: &[Phase::DocumentSolicitation],
    },
    PhaseDefinition {
        phase: Phase::DocumentSolicitation,
        description: "Request proofs (W8/W9, UBO declarations, etc.)",
        additions: &["obligation nodes"],
        functions: &[tags::SOLICIT_DOCUMENTS],
        next: &[Phase::OwnershipControl],
    },
    PhaseDefinition {
        phase: Phase::OwnershipControl,
        description: "Build legal & beneficial ownership graph + operational control roles",
        additions: &[
            "ownership-structure",
            "legal owners",
            "beneficial owners",
            "controllers",
            "operational roles",
        ],
        functions: &[tags::BUILD_OWNERSHIP_TREE, tags::VERIFY_OWNERSHIP],
        next: &[Phase::RiskReview],
    },
    PhaseDefinition {
        phase: Phase::RiskReview,
        description: "Compute KYC score; escalate or approve",
        additions: &["risk assessment results"],
        functions: &[tags::ASSESS_RISK, tags::REGULATOR_NOTIFY],
        next: &[Phase::Finalization, Phase::DocumentSolicitation],
    },
    PhaseDefinition {
        phase: Phase::Finalization,
        description: "Token issuance / completion",
        additions: &["kyc-token status update"],
        functions: &[],
        next: &[],
    },
];

/// The full registry in lifecycle order.
pub fn registry() -> &'static [PhaseDefinition] {
    &REGISTRY
}

/// Succeeds when `next` is a registered successor of `current`.
pub fn validate_transition(current: Phase, next: Phase) -> Result<(), PhaseError> {
    if current.definition().next.contains(&next) {
        Ok(())
    } else {
        Err(PhaseError::InvalidTransition {
            from: current,
            to: next,
        })
    }
}

/// Whether `action` may be recorded while in `phase`.
pub fn can_add_function(phase: Phase, action: &str) -> bool {
    phase.definition().functions.contains(&action)
}

/// True only for `FINALIZATION`.
pub fn is_terminal_phase(phase: Phase) -> bool {
    phase.is_terminal()
}

/// Registered successors of `phase`.
pub fn next_allowed_phases(phase: Phase) -> &'static [Phase] {
    phase.definition().next
}

// ─── Inference ───────────────────────────────────────────────────────

/// Infer the most advanced phase a case has reached.
pub fn current_phase(case: &Case) -> Phase {
    if case.token.as_ref().is_some_and(|t| !t.is_pending()) {
        return Phase::Finalization;
    }

    let mut risk = false;
    let mut ownership = false;
    let mut solicitation = false;
    let mut discovery = false;
    for marker in &case.functions {
        match marker.action.as_str() {
            tags::ASSESS_RISK | tags::REGULATOR_NOTIFY => risk = true,
            tags::BUILD_OWNERSHIP_TREE | tags::VERIFY_OWNERSHIP => ownership = true,
            tags::SOLICIT_DOCUMENTS => solicitation = true,
            tags::DISCOVER_POLICIES => discovery = true,
            _ => {}
        }
    }

    if risk {
        Phase::RiskReview
    } else if ownership || case.ownership.is_some() {
        Phase::OwnershipControl
    } else if solicitation || !case.obligations.is_empty() {
        Phase::DocumentSolicitation
    } else if discovery || !case.policies.is_empty() {
        Phase::PolicyDiscovery
    } else {
        Phase::Creation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyc_core::{CaseName, FunctionMarker, Obligation, OwnershipStructure, Policy, Token};

    fn blank() -> Case {
        Case::new(
            CaseName::new("FUND-001").unwrap(),
            "Corporate",
            "Fund administration",
            "ACME-CBU",
        )
    }

    #[test]
    fn creation_to_policy_discovery_is_valid() {
        assert!(validate_transition(Phase::Creation, Phase::PolicyDiscovery).is_ok());
    }

    #[test]
    fn creation_to_finalization_is_invalid() {
        let err = validate_transition(Phase::Creation, Phase::Finalization).unwrap_err();
        assert_eq!(
            err,
            PhaseError::InvalidTransition {
                from: Phase::Creation,
                to: Phase::Finalization,
            }
        );
        assert_eq!(
            err.to_string(),
            "invalid transition from CREATION to FINALIZATION"
        );
    }

    #[test]
    fn risk_review_feedback_edge() {
        assert!(validate_transition(Phase::RiskReview, Phase::DocumentSolicitation).is_ok());
        assert!(validate_transition(Phase::RiskReview, Phase::Finalization).is_ok());
        assert!(validate_transition(Phase::RiskReview, Phase::OwnershipControl).is_err());
    }

    #[test]
    fn finalization_has_no_successors() {
        assert!(next_allowed_phases(Phase::Finalization).is_empty());
        for p in Phase::ALL {
            assert!(validate_transition(Phase::Finalization, p).is_err());
        }
    }

    #[test]
    fn only_finalization_is_terminal() {
        for p in Phase::ALL {
            assert_eq!(is_terminal_phase(p), p == Phase::Finalization);
        }
    }

    #[test]
    fn registry_is_indexed_by_phase() {
        for p in Phase::ALL {
            assert_eq!(p.definition().phase, p);
        }
        assert_eq!(registry().len(), 6);
    }

    #[test]
    fn can_add_function_follows_registry() {
        assert!(can_add_function(Phase::PolicyDiscovery, tags::DISCOVER_POLICIES));
        assert!(can_add_function(Phase::OwnershipControl, tags::VERIFY_OWNERSHIP));
        assert!(can_add_function(Phase::RiskReview, tags::REGULATOR_NOTIFY));
        assert!(!can_add_function(Phase::Creation, tags::DISCOVER_POLICIES));
        assert!(!can_add_function(Phase::Finalization, tags::ASSESS_RISK));
    }

    #[test]
    fn blank_case_is_in_creation() {
        assert_eq!(current_phase(&blank()), Phase::Creation);
    }

    #[test]
    fn policies_without_marker_imply_discovery() {
        let mut case = blank();
        case.policies.push(Policy {
            code: "AML-GLOBAL-BASE".to_string(),
        });
        assert_eq!(current_phase(&case), Phase::PolicyDiscovery);
    }

    #[test]
    fn ownership_structure_alone_implies_ownership_control() {
        let mut case = blank();
        case.ownership = Some(OwnershipStructure::default());
        assert_eq!(current_phase(&case), Phase::OwnershipControl);
    }

    #[test]
    fn regulator_notify_implies_risk_review() {
        let mut case = blank();
        case.functions
            .push(FunctionMarker::pending(tags::REGULATOR_NOTIFY));
        assert_eq!(current_phase(&case), Phase::RiskReview);
    }

    #[test]
    fn approved_token_wins_over_obligations() {
        let mut case = blank();
        case.obligations.push(Obligation {
            code: "OBL-W8BEN-E".to_string(),
        });
        case.token = Some(Token {
            status: "approved".to_string(),
        });
        assert_eq!(current_phase(&case), Phase::Finalization);
    }

    #[test]
    fn pending_token_does_not_finalize() {
        let mut case = blank();
        case.functions.push(FunctionMarker::pending(tags::ASSESS_RISK));
        assert!(case.token.as_ref().unwrap().is_pending());
        assert_eq!(current_phase(&case), Phase::RiskReview);
    }

    #[test]
    fn phase_name_round_trip() {
        for p in Phase::ALL {
            assert_eq!(p.as_str().parse::<Phase>().unwrap(), p);
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{}\"", p.as_str()));
        }
        assert!("LIMBO".parse::<Phase>().is_err());
    }

    mod precedence {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn most_advanced_marker_wins(
                policies in any::<bool>(),
                obligations in any::<bool>(),
                ownership in any::<bool>(),
                risk in any::<bool>(),
                decided in any::<bool>(),
            ) {
                let mut case = blank();
                if policies {
                    case.policies.push(Policy { code: "P".to_string() });
                }
                if obligations {
                    case.obligations.push(Obligation { code: "O".to_string() });
                }
                if ownership {
                    case.ownership = Some(OwnershipStructure::default());
                }
                if risk {
                    case.functions.push(FunctionMarker::pending(tags::ASSESS_RISK));
                }
                if decided {
                    case.token = Some(Token { status: "declined".to_string() });
                }

                let expected = if decided {
                    Phase::Finalization
                } else if risk {
                    Phase::RiskReview
                } else if ownership {
                    Phase::OwnershipControl
                } else if obligations {
                    Phase::DocumentSolicitation
                } else if policies {
                    Phase::PolicyDiscovery
                } else {
                    Phase::Creation
                };
                prop_assert_eq!(current_phase(&case), expected);
            }
        }
    }
}
