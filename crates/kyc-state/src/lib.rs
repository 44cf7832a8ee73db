//! # kyc-state — Case Lifecycle
//!
//! A case moves through six fixed review phases. The phase is never
//! stored: it is inferred from the structural markers a case carries, and
//! the registry decides which phase may follow which and which action tags
//! belong to each phase.
//!
//! - **Phase** (`phase.rs`): the registry table, transition validation,
//!   and most-advanced-first phase inference.
//!
//! - **Action** (`action.rs`): the mutation library as a tagged enum.
//!   Every mutation appends `pending` function markers plus its domain
//!   data; none of them deduplicate.
//!
//! ```text
//! CREATION ──▶ POLICY_DISCOVERY ──▶ DOCUMENT_SOLICITATION ──▶ OWNERSHIP_CONTROL
//!                                          ▲                          │
//!                                          │                          ▼
//!                                          └──────────────────── RISK_REVIEW ──▶ FINALIZATION
//! ```

pub mod action;
pub mod phase;

pub use action::{
    add_document_solicitation, add_ownership_discovery, add_policy_discovery,
    add_regulator_notify, add_risk_assessment, apply_action, approve_case, check_action,
    decline_case, finalize_case, set_case_to_review, Action, FinalStatus, FinalizeAction,
    POLICY_DISCOVERY_CODES, SOLICITED_OBLIGATION_CODES,
};
pub use phase::{
    can_add_function, current_phase, is_terminal_phase, next_allowed_phases, registry,
    validate_transition, Phase, PhaseDefinition, PhaseError,
};
