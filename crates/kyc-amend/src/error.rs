//! # Amendment Errors
//!
//! [`StoreError`] is what a [`crate::VersionStore`] returns. [`AmendError`]
//! is what the pipeline returns: every variant names the case and the
//! [`Step`] that failed, so a caller can tell whether anything was written.
//! Failures before [`Step::PersistVersion`] leave no version or amendment
//! record behind, although a validation verdict may already be logged. A
//! failure at [`Step::RecordAmendment`] leaves a version without an audit
//! record.

use std::time::Duration;

use thiserror::Error;

use kyc_dsl::CodecError;
use kyc_state::PhaseError;

/// Pipeline step in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Reading the latest version from the store.
    Load,
    /// Reconstructing the case from snapshot text.
    Parse,
    /// Checking the action against the phase registry.
    Gate,
    /// Rendering the case as snapshot text.
    Serialize,
    Validate,
    /// Logging the validation verdict.
    RecordValidation,
    /// Computing the next version number.
    Allocate,
    PersistVersion,
    RecordAmendment,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Parse => "parse",
            Self::Gate => "phase-gate",
            Self::Serialize => "serialize",
            Self::Validate => "validate",
            Self::RecordValidation => "record-validation",
            Self::Allocate => "allocate-version",
            Self::PersistVersion => "persist-version",
            Self::RecordAmendment => "record-amendment",
        }
    }

    /// Whether a failure in this step can have left a stored version behind.
    pub fn after_persist(&self) -> bool {
        matches!(self, Self::RecordAmendment)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by a version store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The case has no stored versions, or the requested version is absent.
    #[error("case {case} not found")]
    NotFound { case: String },

    /// `(case, version)` already exists.
    #[error("version {version} of case {case} already exists")]
    Conflict { case: String, version: u32 },

    /// The backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Errors returned by the amendment pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AmendError {
    #[error("case {case} not found ({step})")]
    NotFound { case: String, step: Step },

    #[error("snapshot of {case} could not be parsed ({step}): {reason}")]
    Parse {
        case: String,
        step: Step,
        reason: String,
    },

    /// The snapshot parsed but did not yield exactly one usable case.
    #[error("snapshot of {case} could not be bound ({step}): {reason}")]
    Bind {
        case: String,
        step: Step,
        reason: String,
    },

    #[error("case {case} failed validation ({step}):\n{reason}")]
    Validation {
        case: String,
        step: Step,
        reason: String,
    },

    /// The action is not legal in the case's current phase.
    #[error("amendment of {case} rejected ({step}): {source}")]
    InvalidTransition {
        case: String,
        step: Step,
        #[source]
        source: PhaseError,
    },

    #[error("persistence failed for {case} ({step}): {reason}")]
    Persistence {
        case: String,
        step: Step,
        reason: String,
    },

    /// Another writer took the version number first. Re-run the amendment.
    #[error("version {version} of {case} was written concurrently ({step})")]
    Concurrency {
        case: String,
        step: Step,
        version: u32,
    },

    #[error("{step} for {case} timed out after {after:?}")]
    Timeout {
        case: String,
        step: Step,
        after: Duration,
    },
}

impl AmendError {
    /// Case the failing amendment targeted.
    pub fn case(&self) -> &str {
        match self {
            Self::NotFound { case, .. }
            | Self::Parse { case, .. }
            | Self::Bind { case, .. }
            | Self::Validation { case, .. }
            | Self::InvalidTransition { case, .. }
            | Self::Persistence { case, .. }
            | Self::Concurrency { case, .. }
            | Self::Timeout { case, .. } => case,
        }
    }

    pub fn step(&self) -> Step {
        match self {
            Self::NotFound { step, .. }
            | Self::Parse { step, .. }
            | Self::Bind { step, .. }
            | Self::Validation { step, .. }
            | Self::InvalidTransition { step, .. }
            | Self::Persistence { step, .. }
            | Self::Concurrency { step, .. }
            | Self::Timeout { step, .. } => *step,
        }
    }

    pub(crate) fn from_store(case: &str, step: Step, e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => Self::NotFound {
                case: case.to_string(),
                step,
            },
            StoreError::Conflict { version, .. } => Self::Concurrency {
                case: case.to_string(),
                step,
                version,
            },
            StoreError::Backend(reason) => Self::Persistence {
                case: case.to_string(),
                step,
                reason,
            },
        }
    }

    pub(crate) fn from_codec(case: &str, step: Step, e: CodecError) -> Self {
        let case = case.to_string();
        match e {
            CodecError::Parse(reason) => Self::Parse { case, step, reason },
            CodecError::Bind { reason, .. } => Self::Bind { case, step, reason },
            CodecError::Validation { violations, .. } => Self::Validation {
                case,
                step,
                reason: violations.to_string(),
            },
            other @ (CodecError::UnknownSchema(_) | CodecError::SchemaBuild { .. }) => {
                Self::Validation {
                    case,
                    step,
                    reason: other.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyc_dsl::{Violation, Violations};
    use kyc_state::Phase;

    #[test]
    fn store_errors_map_onto_taxonomy() {
        assert_eq!(
            AmendError::from_store("A", Step::Load, StoreError::NotFound { case: "A".into() }),
            AmendError::NotFound {
                case: "A".into(),
                step: Step::Load
            }
        );
        let err = AmendError::from_store(
            "A",
            Step::PersistVersion,
            StoreError::Conflict {
                case: "A".into(),
                version: 3,
            },
        );
        assert!(matches!(err, AmendError::Concurrency { version: 3, .. }));
        let err = AmendError::from_store("A", Step::RecordAmendment, StoreError::Backend("io".into()));
        assert!(err.step().after_persist());
        assert_eq!(err.to_string(), "persistence failed for A (record-amendment): io");
    }

    #[test]
    fn codec_errors_map_onto_taxonomy() {
        let err = AmendError::from_codec("A", Step::Parse, CodecError::Parse("eof".into()));
        assert!(matches!(err, AmendError::Parse { .. }));

        let err = AmendError::from_codec(
            "A",
            Step::Validate,
            CodecError::Validation {
                case: "A".into(),
                violations: Violations(vec![Violation::new("/token", "missing kyc-token section")]),
            },
        );
        assert_eq!(err.case(), "A");
        assert!(err.to_string().contains("/token: missing kyc-token section"));

        let err = AmendError::from_codec("A", Step::Validate, CodecError::UnknownSchema("x".into()));
        assert!(matches!(err, AmendError::Validation { .. }));
    }

    #[test]
    fn only_amendment_recording_follows_persistence() {
        let err = AmendError::from_store("A", Step::RecordValidation, StoreError::Backend("io".into()));
        assert!(!err.step().after_persist());
        assert_eq!(err.to_string(), "persistence failed for A (record-validation): io");
    }

    #[test]
    fn transition_error_keeps_source() {
        let err = AmendError::InvalidTransition {
            case: "FUND-001".into(),
            step: Step::Gate,
            source: PhaseError::InvalidTransition {
                from: Phase::Creation,
                to: Phase::Finalization,
            },
        };
        assert_eq!(
            err.to_string(),
            "amendment of FUND-001 rejected (phase-gate): invalid transition from CREATION to FINALIZATION"
        );
    }
}
