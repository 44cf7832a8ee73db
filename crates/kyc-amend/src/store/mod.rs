//! # Version Store
//!
//! Persistence contract for case versions and the amendment log.
//!
//! ## Tables
//!
//! - **versions**: one row per `(case, version)`, holding the exact
//!   snapshot text, its SHA-256 hex digest, and the case's overall status.
//!   `(case, version)` is unique; a second insert of the same pair fails
//!   with [`StoreError::Conflict`].
//! - **amendments**: append-only log of `(case, step, classification, diff)`.
//! - **validations**: append-only log of every validation verdict, passing
//!   or failing, with the actor that requested it and the check counts.
//!   A rejected amendment leaves a `FAIL` row here and nothing else.
//!
//! The tables are written independently. A version may exist without an
//! amendment record if the second write fails.
//!
//! ## Implementations
//!
//! - [`MemoryVersionStore`]: process-local, for tests and offline use.
//! - [`PgVersionStore`]: Postgres via `sqlx`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;

use kyc_core::{CaseStatus, Timestamp};

use crate::error::StoreError;

pub use memory::MemoryVersionStore;
pub use postgres::PgVersionStore;

/// A stored version of a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseVersion {
    pub case_name: String,
    pub version: u32,
    /// Exact snapshot text.
    pub snapshot: String,
    /// Lowercase hex SHA-256 of `snapshot`.
    pub content_hash: String,
    pub status: CaseStatus,
    pub created_at: Timestamp,
}

/// A version about to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVersion {
    pub case_name: String,
    pub version: u32,
    pub snapshot: String,
    pub content_hash: String,
    pub status: CaseStatus,
}

/// Version listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub version: u32,
    pub content_hash: String,
    pub created_at: Timestamp,
}

/// One row of the case listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseSummary {
    pub name: String,
    pub version_count: u32,
    /// Status recorded with the latest version.
    pub status: CaseStatus,
    pub last_updated: Timestamp,
}

/// An amendment log entry about to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAmendment {
    pub case_name: String,
    pub step: String,
    pub classification: String,
    pub diff: String,
}

/// A stored amendment log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmendmentRecord {
    pub id: i64,
    pub case_name: String,
    pub step: String,
    pub classification: String,
    pub diff: String,
    pub created_at: Timestamp,
}

/// Verdict of one validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Pass,
    Fail,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ValidationStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(Self::Pass),
            "FAIL" => Ok(Self::Fail),
            other => Err(StoreError::Backend(format!(
                "unknown validation status {other:?}"
            ))),
        }
    }
}

/// A validation verdict about to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewValidation {
    pub case_name: String,
    /// Stored version the validated content was derived from; `0` for a
    /// case that has no stored version yet.
    pub version: u32,
    /// Step label of the amendment, `CASE-CREATION`, or `validate`.
    pub step: String,
    pub actor: String,
    pub schema_ref: Option<String>,
    pub status: ValidationStatus,
    /// First failing check, prefixed with its name.
    pub error_message: Option<String>,
    pub total_checks: u32,
    pub passed_checks: u32,
    pub failed_checks: u32,
}

/// A stored validation verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRecord {
    pub id: i64,
    pub case_name: String,
    pub version: u32,
    pub step: String,
    pub actor: String,
    pub schema_ref: Option<String>,
    pub status: ValidationStatus,
    pub error_message: Option<String>,
    pub total_checks: u32,
    pub passed_checks: u32,
    pub failed_checks: u32,
    pub created_at: Timestamp,
}

impl ValidationRecord {
    pub(crate) fn stored(id: i64, v: NewValidation, created_at: Timestamp) -> Self {
        Self {
            id,
            case_name: v.case_name,
            version: v.version,
            step: v.step,
            actor: v.actor,
            schema_ref: v.schema_ref,
            status: v.status,
            error_message: v.error_message,
            total_checks: v.total_checks,
            passed_checks: v.passed_checks,
            failed_checks: v.failed_checks,
            created_at,
        }
    }
}

/// Storage for case versions, amendment records, and validation verdicts.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Highest-numbered version of `case`, or [`StoreError::NotFound`].
    async fn latest_version(&self, case: &str) -> Result<CaseVersion, StoreError>;

    /// Current maximum version of `case` plus one; `1` for an unknown case.
    async fn next_version_number(&self, case: &str) -> Result<u32, StoreError>;

    async fn insert_version(&self, version: NewVersion) -> Result<CaseVersion, StoreError>;

    async fn insert_amendment(&self, amendment: NewAmendment) -> Result<AmendmentRecord, StoreError>;

    /// Versions of `case`, oldest first. Empty for an unknown case.
    async fn list_versions(&self, case: &str) -> Result<Vec<VersionInfo>, StoreError>;

    /// Every case, most recently updated first.
    async fn list_cases(&self) -> Result<Vec<CaseSummary>, StoreError>;

    async fn get_version(&self, case: &str, version: u32) -> Result<CaseVersion, StoreError>;

    /// Amendment log of `case`, oldest first.
    async fn list_amendments(&self, case: &str) -> Result<Vec<AmendmentRecord>, StoreError>;

    async fn insert_validation(&self, validation: NewValidation) -> Result<ValidationRecord, StoreError>;

    /// Validation history of `case`, newest first.
    async fn list_validations(&self, case: &str) -> Result<Vec<ValidationRecord>, StoreError>;
}
