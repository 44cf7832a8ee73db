//! Postgres version store.
//!
//! Tables are created by the embedded migrations in `migrations/`.
//! Queries are checked at runtime, so building the crate does not need a
//! database. A unique-violation on `(case_name, version)` is reported as
//! [`StoreError::Conflict`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use kyc_core::{CaseStatus, Timestamp};

use super::{
    AmendmentRecord, CaseSummary, CaseVersion, NewAmendment, NewValidation, NewVersion,
    ValidationRecord, VersionInfo, VersionStore,
};
use crate::error::StoreError;

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone)]
pub struct PgVersionStore {
    pool: PgPool,
}

impl PgVersionStore {
    /// Connect to `url` and apply pending migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        tracing::info!("connected to PostgreSQL");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tracing::info!("version store migrations applied");

        Ok(Self { pool })
    }

    /// Wrap an existing pool. The schema must already be migrated.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ─── Rows ────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct VersionRow {
    case_name: String,
    version: i32,
    dsl_snapshot: String,
    hash: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<VersionRow> for CaseVersion {
    type Error = StoreError;

    fn try_from(row: VersionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            version: to_version(row.version)?,
            status: to_status(&row.status)?,
            case_name: row.case_name,
            snapshot: row.dsl_snapshot,
            content_hash: row.hash,
            created_at: Timestamp::from_utc(row.created_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct VersionInfoRow {
    version: i32,
    hash: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CaseSummaryRow {
    case_name: String,
    version_count: i64,
    status: String,
    last_updated: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct AmendmentRow {
    id: i64,
    case_name: String,
    step: String,
    change_type: String,
    diff: String,
    created_at: DateTime<Utc>,
}

impl From<AmendmentRow> for AmendmentRecord {
    fn from(row: AmendmentRow) -> Self {
        Self {
            id: row.id,
            case_name: row.case_name,
            step: row.step,
            classification: row.change_type,
            diff: row.diff,
            created_at: Timestamp::from_utc(row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ValidationRow {
    id: i64,
    case_name: String,
    version: i32,
    step: String,
    validator_actor: String,
    schema_ref: Option<String>,
    validation_status: String,
    error_message: Option<String>,
    total_checks: i32,
    passed_checks: i32,
    failed_checks: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<ValidationRow> for ValidationRecord {
    type Error = StoreError;

    fn try_from(row: ValidationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            version: to_version(row.version)?,
            status: row.validation_status.parse()?,
            total_checks: to_count(row.total_checks)?,
            passed_checks: to_count(row.passed_checks)?,
            failed_checks: to_count(row.failed_checks)?,
            case_name: row.case_name,
            step: row.step,
            actor: row.validator_actor,
            schema_ref: row.schema_ref,
            error_message: row.error_message,
            created_at: Timestamp::from_utc(row.created_at),
        })
    }
}

fn to_count(n: i32) -> Result<u32, StoreError> {
    u32::try_from(n).map_err(|_| StoreError::Backend(format!("negative check count {n}")))
}

fn to_version(v: i32) -> Result<u32, StoreError> {
    u32::try_from(v).map_err(|_| StoreError::Backend(format!("negative version number {v}")))
}

fn to_status(s: &str) -> Result<CaseStatus, StoreError> {
    s.parse::<CaseStatus>()
        .map_err(|e| StoreError::Backend(e.to_string()))
}

fn from_version(v: u32) -> Result<i32, StoreError> {
    i32::try_from(v).map_err(|_| StoreError::Backend(format!("version number {v} out of range")))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

// ─── Store ───────────────────────────────────────────────────────────

#[async_trait]
impl VersionStore for PgVersionStore {
    async fn latest_version(&self, case: &str) -> Result<CaseVersion, StoreError> {
        let row = sqlx::query_as::<_, VersionRow>(
            "SELECT case_name, version, dsl_snapshot, hash, status, created_at
             FROM kyc_case_versions
             WHERE case_name = $1
             ORDER BY version DESC
             LIMIT 1",
        )
        .bind(case)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| StoreError::NotFound {
            case: case.to_string(),
        })?
        .try_into()
    }

    async fn next_version_number(&self, case: &str) -> Result<u32, StoreError> {
        let next: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM kyc_case_versions WHERE case_name = $1",
        )
        .bind(case)
        .fetch_one(&self.pool)
        .await?;
        to_version(next)
    }

    async fn insert_version(&self, version: NewVersion) -> Result<CaseVersion, StoreError> {
        let row = sqlx::query_as::<_, VersionRow>(
            "INSERT INTO kyc_case_versions (case_name, version, dsl_snapshot, hash, status, created_at)
             VALUES ($1, $2, $3, $4, $5, NOW())
             RETURNING case_name, version, dsl_snapshot, hash, status, created_at",
        )
        .bind(&version.case_name)
        .bind(from_version(version.version)?)
        .bind(&version.snapshot)
        .bind(&version.content_hash)
        .bind(version.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict {
                    case: version.case_name.clone(),
                    version: version.version,
                }
            } else {
                StoreError::from(e)
            }
        })?;
        row.try_into()
    }

    async fn insert_amendment(&self, amendment: NewAmendment) -> Result<AmendmentRecord, StoreError> {
        let row = sqlx::query_as::<_, AmendmentRow>(
            "INSERT INTO kyc_case_amendments (case_name, step, change_type, diff, created_at)
             VALUES ($1, $2, $3, $4, NOW())
             RETURNING id, case_name, step, change_type, diff, created_at",
        )
        .bind(&amendment.case_name)
        .bind(&amendment.step)
        .bind(&amendment.classification)
        .bind(&amendment.diff)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_versions(&self, case: &str) -> Result<Vec<VersionInfo>, StoreError> {
        let rows = sqlx::query_as::<_, VersionInfoRow>(
            "SELECT version, hash, created_at
             FROM kyc_case_versions
             WHERE case_name = $1
             ORDER BY version ASC",
        )
        .bind(case)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(VersionInfo {
                    version: to_version(row.version)?,
                    content_hash: row.hash,
                    created_at: Timestamp::from_utc(row.created_at),
                })
            })
            .collect()
    }

    async fn list_cases(&self) -> Result<Vec<CaseSummary>, StoreError> {
        let rows = sqlx::query_as::<_, CaseSummaryRow>(
            "SELECT v.case_name, c.version_count, v.status, c.last_updated
             FROM kyc_case_versions v
             JOIN (
                 SELECT case_name,
                        COUNT(*) AS version_count,
                        MAX(version) AS latest,
                        MAX(created_at) AS last_updated
                 FROM kyc_case_versions
                 GROUP BY case_name
             ) c ON c.case_name = v.case_name AND c.latest = v.version
             ORDER BY c.last_updated DESC, v.case_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(CaseSummary {
                    version_count: u32::try_from(row.version_count).map_err(|_| {
                        StoreError::Backend(format!("version count {} out of range", row.version_count))
                    })?,
                    status: to_status(&row.status)?,
                    name: row.case_name,
                    last_updated: Timestamp::from_utc(row.last_updated),
                })
            })
            .collect()
    }

    async fn get_version(&self, case: &str, version: u32) -> Result<CaseVersion, StoreError> {
        let row = sqlx::query_as::<_, VersionRow>(
            "SELECT case_name, version, dsl_snapshot, hash, status, created_at
             FROM kyc_case_versions
             WHERE case_name = $1 AND version = $2",
        )
        .bind(case)
        .bind(from_version(version)?)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| StoreError::NotFound {
            case: case.to_string(),
        })?
        .try_into()
    }

    async fn list_amendments(&self, case: &str) -> Result<Vec<AmendmentRecord>, StoreError> {
        let rows = sqlx::query_as::<_, AmendmentRow>(
            "SELECT id, case_name, step, change_type, diff, created_at
             FROM kyc_case_amendments
             WHERE case_name = $1
             ORDER BY id ASC",
        )
        .bind(case)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AmendmentRecord::from).collect())
    }

    async fn insert_validation(&self, validation: NewValidation) -> Result<ValidationRecord, StoreError> {
        let row = sqlx::query_as::<_, ValidationRow>(
            "INSERT INTO kyc_case_validations
                 (case_name, version, step, validator_actor, schema_ref, validation_status,
                  error_message, total_checks, passed_checks, failed_checks, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
             RETURNING id, case_name, version, step, validator_actor, schema_ref,
                       validation_status, error_message, total_checks, passed_checks,
                       failed_checks, created_at",
        )
        .bind(&validation.case_name)
        .bind(from_version(validation.version)?)
        .bind(&validation.step)
        .bind(&validation.actor)
        .bind(&validation.schema_ref)
        .bind(validation.status.as_str())
        .bind(&validation.error_message)
        .bind(from_count(validation.total_checks)?)
        .bind(from_count(validation.passed_checks)?)
        .bind(from_count(validation.failed_checks)?)
        .fetch_one(&self.pool)
        .await?;
        tracing::debug!(
            case = %validation.case_name,
            status = %validation.status,
            id = row.id,
            "validation recorded"
        );
        row.try_into()
    }

    async fn list_validations(&self, case: &str) -> Result<Vec<ValidationRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ValidationRow>(
            "SELECT id, case_name, version, step, validator_actor, schema_ref,
                    validation_status, error_message, total_checks, passed_checks,
                    failed_checks, created_at
             FROM kyc_case_validations
             WHERE case_name = $1
             ORDER BY created_at DESC, id DESC",
        )
        .bind(case)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ValidationRecord::try_from).collect()
    }
}

fn from_count(n: u32) -> Result<i32, StoreError> {
    i32::try_from(n).map_err(|_| StoreError::Backend(format!("check count {n} out of range")))
}
