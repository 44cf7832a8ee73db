//! # Amendment Pipeline
//!
//! Applies one mutation to the latest version of a case and records the
//! result as a new version plus an audit entry.
//!
//! ## Steps
//!
//! ```text
//!  1. load latest version            store
//!  2. parse, require exactly one     codec
//!  3. serialize as `old`             codec   (canonical form, not the stored text)
//!     phase gate                     kyc-state (actions only)
//!  4. mutate in place
//!  5. serialize as `new`             codec
//!  6. validate, log verdict          codec, store
//!  7. diff old → new
//!  8. allocate max+1, insert version store
//!  9. insert amendment record        store
//! ```
//!
//! Step 6 logs every verdict, passing or failing, to the store's
//! validation history. Apart from that row nothing is written before step
//! 8, so a rejected amendment leaves only a `FAIL` verdict behind. Steps 8
//! and 9 are separate writes: if step 9 fails the version stays,
//! unaudited, and the error reports [`Step::RecordAmendment`].
//!
//! ## Validation checks
//!
//! `structure` always runs; `schema` runs when
//! [`AmendConfig::schema_ref`] is set. Checks stop at the first failure,
//! whose message is logged prefixed with the check name.
//!
//! ## Concurrency
//!
//! Amendments to the same case are serialized by a per-case lock held from
//! step 1 through step 9. Writers in other processes are caught by the
//! store's `(case, version)` uniqueness and surface as
//! [`AmendError::Concurrency`]; re-running the amendment re-reads the
//! latest version. The pipeline never retries on its own.
//!
//! ## Deadlines
//!
//! Every codec and store call runs under [`AmendConfig::call_timeout`]. A
//! breach is [`AmendError::Timeout`] for the step that was running.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;

use kyc_core::{snapshot_digest, Case, CaseName, CaseStatus};
use kyc_dsl::{CaseCodec, CodecError};
use kyc_state::{check_action, current_phase, Action, Phase};

use crate::classify::{classify_change, CASE_CREATION};
use crate::config::{AmendConfig, PhasePolicy};
use crate::diff::generate_diff;
use crate::error::{AmendError, Step, StoreError};
use crate::lock::CaseLocks;
use crate::store::{
    CaseVersion, NewAmendment, NewValidation, NewVersion, ValidationRecord, ValidationStatus,
    VersionStore,
};

/// Step label of verdicts logged by [`Amender::validate`].
pub const VALIDATE_STEP: &str = "validate";

/// What a successful amendment wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmendmentOutcome {
    pub case_name: String,
    pub step: String,
    pub version: u32,
    /// Lowercase hex SHA-256 of the new snapshot.
    pub content_hash: String,
    pub classification: String,
    pub diff: String,
    /// Phase inferred from the amended case.
    pub phase: Phase,
    pub status: CaseStatus,
    /// Id of the amendment record.
    pub audit_id: i64,
}

impl AmendmentOutcome {
    /// First twelve hex characters of the content hash.
    pub fn short_hash(&self) -> &str {
        self.content_hash
            .get(..kyc_core::SHORT_HASH_LEN)
            .unwrap_or(&self.content_hash)
    }
}

/// Runs amendments against a version store through a case codec.
pub struct Amender {
    store: Arc<dyn VersionStore>,
    codec: Arc<dyn CaseCodec>,
    config: AmendConfig,
    locks: CaseLocks,
}

impl std::fmt::Debug for Amender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Amender")
            .field("config", &self.config)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl Amender {
    pub fn new(store: Arc<dyn VersionStore>, codec: Arc<dyn CaseCodec>, config: AmendConfig) -> Self {
        Self {
            store,
            codec,
            config,
            locks: CaseLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn VersionStore> {
        &self.store
    }

    pub fn config(&self) -> &AmendConfig {
        &self.config
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Apply an arbitrary mutation, recorded under `step_label`.
    ///
    /// No phase gate runs: the pipeline cannot know which phase an
    /// arbitrary closure moves the case to.
    pub async fn apply<F>(
        &self,
        case: &CaseName,
        step_label: &str,
        mutation: F,
    ) -> Result<AmendmentOutcome, AmendError>
    where
        F: FnOnce(&mut Case) + Send,
    {
        self.amend(case, step_label, None, mutation).await
    }

    /// Apply a library action, gated by the phase registry according to
    /// [`AmendConfig::phase_policy`].
    pub async fn apply_action(
        &self,
        case: &CaseName,
        action: Action,
    ) -> Result<AmendmentOutcome, AmendError> {
        self.amend(case, action.step_label(), Some(action), |c| action.apply(c))
            .await
    }

    /// Parse `snapshot`, validate it, and store it as version 1 of a new case.
    pub async fn create_case(&self, snapshot: &str) -> Result<AmendmentOutcome, AmendError> {
        const DOCUMENT: &str = "<document>";
        let cases = self
            .codec_call(DOCUMENT, Step::Parse, self.codec.parse(snapshot))
            .await?;
        let case = exactly_one(DOCUMENT, cases)?;
        self.create(case).await
    }

    /// Store `case` as version 1 of a new case.
    pub async fn create(&self, case: Case) -> Result<AmendmentOutcome, AmendError> {
        let name = case.name.to_string();
        let _guard = self.locks.acquire(&name).await;

        match self
            .deadline(&name, Step::Load, self.store.latest_version(&name))
            .await?
        {
            Ok(existing) => {
                return Err(AmendError::Concurrency {
                    case: name,
                    step: Step::Load,
                    version: existing.version,
                })
            }
            Err(StoreError::NotFound { .. }) => {}
            Err(e) => return Err(AmendError::from_store(&name, Step::Load, e)),
        }

        let new = self
            .codec_call(&name, Step::Serialize, self.codec.serialize(std::slice::from_ref(&case)))
            .await?;
        self.require_valid(&name, 0, CASE_CREATION, &case).await?;
        let diff = generate_diff("", &new);
        self.persist(&case, CASE_CREATION, new, diff).await
    }

    async fn amend<F>(
        &self,
        name: &CaseName,
        step_label: &str,
        gate: Option<Action>,
        mutation: F,
    ) -> Result<AmendmentOutcome, AmendError>
    where
        F: FnOnce(&mut Case) + Send,
    {
        let name = name.as_str();
        let _guard = self.locks.acquire(name).await;

        tracing::debug!(case = name, step = step_label, "loading latest version");
        let latest = self
            .store_call(name, Step::Load, self.store.latest_version(name))
            .await?;

        let mut case = self.reconstruct(name, &latest).await?;
        let old = self
            .codec_call(name, Step::Serialize, self.codec.serialize(std::slice::from_ref(&case)))
            .await?;

        if let Some(action) = gate {
            self.check_phase(name, &case, action)?;
        }

        mutation(&mut case);

        let new = self
            .codec_call(name, Step::Serialize, self.codec.serialize(std::slice::from_ref(&case)))
            .await?;
        tracing::debug!(case = name, step = step_label, "validating amended case");
        self.require_valid(name, latest.version, step_label, &case)
            .await?;

        let diff = generate_diff(&old, &new);
        self.persist(&case, step_label, new, diff).await
    }

    /// Steps 8 and 9.
    async fn persist(
        &self,
        case: &Case,
        step_label: &str,
        snapshot: String,
        diff: String,
    ) -> Result<AmendmentOutcome, AmendError> {
        let name = case.name.as_str();
        let digest = snapshot_digest(&snapshot);

        let version = self
            .store_call(name, Step::Allocate, self.store.next_version_number(name))
            .await?;
        tracing::debug!(case = name, version, "allocated version");

        let stored = self
            .store_call(
                name,
                Step::PersistVersion,
                self.store.insert_version(NewVersion {
                    case_name: name.to_string(),
                    version,
                    snapshot,
                    content_hash: digest.to_hex(),
                    status: case.status,
                }),
            )
            .await
            .map_err(|e| {
                if let AmendError::Concurrency { version, .. } = &e {
                    tracing::warn!(case = name, version, "lost version race to another writer");
                }
                e
            })?;

        let classification = classify_change(step_label, case);
        let record = self
            .store_call(
                name,
                Step::RecordAmendment,
                self.store.insert_amendment(NewAmendment {
                    case_name: name.to_string(),
                    step: step_label.to_string(),
                    classification: classification.clone(),
                    diff: diff.clone(),
                }),
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    case = name,
                    version = stored.version,
                    error = %e,
                    "version stored without amendment record"
                );
                e
            })?;

        tracing::info!(
            case = name,
            step = step_label,
            version = stored.version,
            hash = %digest.short(),
            classification = %classification,
            "amendment recorded"
        );

        Ok(AmendmentOutcome {
            case_name: name.to_string(),
            step: step_label.to_string(),
            version: stored.version,
            content_hash: stored.content_hash,
            classification,
            diff,
            phase: current_phase(case),
            status: case.status,
            audit_id: record.id,
        })
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Load a case at `version`, or at its latest version.
    pub async fn load(
        &self,
        case: &CaseName,
        version: Option<u32>,
    ) -> Result<(CaseVersion, Case), AmendError> {
        let name = case.as_str();
        let stored = match version {
            Some(v) => {
                self.store_call(name, Step::Load, self.store.get_version(name, v))
                    .await?
            }
            None => {
                self.store_call(name, Step::Load, self.store.latest_version(name))
                    .await?
            }
        };
        let parsed = self.reconstruct(name, &stored).await?;
        Ok((stored, parsed))
    }

    /// Validate a stored version of `case` and log the verdict under
    /// `actor`.
    ///
    /// A failing case is not an error: the returned record carries
    /// [`ValidationStatus::Fail`] and the message. Errors are reserved for
    /// load, timeout, and store failures.
    pub async fn validate(
        &self,
        case: &CaseName,
        version: Option<u32>,
        actor: &str,
    ) -> Result<ValidationRecord, AmendError> {
        let (stored, parsed) = self.load(case, version).await?;
        let name = case.as_str();
        let verdict = self.run_checks(name, &parsed).await?;
        let entry = verdict.entry(name, stored.version, VALIDATE_STEP, actor, &self.config);
        let record = self
            .store_call(name, Step::RecordValidation, self.store.insert_validation(entry))
            .await?;
        tracing::info!(
            case = name,
            version = record.version,
            status = %record.status,
            actor,
            "validation recorded"
        );
        Ok(record)
    }

    /// Validation history of `case`, newest first.
    pub async fn validations(&self, case: &CaseName) -> Result<Vec<ValidationRecord>, AmendError> {
        let name = case.as_str();
        self.store_call(name, Step::Load, self.store.list_validations(name))
            .await
    }

    /// Phase of the latest version of `case`.
    pub async fn current_phase(&self, case: &CaseName) -> Result<Phase, AmendError> {
        let (_, parsed) = self.load(case, None).await?;
        Ok(current_phase(&parsed))
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Run the checks in order, stopping at the first failure.
    async fn run_checks(&self, name: &str, case: &Case) -> Result<Verdict, AmendError> {
        let mut checks: Vec<(&'static str, Option<&str>)> = vec![("structure", None)];
        if let Some(schema_ref) = self.config.schema_ref.as_deref() {
            checks.push(("schema", Some(schema_ref)));
        }
        let mut verdict = Verdict {
            total: checks.len() as u32,
            passed: 0,
            failure: None,
        };
        for (check, schema_ref) in checks {
            let outcome = self
                .deadline(name, Step::Validate, self.codec.validate(case, schema_ref))
                .await?;
            if let Err(e) = outcome {
                let err = AmendError::from_codec(name, Step::Validate, e);
                let detail = match &err {
                    AmendError::Validation { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                verdict.failure = Some((format!("{check}: {detail}"), err));
                break;
            }
            verdict.passed += 1;
        }
        Ok(verdict)
    }

    /// Step 6: validate and log the verdict. A failing case is returned as
    /// the validation error whether or not its verdict could be logged; a
    /// passing case whose verdict cannot be logged is not persisted.
    async fn require_valid(
        &self,
        name: &str,
        base_version: u32,
        step_label: &str,
        case: &Case,
    ) -> Result<(), AmendError> {
        let verdict = self.run_checks(name, case).await?;
        let entry = verdict.entry(name, base_version, step_label, &self.config.actor, &self.config);
        let logged = self
            .store_call(name, Step::RecordValidation, self.store.insert_validation(entry))
            .await;
        match (verdict.failure, logged) {
            (Some((message, err)), logged) => {
                if let Err(log_err) = logged {
                    tracing::warn!(case = name, error = %log_err, "failed verdict not recorded");
                }
                tracing::warn!(case = name, step = step_label, %message, "validation failed");
                Err(err)
            }
            (None, Err(e)) => Err(e),
            (None, Ok(record)) => {
                tracing::debug!(case = name, id = record.id, "validation passed");
                Ok(())
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    async fn reconstruct(&self, name: &str, stored: &CaseVersion) -> Result<Case, AmendError> {
        let cases = self
            .codec_call(name, Step::Parse, self.codec.parse(&stored.snapshot))
            .await?;
        let case = exactly_one(name, cases)?;
        if case.name.as_str() != name {
            return Err(AmendError::Bind {
                case: name.to_string(),
                step: Step::Parse,
                reason: format!("snapshot describes case {}", case.name),
            });
        }
        Ok(case)
    }

    fn check_phase(&self, name: &str, case: &Case, action: Action) -> Result<(), AmendError> {
        let Err(source) = check_action(case, &action) else {
            return Ok(());
        };
        match self.config.phase_policy {
            PhasePolicy::Enforce => Err(AmendError::InvalidTransition {
                case: name.to_string(),
                step: Step::Gate,
                source,
            }),
            PhasePolicy::Advisory => {
                tracing::warn!(
                    case = name,
                    action = %action,
                    error = %source,
                    "phase violation ignored under advisory policy"
                );
                Ok(())
            }
        }
    }

    async fn deadline<T>(
        &self,
        case: &str,
        step: Step,
        fut: impl Future<Output = T>,
    ) -> Result<T, AmendError> {
        tokio::time::timeout(self.config.call_timeout, fut)
            .await
            .map_err(|_| AmendError::Timeout {
                case: case.to_string(),
                step,
                after: self.config.call_timeout,
            })
    }

    async fn store_call<T>(
        &self,
        case: &str,
        step: Step,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AmendError> {
        self.deadline(case, step, fut)
            .await?
            .map_err(|e| AmendError::from_store(case, step, e))
    }

    async fn codec_call<T>(
        &self,
        case: &str,
        step: Step,
        fut: impl Future<Output = Result<T, CodecError>>,
    ) -> Result<T, AmendError> {
        self.deadline(case, step, fut)
            .await?
            .map_err(|e| AmendError::from_codec(case, step, e))
    }
}

/// Result of running the validation checks on one case.
#[derive(Debug)]
struct Verdict {
    total: u32,
    passed: u32,
    /// Prefixed message and error of the first failing check.
    failure: Option<(String, AmendError)>,
}

impl Verdict {
    fn entry(
        &self,
        name: &str,
        version: u32,
        step: &str,
        actor: &str,
        config: &AmendConfig,
    ) -> NewValidation {
        let failed = u32::from(self.failure.is_some());
        NewValidation {
            case_name: name.to_string(),
            version,
            step: step.to_string(),
            actor: actor.to_string(),
            schema_ref: config.schema_ref.clone(),
            status: if self.failure.is_some() {
                ValidationStatus::Fail
            } else {
                ValidationStatus::Pass
            },
            error_message: self.failure.as_ref().map(|(message, _)| message.clone()),
            total_checks: self.total,
            passed_checks: self.passed,
            failed_checks: failed,
        }
    }
}

fn exactly_one(name: &str, cases: Vec<Case>) -> Result<Case, AmendError> {
    let count = cases.len();
    let mut cases = cases.into_iter();
    match (cases.next(), count) {
        (Some(case), 1) => Ok(case),
        _ => Err(AmendError::Bind {
            case: name.to_string(),
            step: Step::Parse,
            reason: format!("expected exactly one case in snapshot, found {count}"),
        }),
    }
}
