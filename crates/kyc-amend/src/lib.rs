//! # kyc-amend — Versioned Case Amendments
//!
//! Every change to a case goes through [`Amender`]: the latest snapshot is
//! loaded and parsed, the mutation is applied, the result is serialized,
//! validated, diffed against the canonical form of the previous version,
//! and stored as the next version together with an amendment record.
//! Every validation verdict, passing or failing, is logged with the actor
//! it is attributed to.
//!
//! ## Modules
//!
//! - [`pipeline`]: the [`Amender`] and its outcome type.
//! - [`store`]: the [`VersionStore`] contract with in-memory and Postgres
//!   implementations.
//! - [`diff`]: positional line diff recorded in the amendment log.
//! - [`classify`]: step label to change classification.
//! - [`lock`]: per-case amendment serialization.
//! - [`config`]: deadlines, schema reference, phase policy, and actor.
//!
//! ## Crate Policy
//!
//! - No case writes before validation succeeds; only the verdict is logged.
//! - No automatic retries; callers re-run on [`AmendError::Concurrency`].

pub mod classify;
pub mod config;
pub mod diff;
pub mod error;
pub mod lock;
pub mod pipeline;
pub mod store;

pub use classify::{classify_change, CASE_CREATION, GENERIC_AMENDMENT};
pub use config::{AmendConfig, ConfigError, PhasePolicy, DEFAULT_ACTOR};
pub use diff::{generate_diff, NO_CHANGES, STRUCTURAL_ONLY};
pub use error::{AmendError, Step, StoreError};
pub use lock::CaseLocks;
pub use pipeline::{Amender, AmendmentOutcome, VALIDATE_STEP};
pub use store::{
    AmendmentRecord, CaseSummary, CaseVersion, MemoryVersionStore, NewAmendment, NewValidation,
    NewVersion, PgVersionStore, ValidationRecord, ValidationStatus, VersionInfo, VersionStore,
};
