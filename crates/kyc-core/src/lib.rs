//! # kyc-core — Foundational Types for the KYC Case Stack
//!
//! Every other crate in the workspace depends on `kyc-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **One case model.** [`Case`] is the structured form of a snapshot. The
//!    amendment pipeline, the phase inference, and the mutation library all
//!    operate on this single definition.
//!
//! 2. **Validated case names.** [`CaseName`] rejects names that could not be
//!    written back into a snapshot as a bare atom (empty, whitespace,
//!    parentheses, quotes).
//!
//! 3. **Digests over exact snapshot text.** [`snapshot_digest()`] hashes the
//!    bytes that are stored, not a re-encoding of them. The digest is for
//!    audit display; identical content still receives a new version.
//!
//! 4. **UTC-only timestamps.** [`Timestamp`] is always UTC with seconds
//!    precision.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `kyc-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod digest;
pub mod error;
pub mod identity;
pub mod model;
pub mod tags;
pub mod temporal;

pub use digest::{snapshot_digest, snapshot_hash, ContentDigest, DigestAlgorithm, SHORT_HASH_LEN};
pub use error::KycError;
pub use identity::CaseName;
pub use model::{
    Case, CaseStatus, FunctionMarker, Obligation, OwnerStake, OwnershipStructure, Policy,
    RoleAssignment, Token,
};
pub use temporal::Timestamp;
