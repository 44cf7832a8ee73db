//! # kyc-dsl — Snapshot Codec
//!
//! Every case version is stored as snapshot text, an S-expression
//! document. This crate reads that text into [`Case`](kyc_core::Case)
//! values, writes cases back out in a deterministic layout, and validates
//! them before a new version is accepted.
//!
//! ```text
//! text ──read_all──▶ Sexpr tree ──bind_document──▶ Vec<Case>
//!  ▲                                                  │
//!  └──────────────── serialize_cases ◀────────────────┘
//! ```
//!
//! The [`CaseCodec`] trait is the seam the amendment pipeline depends on;
//! [`SexprCodec`] implements it in-process.

pub mod bind;
pub mod codec;
pub mod error;
pub mod serialize;
pub mod sexpr;
pub mod validate;

pub use bind::bind_document;
pub use codec::{CaseCodec, SexprCodec};
pub use error::{CodecError, Violation, Violations};
pub use serialize::{serialize_case, serialize_cases};
pub use sexpr::{read_all, Sexpr};
pub use validate::{structural_violations, validate_case, SchemaRegistry, KYC_CASE_SCHEMA};
