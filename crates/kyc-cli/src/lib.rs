//! # kyc-cli — Command-Line Front End for the KYC Case Stack
//!
//! Provides the `kycctl` binary.
//!
//! ## Subcommands
//!
//! - `kycctl create <file>` — store a new case from a snapshot file.
//! - `kycctl amend <case> --step <label>` — apply one lifecycle step.
//! - `kycctl versions <case>`, `kycctl cases`, `kycctl history <case>`,
//!   `kycctl show <case> [--version n]`, `kycctl phase <case>` — read side.
//! - `kycctl validate <case> [--version n] [--actor name]` — validate a
//!   stored version and log the verdict; `kycctl validations <case>` shows
//!   the log.
//! - `kycctl derive --attributes <json> --rules <yaml> [--explain]` —
//!   offline derived-attribute evaluation.
//!
//! Every command except `derive` needs `DATABASE_URL`.
//!
//! ```bash
//! export DATABASE_URL=postgres://kyc@localhost/kyc
//! kycctl create cases/fund-001.kyc
//! kycctl amend FUND-001 --step policy-discovery
//! kycctl history FUND-001
//! ```

pub mod case;
pub mod derive;
