//! # Function Action Tags
//!
//! The marker vocabulary written into `(function ...)` entries. Phase
//! inference, the phase registry, the mutation library, and snapshot
//! validation all key off these strings.

pub const DISCOVER_POLICIES: &str = "DISCOVER-POLICIES";
pub const SOLICIT_DOCUMENTS: &str = "SOLICIT-DOCUMENTS";
pub const EXTRACT_DATA: &str = "EXTRACT-DATA";
pub const BUILD_OWNERSHIP_TREE: &str = "BUILD-OWNERSHIP-TREE";
pub const VERIFY_OWNERSHIP: &str = "VERIFY-OWNERSHIP";
pub const ASSESS_RISK: &str = "ASSESS-RISK";
pub const REGULATOR_NOTIFY: &str = "REGULATOR-NOTIFY";

/// Every tag a snapshot may carry.
pub const KNOWN: &[&str] = &[
    DISCOVER_POLICIES,
    SOLICIT_DOCUMENTS,
    EXTRACT_DATA,
    BUILD_OWNERSHIP_TREE,
    VERIFY_OWNERSHIP,
    ASSESS_RISK,
    REGULATOR_NOTIFY,
];

/// Whether `action` is part of the marker vocabulary.
pub fn is_known(action: &str) -> bool {
    KNOWN.contains(&action)
}
