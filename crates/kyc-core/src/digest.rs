//! # Content Digest — Snapshot Hashes
//!
//! Every stored version carries a SHA-256 digest of its exact snapshot
//! text, rendered as lowercase hex. Audit displays usually show only the
//! first [`SHORT_HASH_LEN`] characters.
//!
//! ## Invariant
//!
//! The digest is computed over the stored bytes, with no normalisation.
//! Two snapshots that differ only in trailing whitespace have different
//! digests. Digests are never used to deduplicate versions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters shown in human-facing hash displays.
pub const SHORT_HASH_LEN: usize = 12;

/// The hash algorithm used to produce a content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-256.
    Sha256,
}

impl DigestAlgorithm {
    /// Returns the algorithm identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content digest with its algorithm tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Create a new content digest from raw bytes and algorithm.
    pub fn new(algorithm: DigestAlgorithm, bytes: [u8; 32]) -> Self {
        Self { algorithm, bytes }
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// The first [`SHORT_HASH_LEN`] hex characters.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(SHORT_HASH_LEN);
        hex
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Compute the SHA-256 digest of a snapshot's exact text.
pub fn snapshot_digest(snapshot: &str) -> ContentDigest {
    let hash = Sha256::digest(snapshot.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest::new(DigestAlgorithm::Sha256, bytes)
}

/// Lowercase hex SHA-256 of a snapshot, the form persisted alongside versions.
pub fn snapshot_hash(snapshot: &str) -> String {
    snapshot_digest(snapshot).to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_digest_deterministic() {
        let text = "(kyc-case FUND-001\n)\n";
        assert_eq!(snapshot_digest(text), snapshot_digest(text));
        assert_eq!(snapshot_digest(text).algorithm, DigestAlgorithm::Sha256);
    }

    #[test]
    fn test_known_sha256_vector() {
        // SHA256("") is the well-known empty-input digest.
        assert_eq!(
            snapshot_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hex_is_lowercase_64_chars() {
        let hex = snapshot_hash("(kyc-case X)");
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_short_is_prefix_of_full_hex() {
        let digest = snapshot_digest("(kyc-case X)");
        let short = digest.short();
        assert_eq!(short.len(), SHORT_HASH_LEN);
        assert!(digest.to_hex().starts_with(&short));
    }

    #[test]
    fn test_whitespace_changes_digest() {
        assert_ne!(snapshot_hash("(kyc-case X)"), snapshot_hash("(kyc-case X) "));
    }

    #[test]
    fn test_content_digest_display() {
        let s = snapshot_digest("abc").to_string();
        assert!(s.starts_with("sha256:"));
        assert_eq!(s.len(), 7 + 64);
    }
}
