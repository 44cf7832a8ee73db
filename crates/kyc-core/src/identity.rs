//! # Case Identity
//!
//! Newtype for the case identifier. A case name appears verbatim as the
//! head atom of its snapshot (`(kyc-case FUND-001 ...)`), so it must be a
//! single token.

use serde::{Deserialize, Serialize};

use crate::error::KycError;

/// Name of a KYC case, e.g. `AVIVA-EU-EQUITY-FUND`.
///
/// Construct with [`CaseName::new()`]; the inner string is guaranteed to be
/// non-empty and free of whitespace, parentheses, quotes, and `;`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CaseName(String);

impl CaseName {
    /// Validate and wrap a case name.
    pub fn new(name: impl Into<String>) -> Result<Self, KycError> {
        let name = name.into();
        if name.is_empty() {
            return Err(KycError::InvalidCaseName {
                name,
                reason: "case name cannot be empty".to_string(),
            });
        }
        if let Some(bad) = name
            .chars()
            .find(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';'))
        {
            return Err(KycError::InvalidCaseName {
                reason: format!("character {bad:?} is not allowed"),
                name,
            });
        }
        Ok(Self(name))
    }

    /// Borrow the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CaseName {
    type Error = KycError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CaseName> for String {
    fn from(value: CaseName) -> Self {
        value.0
    }
}

impl AsRef<str> for CaseName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CaseName {
    type Err = KycError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
