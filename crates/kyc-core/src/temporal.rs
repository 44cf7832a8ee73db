//! # Temporal Types — UTC-Only Timestamps
//!
//! `Timestamp` is the only time type that crosses crate boundaries:
//! version creation, amendment records, and derivation results all carry
//! one. It is UTC, truncated to whole seconds, and renders as
//! `YYYY-MM-DDTHH:MM:SSZ`.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::KycError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string. Only the `Z` suffix is accepted.
    pub fn parse(s: &str) -> Result<Self, KycError> {
        if !s.ends_with('Z') {
            return Err(KycError::InvalidTimestamp(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| KycError::InvalidTimestamp(format!("{s:?}: {e}")))?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    // with_nanosecond(0) only fails for leap-second inputs.
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_has_no_subseconds() {
        let ts = Timestamp::now();
        assert_eq!(ts.as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_parse_and_render_round_trip() {
        let ts = Timestamp::parse("2025-01-15T12:00:00Z").unwrap();
        assert_eq!(ts.to_iso8601(), "2025-01-15T12:00:00Z");
        assert_eq!(ts.to_string(), "2025-01-15T12:00:00Z");
    }

    #[test]
    fn test_parse_truncates_fraction() {
        let ts = Timestamp::parse("2025-01-15T12:00:00.987Z").unwrap();
        assert_eq!(ts.to_iso8601(), "2025-01-15T12:00:00Z");
    }

    #[test]
    fn test_parse_rejects_offsets() {
        assert!(Timestamp::parse("2025-01-15T12:00:00+00:00").is_err());
        assert!(Timestamp::parse("2025-01-15T12:00:00+05:30").is_err());
        assert!(Timestamp::parse("not a timestamp Z").is_err());
    }

    #[test]
    fn test_ordering_follows_time() {
        let a = Timestamp::parse("2025-01-15T12:00:00Z").unwrap();
        let b = Timestamp::parse("2025-01-15T12:00:01Z").unwrap();
        assert!(a < b);
    }
}
