//! Amendment pipeline configuration.
//!
//! Defaults suit a local deployment. Override via environment variables
//! or explicit construction in tests.

use std::time::Duration;

/// Default deadline for each collaborator call.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Actor recorded against validation verdicts when none is given.
pub const DEFAULT_ACTOR: &str = "System";

/// How the pipeline treats an action that is illegal in the case's
/// current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhasePolicy {
    /// Reject the amendment before mutating the case.
    #[default]
    Enforce,
    /// Log a warning and amend anyway.
    Advisory,
}

impl PhasePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enforce => "enforce",
            Self::Advisory => "advisory",
        }
    }
}

impl std::fmt::Display for PhasePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhasePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforce" => Ok(Self::Enforce),
            "advisory" => Ok(Self::Advisory),
            _ => Err(ConfigError::InvalidValue {
                var: "KYC_PHASE_POLICY".to_string(),
                reason: format!("expected 'enforce' or 'advisory', got {s:?}"),
            }),
        }
    }
}

/// Configuration for [`crate::Amender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmendConfig {
    /// Deadline applied to every parse, serialize, validate, and store call.
    pub call_timeout: Duration,
    /// Schema reference passed to the validator, if any.
    pub schema_ref: Option<String>,
    pub phase_policy: PhasePolicy,
    /// Who validation verdicts are attributed to.
    pub actor: String,
}

impl Default for AmendConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            schema_ref: None,
            phase_policy: PhasePolicy::Enforce,
            actor: DEFAULT_ACTOR.to_string(),
        }
    }
}

impl AmendConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `KYC_CALL_TIMEOUT_SECS` (default: 30, must be positive)
    /// - `KYC_SCHEMA_REF` (optional)
    /// - `KYC_PHASE_POLICY` (`enforce` or `advisory`, default: `enforce`)
    /// - `KYC_ACTOR` (default: `System`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let call_timeout = match lookup("KYC_CALL_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    var: "KYC_CALL_TIMEOUT_SECS".to_string(),
                    reason: format!("not a whole number of seconds: {raw:?}"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        var: "KYC_CALL_TIMEOUT_SECS".to_string(),
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
        };
        let schema_ref = lookup("KYC_SCHEMA_REF").filter(|s| !s.trim().is_empty());
        let phase_policy = match lookup("KYC_PHASE_POLICY") {
            Some(raw) => raw.parse()?,
            None => PhasePolicy::default(),
        };
        let actor = lookup("KYC_ACTOR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_ACTOR.to_string());
        Ok(Self {
            call_timeout,
            schema_ref,
            phase_policy,
            actor,
        })
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_schema_ref(mut self, schema_ref: impl Into<String>) -> Self {
        self.schema_ref = Some(schema_ref.into());
        self
    }

    pub fn with_phase_policy(mut self, policy: PhasePolicy) -> Self {
        self.phase_policy = policy;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}
