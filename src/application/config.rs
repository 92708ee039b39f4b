use crate::error::TravelError;
use std::fmt;
use std::str::FromStr;

/// How a failed audit append affects the operation that triggered it.
///
/// The business mutation is always committed before the audit write, so the
/// policy only decides what the caller sees when the append fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuditPolicy {
    /// Log the failure and report the operation as successful.
    #[default]
    BestEffort,
    /// Surface the append failure to the caller.
    Strict,
    /// Queue the entry to a background worker that retries the append, so the
    /// operation never waits on the audit store.
    Deferred,
}

impl FromStr for AuditPolicy {
    type Err = TravelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" => Ok(AuditPolicy::BestEffort),
            "strict" => Ok(AuditPolicy::Strict),
            "deferred" => Ok(AuditPolicy::Deferred),
            other => Err(TravelError::ConfigurationError(format!(
                "unknown audit policy '{}', expected 'best-effort', 'strict' or 'deferred'",
                other
            ))),
        }
    }
}

impl fmt::Display for AuditPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditPolicy::BestEffort => f.write_str("best-effort"),
            AuditPolicy::Strict => f.write_str("strict"),
            AuditPolicy::Deferred => f.write_str("deferred"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceConfig {
    pub audit_policy: AuditPolicy,
}
