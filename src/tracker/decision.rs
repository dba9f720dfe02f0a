use serde::Serialize;
use thiserror::Error;

/// Outcome of an admission check.
///
/// Refusals are ordinary return values, not errors: nothing on the check
/// path fails or panics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    Allowed,
    Refused(Refusal),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn refusal(&self) -> Option<&Refusal> {
        match self {
            Decision::Allowed => None,
            Decision::Refused(refusal) => Some(refusal),
        }
    }
}

/// Why an admission check said no, with the usage that tripped it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum Refusal {
    #[error("resource {resource} has no configured limits")]
    UnknownResource { resource: String },
    #[error("daily limit reached: {used}/{limit}")]
    DailyLimit { used: u64, limit: u64 },
    #[error("rate limit reached: {used}/{limit} in the trailing minute")]
    RateLimit { used: u64, limit: u64 },
}

impl Refusal {
    /// Stable machine-readable reason, matching the serialized tag.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Refusal::UnknownResource { .. } => "unknown-resource",
            Refusal::DailyLimit { .. } => "daily-limit",
            Refusal::RateLimit { .. } => "rate-limit",
        }
    }
}
