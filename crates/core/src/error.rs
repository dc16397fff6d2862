use crate::campaign::AdPlatform;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type PulseResult<T> = Result<T, PulseError>;

/// Normalized error produced at the resilient-client boundary for a failed
/// external call. Carries a human-readable message only, never the raw
/// platform payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    pub platform: AdPlatform,
    pub status_code: u16,
    pub error_code: String,
    pub retryable: bool,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{} {}]: {}",
            self.platform.as_str(),
            self.status_code,
            self.error_code,
            self.message
        )
    }
}

#[derive(Error, Debug)]
pub enum PulseError {
    /// Malformed or out-of-bounds input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Classified platform failure that is eligible for retry. Surfaced
    /// when the circuit opens mid-operation and retrying cannot proceed.
    #[error("Transient platform error: {0}")]
    TransientPlatform(ApiError),

    /// Classified platform failure that must not be retried.
    #[error("Platform error: {0}")]
    Platform(ApiError),

    /// The circuit breaker is open; no network attempt was made.
    #[error("Circuit open for {platform}: request rejected without a network attempt")]
    CircuitOpen { platform: AdPlatform },

    /// All retry attempts were consumed without a successful response.
    #[error("Max retries exceeded for {platform} after {attempts} attempts: {last}")]
    RetriesExhausted {
        platform: AdPlatform,
        attempts: u32,
        last: ApiError,
    },

    /// Batch-level storage failure. Retried with a fixed delay, then surfaced.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unclassifiable failure. Non-retryable by default.
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PulseError {
    /// Stable error code used in logs and surfaced responses.
    pub fn code(&self) -> &'static str {
        match self {
            PulseError::Validation(_) => "VALIDATION_ERROR",
            PulseError::TransientPlatform(_) => "TRANSIENT_PLATFORM_ERROR",
            PulseError::Platform(_) => "PLATFORM_ERROR",
            PulseError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            PulseError::RetriesExhausted { .. } => "MAX_RETRIES_EXCEEDED",
            PulseError::Storage(_) => "STORAGE_ERROR",
            PulseError::Unknown(_) => "UNKNOWN_ERROR",
            PulseError::Serialization(_) => "SERIALIZATION_ERROR",
            PulseError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the failure is eligible for another attempt. Retryability is
    /// decided once, by the error classifier; this only reads the verdict.
    pub fn is_retryable(&self) -> bool {
        match self {
            PulseError::TransientPlatform(e) => e.retryable,
            PulseError::Storage(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(retryable: bool) -> ApiError {
        ApiError {
            message: "rate limited".into(),
            platform: AdPlatform::GoogleAds,
            status_code: 429,
            error_code: "RATE_LIMITED".into(),
            retryable,
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(PulseError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(
            PulseError::CircuitOpen {
                platform: AdPlatform::MetaAds
            }
            .code(),
            "CIRCUIT_OPEN"
        );
        assert_eq!(
            PulseError::RetriesExhausted {
                platform: AdPlatform::GoogleAds,
                attempts: 4,
                last: api_error(true),
            }
            .code(),
            "MAX_RETRIES_EXCEEDED"
        );
    }

    #[test]
    fn test_retryability_follows_classifier_verdict() {
        assert!(PulseError::TransientPlatform(api_error(true)).is_retryable());
        assert!(!PulseError::Platform(api_error(false)).is_retryable());
        assert!(!PulseError::Validation("bad".into()).is_retryable());
        assert!(PulseError::Storage("contention".into()).is_retryable());
    }
}
