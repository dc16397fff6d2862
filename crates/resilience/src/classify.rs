//! Per-platform error classification. This is the single point where
//! retry-eligibility is decided; every other component only reads the
//! `retryable` verdict off the resulting `ApiError`.
//!
//! Google Ads classifies by numeric HTTP status plus an optional embedded
//! numeric service error code; Meta Ads classifies by a string error code
//! embedded in the response body. 429 and any 5xx are retryable on both
//! platforms, and timeouts always are.

use pulse_core::campaign::AdPlatform;
use pulse_core::error::ApiError;

/// Raw outcome of a transport attempt, before normalization.
#[derive(Debug, Clone)]
pub enum RawFailure {
    /// HTTP-level failure with the status and (possibly empty) body.
    Http {
        status: u16,
        body: Option<serde_json::Value>,
    },
    /// Connection-level failure (DNS, TLS, reset, ...).
    Transport(String),
    /// The per-platform timeout elapsed before a response arrived.
    Timeout,
}

/// Normalize a raw failure into the shared error taxonomy.
pub fn classify(platform: AdPlatform, failure: &RawFailure) -> ApiError {
    match failure {
        RawFailure::Timeout => ApiError {
            message: "request timed out".to_string(),
            platform,
            status_code: 408,
            error_code: "TIMEOUT".to_string(),
            retryable: true,
        },
        RawFailure::Transport(message) => ApiError {
            message: format!("transport failure: {message}"),
            platform,
            status_code: 503,
            error_code: "TRANSPORT_ERROR".to_string(),
            retryable: true,
        },
        RawFailure::Http { status, body } => match platform {
            AdPlatform::GoogleAds => classify_google(*status, body.as_ref()),
            AdPlatform::MetaAds => classify_meta(*status, body.as_ref()),
        },
    }
}

/// Google Ads: the HTTP status is authoritative; the body may carry a more
/// specific numeric service error code under `error.code`.
fn classify_google(status: u16, body: Option<&serde_json::Value>) -> ApiError {
    let service_code = body
        .and_then(|b| b.pointer("/error/code"))
        .and_then(|c| c.as_u64());

    let (error_code, retryable, message) = match status {
        400 => (
            "INVALID_ARGUMENT",
            false,
            "request rejected as malformed by Google Ads",
        ),
        401 => ("UNAUTHENTICATED", false, "Google Ads credentials rejected"),
        403 => (
            "PERMISSION_DENIED",
            false,
            "insufficient Google Ads permissions",
        ),
        404 => ("NOT_FOUND", false, "Google Ads resource not found"),
        409 => ("CONFLICT", false, "Google Ads resource version conflict"),
        429 => (
            "RESOURCE_EXHAUSTED",
            true,
            "Google Ads quota exhausted, rate limited",
        ),
        500..=599 => ("INTERNAL", true, "Google Ads server error"),
        _ => ("UNKNOWN_ERROR", false, "unrecognized Google Ads failure"),
    };

    let message = match service_code {
        Some(code) => format!("{message} (service error {code})"),
        None => message.to_string(),
    };

    ApiError {
        message,
        platform: AdPlatform::GoogleAds,
        // Unrecognized statuses normalize to 500; recognized ones pass
        // through.
        status_code: if error_code == "UNKNOWN_ERROR" {
            500
        } else {
            status
        },
        error_code: error_code.to_string(),
        retryable,
    }
}

/// Meta Ads: the body's `error.code` string decides, with the HTTP status
/// only as a backstop (429/5xx remain retryable regardless of body).
fn classify_meta(status: u16, body: Option<&serde_json::Value>) -> ApiError {
    let body_code = body
        .and_then(|b| b.pointer("/error/code"))
        .and_then(|c| c.as_str());

    let (error_code, retryable, message) = match body_code {
        Some("RATE_LIMIT") => ("RATE_LIMIT", true, "Meta Ads rate limit reached"),
        Some("TEMPORARILY_UNAVAILABLE") => (
            "TEMPORARILY_UNAVAILABLE",
            true,
            "Meta Ads service temporarily unavailable",
        ),
        Some("SERVER_ERROR") => ("SERVER_ERROR", true, "Meta Ads internal server error"),
        Some("INVALID_PARAMETER") => (
            "INVALID_PARAMETER",
            false,
            "Meta Ads rejected a request parameter",
        ),
        Some("AUTH_EXPIRED") => ("AUTH_EXPIRED", false, "Meta Ads access token expired"),
        Some("PERMISSION_DENIED") => (
            "PERMISSION_DENIED",
            false,
            "insufficient Meta Ads permissions",
        ),
        Some(other) => {
            return backstop(
                AdPlatform::MetaAds,
                status,
                other.to_string(),
                format!("unrecognized Meta Ads error code {other}"),
            )
        }
        None => {
            return backstop(
                AdPlatform::MetaAds,
                status,
                "UNKNOWN_ERROR".to_string(),
                "Meta Ads failure without an error code".to_string(),
            )
        }
    };

    // 429/5xx win over the body verdict.
    let retryable = retryable || status == 429 || (500..=599).contains(&status);

    ApiError {
        message: message.to_string(),
        platform: AdPlatform::MetaAds,
        status_code: status,
        error_code: error_code.to_string(),
        retryable,
    }
}

/// Fallback classification when the body shape is unknown. The real status
/// still decides retryability (429/5xx stay retryable), but the surfaced
/// status is always 500: an unrecognized shape carries no meaning worth
/// forwarding.
fn backstop(platform: AdPlatform, status: u16, error_code: String, message: String) -> ApiError {
    let retryable = status == 429 || (500..=599).contains(&status);
    ApiError {
        message,
        platform,
        status_code: 500,
        error_code,
        retryable,
    }
}
