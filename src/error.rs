//! Core error taxonomy.
//!
//! Every failure surfaced to callers maps onto a stable error code. Engines
//! convert unexpected internal failures to `Internal` at their top-level
//! boundary; validation failures never leave side effects behind.

use thiserror::Error;

/// Core error type surfaced by the ledger, routing, orchestration and
/// reconciliation engines.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    // === Auth (raised by collaborators, carried through the taxonomy) ===
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Not permitted")]
    Forbidden,

    #[error("Step-up verification required")]
    StepUpRequired,

    // === Validation ===
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Terms out of policy: {0}")]
    TermsOutOfPolicy(String),

    // === State ===
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // === Money movement ===
    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Funding instrument invalid: {0}")]
    InstrumentInvalid(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Payment returned: {0}")]
    PaymentReturned(String),

    #[error("Limit exceeded")]
    LimitExceeded,

    #[error("Rate limited")]
    RateLimited,

    // === System ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl CoreError {
    /// Stable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Unauthorized => "UNAUTHORIZED",
            CoreError::Forbidden => "FORBIDDEN",
            CoreError::StepUpRequired => "STEP_UP_REQUIRED",
            CoreError::InvalidRequest(_) => "INVALID_REQUEST",
            CoreError::InvalidParameter(_) => "INVALID_PARAMETER",
            CoreError::TermsOutOfPolicy(_) => "TERMS_OUT_OF_POLICY",
            CoreError::InvalidState(_) => "INVALID_STATE",
            CoreError::AlreadyExists(_) => "ALREADY_EXISTS",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            CoreError::InstrumentInvalid(_) => "INSTRUMENT_INVALID",
            CoreError::PaymentFailed(_) => "PAYMENT_FAILED",
            CoreError::PaymentReturned(_) => "PAYMENT_RETURNED",
            CoreError::LimitExceeded => "LIMIT_EXCEEDED",
            CoreError::RateLimited => "RATE_LIMITED",
            CoreError::Internal(_) => "INTERNAL_ERROR",
            CoreError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            CoreError::Provider(_) => "PROVIDER_ERROR",
        }
    }

    /// HTTP status code suggestion for the transport layer.
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::Unauthorized => 401,
            CoreError::Forbidden | CoreError::StepUpRequired => 403,
            CoreError::InvalidRequest(_) | CoreError::InvalidParameter(_) => 400,
            CoreError::TermsOutOfPolicy(_)
            | CoreError::InvalidState(_)
            | CoreError::InsufficientFunds
            | CoreError::InstrumentInvalid(_)
            | CoreError::PaymentFailed(_)
            | CoreError::PaymentReturned(_)
            | CoreError::LimitExceeded => 422,
            CoreError::AlreadyExists(_) => 409,
            CoreError::NotFound(_) => 404,
            CoreError::RateLimited => 429,
            CoreError::Internal(_) => 500,
            CoreError::ServiceUnavailable(_) | CoreError::Provider(_) => 503,
        }
    }

    /// Whether the failure is worth retrying against the same input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::ServiceUnavailable(_) | CoreError::Provider(_) | CoreError::RateLimited
        )
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => CoreError::NotFound("row not found".to_string()),
            other => CoreError::Internal(format!("database error: {}", other)),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Internal(format!("serialization error: {}", e))
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CoreError::InvalidRequest("x".into()).code(),
            "INVALID_REQUEST"
        );
        assert_eq!(CoreError::InsufficientFunds.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(CoreError::Provider("down".into()).code(), "PROVIDER_ERROR");
        assert_eq!(CoreError::Internal("x".into()).code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(CoreError::Unauthorized.http_status(), 401);
        assert_eq!(CoreError::InvalidRequest("x".into()).http_status(), 400);
        assert_eq!(CoreError::NotFound("x".into()).http_status(), 404);
        assert_eq!(CoreError::AlreadyExists("x".into()).http_status(), 409);
        assert_eq!(CoreError::InsufficientFunds.http_status(), 422);
        assert_eq!(CoreError::Provider("x".into()).http_status(), 503);
    }

    #[test]
    fn test_transient_classification() {
        assert!(CoreError::Provider("timeout".into()).is_transient());
        assert!(!CoreError::InvalidRequest("bad".into()).is_transient());
    }

    #[test]
    fn test_sqlx_conversion() {
        let err: CoreError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
