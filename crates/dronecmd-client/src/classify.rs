//! Raw failure → taxonomy translation.
//!
//! | Status | Kind |
//! |---|---|
//! | 400, 422 | ValidationError |
//! | 401 | AuthenticationError |
//! | 403 | AuthorizationError |
//! | 404 | BusinessLogicError (`RESOURCE_NOT_FOUND`) |
//! | 409 | BusinessLogicError |
//! | 408, 504 | TimeoutError |
//! | 429 | RateLimitError |
//! | 502, 503 | NetworkError |
//! | other 5xx | DroneError |
//! | other 4xx | ValidationError |

use dronecmd_core::{codes, ErrorKind, TaxonomyError};
use serde_json::{json, Value};

/// Classify a non-2xx response.
///
/// A JSON body of the form `{"code": ..., "message": ...}` refines the code
/// and message; the kind always follows the status.
pub fn classify_status(status: u16, body: &Value, retry_after_ms: Option<u64>) -> TaxonomyError {
    let kind = match status {
        400 | 422 => ErrorKind::ValidationError,
        401 => ErrorKind::AuthenticationError,
        403 => ErrorKind::AuthorizationError,
        404 | 409 => ErrorKind::BusinessLogicError,
        408 | 504 => ErrorKind::TimeoutError,
        429 => ErrorKind::RateLimitError,
        502 | 503 => ErrorKind::NetworkError,
        500..=599 => ErrorKind::DroneError,
        _ => ErrorKind::ValidationError,
    };

    let message = body
        .get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("backend returned HTTP {}", status));

    let mut err = match kind {
        ErrorKind::RateLimitError => {
            let hint = retry_after_ms.or_else(|| body.get("retryAfterMs").and_then(Value::as_u64));
            TaxonomyError::rate_limited(message, hint)
        }
        _ => TaxonomyError::new(kind, message),
    };

    if status == 404 {
        err = err.with_code(codes::RESOURCE_NOT_FOUND);
    } else if status == 503 {
        err = err.with_code(codes::BACKEND_UNAVAILABLE);
    }
    if let Some(code) = body.get("code").and_then(Value::as_str) {
        err = err.with_code(code);
    }

    err.with_status(status)
        .with_details(json!({ "status": status, "body": body }))
}

/// Classify a transport failure (no response)
pub fn classify_transport(err: &reqwest::Error, timeout_ms: u64) -> TaxonomyError {
    if err.is_timeout() {
        TaxonomyError::timeout(format!("backend call exceeded {} ms", timeout_ms))
            .with_details(json!({ "timeoutMs": timeout_ms }))
    } else if err.is_connect() {
        TaxonomyError::network(format!("connection to backend failed: {}", err))
            .with_code(codes::CONNECTION_REFUSED)
    } else {
        TaxonomyError::network(format!("backend request failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_not_retryable() {
        for status in [400, 401, 403, 404, 409, 422, 418] {
            let err = classify_status(status, &Value::Null, None);
            assert!(!err.is_retryable(), "status {} should not be retryable", status);
        }
    }

    #[test]
    fn test_server_errors_retryable() {
        for status in [408, 429, 500, 502, 503, 504] {
            let err = classify_status(status, &Value::Null, None);
            assert!(err.is_retryable(), "status {} should be retryable", status);
        }
    }

    #[test]
    fn test_kinds_and_codes() {
        assert_eq!(classify_status(401, &Value::Null, None).kind(), ErrorKind::AuthenticationError);
        assert_eq!(classify_status(404, &Value::Null, None).code(), "RESOURCE_NOT_FOUND");
        assert_eq!(classify_status(504, &Value::Null, None).kind(), ErrorKind::TimeoutError);
        assert_eq!(classify_status(500, &Value::Null, None).kind(), ErrorKind::DroneError);
        assert_eq!(classify_status(500, &Value::Null, None).http_status(), 500);
    }

    #[test]
    fn test_body_refines_code_and_message() {
        let body = json!({"code": "DUPLICATE_TRACKING_SESSION", "message": "already tracking"});
        let err = classify_status(409, &body, None);
        assert_eq!(err.kind(), ErrorKind::BusinessLogicError);
        assert_eq!(err.code(), "DUPLICATE_TRACKING_SESSION");
        assert_eq!(err.message(), "already tracking");
    }

    #[test]
    fn test_rate_limit_hint() {
        let err = classify_status(429, &json!({"retryAfterMs": 1500}), None);
        assert_eq!(err.retry_after_ms(), Some(1500));

        let err = classify_status(429, &Value::Null, Some(2000));
        assert_eq!(err.retry_after_ms(), Some(2000));
    }
}
