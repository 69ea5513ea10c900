//! Error taxonomy: every failure in the pipeline ends up as exactly one
//! [`TaxonomyError`].
//!
//! The kind decides default code, HTTP status and retryability. Specific
//! codes (e.g. `PARAMETER_OUT_OF_RANGE`) refine the kind without changing
//! how it is handled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Stable error codes.
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_COMMAND: &str = "INVALID_COMMAND";
    pub const PARAMETER_OUT_OF_RANGE: &str = "PARAMETER_OUT_OF_RANGE";
    pub const INVALID_PARAMETER: &str = "INVALID_PARAMETER";
    pub const MISSING_PARAMETER: &str = "MISSING_PARAMETER";
    pub const UNKNOWN_ACTION: &str = "UNKNOWN_ACTION";

    pub const DRONE_ERROR: &str = "DRONE_ERROR";
    pub const DRONE_NOT_CONNECTED: &str = "DRONE_NOT_CONNECTED";

    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const CONNECTION_REFUSED: &str = "CONNECTION_REFUSED";
    pub const BACKEND_UNAVAILABLE: &str = "BACKEND_UNAVAILABLE";

    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const AUTHENTICATION_ERROR: &str = "AUTHENTICATION_ERROR";
    pub const AUTHORIZATION_ERROR: &str = "AUTHORIZATION_ERROR";
    pub const CONFIGURATION_ERROR: &str = "CONFIGURATION_ERROR";

    pub const BUSINESS_LOGIC_ERROR: &str = "BUSINESS_LOGIC_ERROR";
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";
    pub const DUPLICATE_TRACKING_SESSION: &str = "DUPLICATE_TRACKING_SESSION";
}

/// The fixed set of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ValidationError,
    DroneError,
    NetworkError,
    TimeoutError,
    RateLimitError,
    AuthenticationError,
    AuthorizationError,
    ConfigurationError,
    BusinessLogicError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::ValidationError,
        ErrorKind::DroneError,
        ErrorKind::NetworkError,
        ErrorKind::TimeoutError,
        ErrorKind::RateLimitError,
        ErrorKind::AuthenticationError,
        ErrorKind::AuthorizationError,
        ErrorKind::ConfigurationError,
        ErrorKind::BusinessLogicError,
    ];

    /// Whether failures of this kind are eligible for automatic re-attempt
    pub fn retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::DroneError
                | ErrorKind::NetworkError
                | ErrorKind::TimeoutError
                | ErrorKind::RateLimitError
        )
    }

    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::ValidationError => 400,
            ErrorKind::AuthenticationError => 401,
            ErrorKind::AuthorizationError => 403,
            ErrorKind::BusinessLogicError => 409,
            ErrorKind::RateLimitError => 429,
            ErrorKind::ConfigurationError => 500,
            ErrorKind::DroneError => 502,
            ErrorKind::NetworkError => 503,
            ErrorKind::TimeoutError => 504,
        }
    }

    pub fn default_code(self) -> &'static str {
        match self {
            ErrorKind::ValidationError => codes::VALIDATION_ERROR,
            ErrorKind::DroneError => codes::DRONE_ERROR,
            ErrorKind::NetworkError => codes::NETWORK_ERROR,
            ErrorKind::TimeoutError => codes::TIMEOUT_ERROR,
            ErrorKind::RateLimitError => codes::RATE_LIMIT_EXCEEDED,
            ErrorKind::AuthenticationError => codes::AUTHENTICATION_ERROR,
            ErrorKind::AuthorizationError => codes::AUTHORIZATION_ERROR,
            ErrorKind::ConfigurationError => codes::CONFIGURATION_ERROR,
            ErrorKind::BusinessLogicError => codes::BUSINESS_LOGIC_ERROR,
        }
    }

    fn default_user_message(self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "The command or its parameters are invalid.",
            ErrorKind::DroneError => "The drone reported a failure. Please try again.",
            ErrorKind::NetworkError => "The drone backend could not be reached.",
            ErrorKind::TimeoutError => "The drone backend did not respond in time.",
            ErrorKind::RateLimitError => "Too many requests. Please slow down.",
            ErrorKind::AuthenticationError => "Authentication is required.",
            ErrorKind::AuthorizationError => "You are not allowed to perform this operation.",
            ErrorKind::ConfigurationError => "The service is misconfigured.",
            ErrorKind::BusinessLogicError => "The operation conflicts with the current state.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Resolve a known code back to its kind. Unknown codes are treated as
/// device-side failures.
pub fn kind_for_code(code: &str) -> ErrorKind {
    use codes::*;
    match code {
        VALIDATION_ERROR | INVALID_COMMAND | PARAMETER_OUT_OF_RANGE | INVALID_PARAMETER
        | MISSING_PARAMETER | UNKNOWN_ACTION => ErrorKind::ValidationError,
        NETWORK_ERROR | CONNECTION_REFUSED | BACKEND_UNAVAILABLE => ErrorKind::NetworkError,
        TIMEOUT_ERROR => ErrorKind::TimeoutError,
        RATE_LIMIT_EXCEEDED => ErrorKind::RateLimitError,
        AUTHENTICATION_ERROR => ErrorKind::AuthenticationError,
        AUTHORIZATION_ERROR => ErrorKind::AuthorizationError,
        CONFIGURATION_ERROR => ErrorKind::ConfigurationError,
        BUSINESS_LOGIC_ERROR | RESOURCE_NOT_FOUND | DUPLICATE_TRACKING_SESSION => {
            ErrorKind::BusinessLogicError
        }
        _ => ErrorKind::DroneError,
    }
}

/// Correlation data attached to every error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ErrorContext {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            correlation_id: None,
            request_id: None,
            operation: None,
            metadata: None,
        }
    }
}

/// A classified pipeline failure.
///
/// Fields are private; builders consume `self`, so an error cannot change
/// once it has been handed to someone else.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct TaxonomyError {
    kind: ErrorKind,
    code: String,
    message: String,
    user_message: String,
    http_status: u16,
    retryable: bool,
    details: Option<Value>,
    retry_after_ms: Option<u64>,
    context: ErrorContext,
}

/// Transport form of a [`TaxonomyError`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// Status the error answers with; absent in records from older peers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl SerializedError {
    /// Carried status, or the status of the kind the code maps to
    pub fn status(&self) -> u16 {
        self.http_status
            .unwrap_or_else(|| kind_for_code(&self.code).http_status())
    }
}

impl TaxonomyError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.default_code().to_string(),
            message: message.into(),
            user_message: kind.default_user_message().to_string(),
            http_status: kind.http_status(),
            retryable: kind.retryable(),
            details: None,
            retry_after_ms: None,
            context: ErrorContext::now(),
        }
    }

    pub fn validation(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message).with_code(code)
    }

    pub fn drone(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DroneError, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TimeoutError, message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        let mut err = Self::new(ErrorKind::RateLimitError, message);
        err.retry_after_ms = retry_after_ms;
        err
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthenticationError, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthorizationError, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigurationError, message)
    }

    pub fn business(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BusinessLogicError, message).with_code(code)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = status;
        self
    }

    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = message.into();
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.context.correlation_id = Some(id.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.context.request_id = Some(id.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.context.metadata = Some(metadata);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Minimum wait the backend asked for before the next attempt
    pub fn retry_after_ms(&self) -> Option<u64> {
        self.retry_after_ms
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn to_serializable(&self) -> SerializedError {
        SerializedError {
            code: self.code.clone(),
            message: self.message.clone(),
            details: self.details.clone(),
            timestamp: self.context.timestamp,
            correlation_id: self.context.correlation_id.clone(),
            http_status: Some(self.http_status),
        }
    }

    /// Rebuild an error from its transport form. The kind is recovered
    /// from the code.
    pub fn from_serializable(serialized: SerializedError) -> Self {
        let kind = kind_for_code(&serialized.code);
        let mut err = Self::new(kind, serialized.message).with_code(serialized.code);
        err.details = serialized.details;
        err.context.timestamp = serialized.timestamp;
        err.context.correlation_id = serialized.correlation_id;
        if let Some(status) = serialized.http_status {
            err.http_status = status;
        }
        err
    }

    /// Structured log form carrying the full context
    pub fn log_fields(&self) -> Value {
        serde_json::json!({
            "kind": self.kind,
            "code": self.code,
            "message": self.message,
            "userMessage": self.user_message,
            "httpStatus": self.http_status,
            "retryable": self.retryable,
            "details": self.details,
            "retryAfterMs": self.retry_after_ms,
            "context": self.context,
        })
    }

    /// Emit one structured event; retryable failures log at warn.
    pub fn log(&self) {
        let ctx = &self.context;
        if self.retryable {
            tracing::warn!(
                kind = %self.kind,
                code = %self.code,
                status = self.http_status,
                correlation_id = ctx.correlation_id.as_deref().unwrap_or("-"),
                operation = ctx.operation.as_deref().unwrap_or("-"),
                "{}",
                self.message
            );
        } else {
            tracing::error!(
                kind = %self.kind,
                code = %self.code,
                status = self.http_status,
                correlation_id = ctx.correlation_id.as_deref().unwrap_or("-"),
                operation = ctx.operation.as_deref().unwrap_or("-"),
                "{}",
                self.message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retryability() {
        let retryable: Vec<_> = ErrorKind::ALL.iter().filter(|k| k.retryable()).collect();
        assert_eq!(
            retryable,
            vec![
                &ErrorKind::DroneError,
                &ErrorKind::NetworkError,
                &ErrorKind::TimeoutError,
                &ErrorKind::RateLimitError
            ]
        );
    }

    #[test]
    fn test_specific_code_keeps_kind() {
        let err = TaxonomyError::validation(codes::PARAMETER_OUT_OF_RANGE, "distance 600 > 500");
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.code(), "PARAMETER_OUT_OF_RANGE");
        assert_eq!(err.http_status(), 400);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "PARAMETER_OUT_OF_RANGE: distance 600 > 500");
    }

    #[test]
    fn test_serializable_round_trip() {
        let err = TaxonomyError::network("connection refused")
            .with_code(codes::CONNECTION_REFUSED)
            .with_correlation_id("corr-1")
            .with_details(serde_json::json!({ "endpoint": "/drone/connect" }));

        let json = serde_json::to_string(&err.to_serializable()).unwrap();
        assert!(json.contains("\"correlationId\":\"corr-1\""));

        let back: SerializedError = serde_json::from_str(&json).unwrap();
        let restored = TaxonomyError::from_serializable(back);

        assert_eq!(restored.code(), err.code());
        assert_eq!(restored.message(), err.message());
        assert_eq!(restored.context().timestamp, err.context().timestamp);
        assert_eq!(restored.kind(), ErrorKind::NetworkError);
        assert!(restored.is_retryable());
        assert_eq!(restored.http_status(), 503);
    }

    #[test]
    fn test_serialized_status_survives_refined_code() {
        let err = TaxonomyError::business(codes::RESOURCE_NOT_FOUND, "no such drone").with_status(404);
        let serialized = err.to_serializable();
        assert_eq!(serialized.status(), 404);
        assert_eq!(TaxonomyError::from_serializable(serialized).http_status(), 404);

        let legacy: SerializedError = serde_json::from_value(serde_json::json!({
            "code": "MOTOR_OVERHEAT",
            "message": "hot",
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(legacy.status(), ErrorKind::DroneError.http_status());
    }

    #[test]
    fn test_unknown_code_maps_to_drone_error() {
        assert_eq!(kind_for_code("MOTOR_OVERHEAT"), ErrorKind::DroneError);
        assert_eq!(kind_for_code("DUPLICATE_TRACKING_SESSION"), ErrorKind::BusinessLogicError);
    }

    #[test]
    fn test_rate_limit_hint() {
        let err = TaxonomyError::rate_limited("slow down", Some(2_000));
        assert!(err.is_retryable());
        assert_eq!(err.retry_after_ms(), Some(2_000));
        assert_eq!(err.log_fields()["retryAfterMs"], 2_000);
    }
}
