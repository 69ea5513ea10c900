//! Taxonomy errors as HTTP responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use dronecmd_core::TaxonomyError;
use serde_json::json;

/// Error body: `{ "error": SerializedError }` with the taxonomy status
#[derive(Debug)]
pub struct ApiError(pub TaxonomyError);

impl From<TaxonomyError> for ApiError {
    fn from(err: TaxonomyError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(json!({ "error": self.0.to_serializable() }))).into_response();

        if let Some(ms) = self.0.retry_after_ms() {
            let secs = ms.div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_retry_after() {
        let response = ApiError(TaxonomyError::rate_limited("slow down", Some(1_500))).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");

        let response = ApiError(TaxonomyError::authentication("missing key")).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
