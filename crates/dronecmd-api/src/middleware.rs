//! Request middleware: correlation ids, API key, rate limiting, CORS.
use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dronecmd_core::TaxonomyError;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tracing::warn;

pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Correlation id of the current request, set by [`correlation_id`]
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

pub fn cors() -> CorsLayer {
    CorsLayer::permissive()
}

/// Reuse the caller's `x-correlation-id` or mint one; echo it on the response
pub async fn correlation_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    req.extensions_mut().insert(CorrelationId(id.clone()));
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

fn correlation_of(req: &Request) -> Option<String> {
    req.extensions().get::<CorrelationId>().map(|c| c.0.clone())
}

/// Enforce `security.apiKey` when one is configured. Health stays open.
pub async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let expected = state.config.current().security.api_key.clone();
    let Some(expected) = expected.filter(|k| !k.is_empty()) else {
        return next.run(req).await;
    };
    if req.uri().path() == "/system/health" {
        return next.run(req).await;
    }

    let matches = req
        .headers()
        .get(API_KEY_HEADER)
        .map(|v| v.to_str().map_or(false, |v| v == expected));
    let mut err = match matches {
        Some(true) => return next.run(req).await,
        Some(false) => TaxonomyError::authentication("invalid API key"),
        None => TaxonomyError::authentication("missing API key"),
    };
    if let Some(id) = correlation_of(&req) {
        err = err.with_correlation_id(id);
    }
    warn!(path = %req.uri().path(), code = err.code(), "request rejected");
    ApiError(err).into_response()
}

/// Fixed-window request counter shared by all clients
#[derive(Debug)]
pub struct RateLimiter {
    window: Mutex<Window>,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            window: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Count one request. Over the limit, returns how long until the window resets.
    pub fn check(&self, limit: u32, window: Duration) -> Result<(), Duration> {
        let mut state = self.window.lock().unwrap_or_else(|p| p.into_inner());
        let elapsed = state.started.elapsed();
        if elapsed >= window {
            state.started = Instant::now();
            state.count = 0;
        }
        if state.count >= limit {
            return Err(window.saturating_sub(state.started.elapsed()));
        }
        state.count += 1;
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `security.rateLimitRequests` per `security.rateLimitWindowMs`
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let security = state.config.current().security.clone();
    let window = Duration::from_millis(security.rate_limit_window_ms);

    match state.limiter.check(security.rate_limit_requests, window) {
        Ok(()) => next.run(req).await,
        Err(reset) => {
            let mut err = TaxonomyError::rate_limited(
                format!(
                    "more than {} requests in {} ms",
                    security.rate_limit_requests, security.rate_limit_window_ms
                ),
                Some(reset.as_millis() as u64),
            );
            if let Some(id) = correlation_of(&req) {
                err = err.with_correlation_id(id);
            }
            warn!(path = %req.uri().path(), code = err.code(), "request rejected");
            ApiError(err).into_response()
        }
    }
}
