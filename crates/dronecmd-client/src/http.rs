//! reqwest-backed [`BackendClient`].

use crate::classify::{classify_status, classify_transport};
use crate::request::{BackendFailure, BackendReply, BackendRequest};
use crate::BackendClient;
use async_trait::async_trait;
use dronecmd_config::ConfigHandle;
use dronecmd_core::{HttpMethod, TaxonomyError};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// Header identifying this service to the backend
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// HTTP client for the drone backend.
///
/// Base URL, timeout and client id are read from the live configuration on
/// every call, so reloaded values apply without rebuilding the client.
#[derive(Clone)]
pub struct HttpBackendClient {
    http: reqwest::Client,
    config: ConfigHandle,
}

impl HttpBackendClient {
    pub fn new(config: ConfigHandle) -> Result<Self, TaxonomyError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| TaxonomyError::configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn execute(&self, request: BackendRequest) -> Result<BackendReply, BackendFailure> {
        let config = self.config.current();
        let backend = &config.backend;
        let url = format!("{}{}", backend.url.trim_end_matches('/'), request.endpoint());

        let builder = match request.method() {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
            HttpMethod::Put => self.http.put(&url),
            HttpMethod::Delete => self.http.delete(&url),
        };
        let mut builder = builder
            .timeout(Duration::from_millis(backend.timeout_ms))
            .header(CLIENT_ID_HEADER, backend.client_id.as_str());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = classify_transport(&e, backend.timeout_ms).with_operation(request.operation.name());
                return Err(BackendFailure::new(error, 0, started.elapsed()));
            }
        };

        let status = response.status().as_u16();
        let retry_after_ms = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1000));

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                let error = classify_transport(&e, backend.timeout_ms).with_operation(request.operation.name());
                return Err(BackendFailure::new(error, status, started.elapsed()));
            }
        };
        let elapsed = started.elapsed();
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        debug!(
            endpoint = request.endpoint(),
            method = %request.method(),
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            "backend call finished"
        );

        if (200..300).contains(&status) {
            Ok(BackendReply {
                status,
                body,
                elapsed,
            })
        } else {
            let error = classify_status(status, &body, retry_after_ms).with_operation(request.operation.name());
            Err(BackendFailure::new(error, status, elapsed))
        }
    }
}
