//! API Handlers
use crate::error::ApiError;
use crate::middleware::CorrelationId;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use dronecmd_core::{
    codes, BatchRequest, Command, CommandOptions, CommandResult, ExecutionContext,
    TaxonomyError, DRONECMD_VERSION,
};
use dronecmd_dispatch::RetryPolicy;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

fn context(correlation_id: String) -> ExecutionContext {
    ExecutionContext::with_correlation_id(correlation_id).request_id(uuid::Uuid::new_v4().to_string())
}

/// Parse a JSON body; malformed input is a `VALIDATION_ERROR`
fn parse_body<T: DeserializeOwned>(body: &Bytes, correlation_id: &str) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        ApiError(
            TaxonomyError::validation(codes::VALIDATION_ERROR, format!("invalid request body: {}", e))
                .with_correlation_id(correlation_id),
        )
    })
}

/// 200 on success, otherwise the status the error carries
fn command_response(result: CommandResult) -> Response {
    let status = match &result.error {
        Some(error) if !result.success => {
            StatusCode::from_u16(error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        _ => StatusCode::OK,
    };
    (status, Json(result)).into_response()
}

pub async fn command(
    State(state): State<AppState>,
    Extension(CorrelationId(id)): Extension<CorrelationId>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let command: Command = parse_body(&body, &id)?;
    let result = state.pipeline.execute(&command, &context(id)).await;
    state.metrics.observe_command(&result);
    Ok(command_response(result))
}

pub async fn batch(
    State(state): State<AppState>,
    Extension(CorrelationId(id)): Extension<CorrelationId>,
    body: Bytes,
) -> Result<Json<dronecmd_core::BatchResult>, ApiError> {
    let request: BatchRequest = parse_body(&body, &id)?;
    let result = state.batch.execute(&request, &context(id)).await;
    state.metrics.observe_batch(request.execution_mode, &result);
    Ok(Json(result))
}

/// Direct dispatch of one action. The body holds the action parameters
/// plus an optional `options` object; an empty body means no parameters.
pub async fn run_action(
    State(state): State<AppState>,
    Extension(CorrelationId(id)): Extension<CorrelationId>,
    action: &'static str,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut parameters: Map<String, Value> = if body.is_empty() {
        Map::new()
    } else {
        parse_body(&body, &id)?
    };
    let options: Option<CommandOptions> = match parameters.remove("options") {
        Some(value) => Some(serde_json::from_value(value).map_err(|e| {
            ApiError(
                TaxonomyError::validation(codes::VALIDATION_ERROR, format!("invalid options: {}", e))
                    .with_correlation_id(id.as_str()),
            )
        })?),
        None => None,
    };

    let result = state
        .pipeline
        .dispatcher()
        .dispatch_action(action, parameters, options.as_ref(), &context(id))
        .await;
    state.metrics.observe_command(&result);
    Ok(command_response(result))
}

fn backend_view(result: &CommandResult) -> Value {
    match (&result.result, &result.error) {
        (Some(body), _) if result.success => Value::Object(body.clone()),
        (_, Some(error)) => json!({ "error": error }),
        _ => Value::Null,
    }
}

pub async fn health(
    State(state): State<AppState>,
    Extension(CorrelationId(id)): Extension<CorrelationId>,
) -> Response {
    // A health check answers now; it never waits out the retry schedule
    let result = state
        .pipeline
        .dispatcher()
        .clone()
        .with_retry(RetryPolicy::none())
        .dispatch_action("system_health", Map::new(), None, &context(id))
        .await;
    let (status, label) = if result.success {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    let body = json!({
        "status": label,
        "version": DRONECMD_VERSION,
        "backend": backend_view(&result),
    });
    (status, Json(body)).into_response()
}

pub async fn status(
    State(state): State<AppState>,
    Extension(CorrelationId(id)): Extension<CorrelationId>,
) -> Json<Value> {
    let result = state
        .pipeline
        .dispatcher()
        .dispatch_action("system_status", Map::new(), None, &context(id))
        .await;
    let config = state.config.current();
    Json(json!({
        "service": {
            "version": DRONECMD_VERSION,
            "uptimeSecs": state.started.elapsed().as_secs(),
            "backendUrl": config.backend.url,
            "maxDrones": config.drone.max_drones,
        },
        "backendReachable": result.success,
        "backend": backend_view(&result),
    }))
}

pub async fn config(State(state): State<AppState>) -> Json<Value> {
    Json(state.config.current().redacted())
}

pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let text = state
        .metrics
        .encode()
        .map_err(|e| ApiError(TaxonomyError::configuration(format!("metrics encoding failed: {}", e))))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response())
}
