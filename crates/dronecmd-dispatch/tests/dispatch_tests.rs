//! Dispatcher and pipeline behaviour against a scripted backend.

use dronecmd_client::{Operation, ScriptedBackend};
use dronecmd_config::{AppConfig, ConfigHandle, ConfigManager, EnvOverrides};
use dronecmd_core::{codes, Command, CommandOptions, ExecutionContext, HttpMethod, TaxonomyError};
use dronecmd_dispatch::{CommandPipeline, Dispatcher, RetryPolicy};
use dronecmd_in::Interpreter;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

fn params(value: Value) -> Map<String, Value> {
    serde_json::from_value(value).unwrap()
}

fn dispatcher(backend: &Arc<ScriptedBackend>) -> Dispatcher {
    Dispatcher::new(backend.clone(), ConfigHandle::fixed(AppConfig::default()))
}

fn pipeline(backend: &Arc<ScriptedBackend>) -> CommandPipeline {
    CommandPipeline::new(Arc::new(Interpreter::builtin().unwrap()), dispatcher(backend))
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_out_of_range_distance_never_reaches_backend() {
    let backend = Arc::new(ScriptedBackend::new());
    let result = dispatcher(&backend)
        .dispatch_action(
            "move",
            params(json!({ "direction": "forward", "distance": 600 })),
            None,
            &ExecutionContext::new(),
        )
        .await;

    assert!(!result.success);
    assert!(result.backend_calls().is_empty());
    assert!(backend.calls().is_empty());
    let error = result.error.unwrap();
    assert_eq!(error.code, codes::PARAMETER_OUT_OF_RANGE);
    assert!(result.message.starts_with("PARAMETER_OUT_OF_RANGE: "));
}

#[tokio::test]
async fn test_out_of_range_from_free_text() {
    let backend = Arc::new(ScriptedBackend::new());
    let result = pipeline(&backend)
        .execute(&Command::new("move forward 600 cm"), &ExecutionContext::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.intent.as_ref().unwrap().action, "move");
    assert_eq!(result.error.unwrap().code, codes::PARAMETER_OUT_OF_RANGE);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_action() {
    let backend = Arc::new(ScriptedBackend::new());
    let result = dispatcher(&backend)
        .dispatch_action("barrel_roll", Map::new(), None, &ExecutionContext::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.error.unwrap().code, codes::UNKNOWN_ACTION);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_unrecognised_text_is_invalid_command() {
    let backend = Arc::new(ScriptedBackend::new());
    let ctx = ExecutionContext::with_correlation_id("corr-1");
    let result = pipeline(&backend)
        .execute(&Command::new("make me a sandwich"), &ctx)
        .await;

    assert!(!result.success);
    assert!(result.intent.is_none());
    let error = result.error.unwrap();
    assert_eq!(error.code, codes::INVALID_COMMAND);
    assert_eq!(error.correlation_id.as_deref(), Some("corr-1"));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_hot_reloaded_limits_apply_to_next_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ConfigManager::load_or_create(dir.path().join("dronecmd.json"), EnvOverrides::default()).unwrap();
    let backend = Arc::new(ScriptedBackend::new());
    let dispatcher = Dispatcher::new(backend.clone(), manager.handle());
    let move_600 = || params(json!({ "direction": "forward", "distance": 600 }));

    let result = dispatcher
        .dispatch_action("move", move_600(), None, &ExecutionContext::new())
        .await;
    assert!(!result.success);

    manager.set("limits.movement.maxDistance", json!(1000)).unwrap();
    let result = dispatcher
        .dispatch_action("move", move_600(), None, &ExecutionContext::new())
        .await;
    assert!(result.success, "{}", result.message);
    assert_eq!(backend.call_count(Operation::Move), 1);
}

// =============================================================================
// Dry run and confirmation
// =============================================================================

#[tokio::test]
async fn test_dry_run_makes_no_backend_calls() {
    let backend = Arc::new(ScriptedBackend::new());
    let result = pipeline(&backend)
        .execute(&Command::new("take off").dry_run(), &ExecutionContext::new())
        .await;

    assert!(result.success);
    assert_eq!(result.intent.as_ref().unwrap().action, "takeoff");
    assert!(result.backend_calls().is_empty());
    assert_eq!(result.result.unwrap()["dryRun"], true);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_dry_run_still_validates() {
    let backend = Arc::new(ScriptedBackend::new());
    let result = pipeline(&backend)
        .execute(&Command::new("move forward 600 cm").dry_run(), &ExecutionContext::new())
        .await;

    assert!(!result.success);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_confirmation_holds_dispatch() {
    let backend = Arc::new(ScriptedBackend::new());
    let options = CommandOptions {
        confirm_before_execution: Some(true),
        ..Default::default()
    };
    let result = pipeline(&backend)
        .execute(&Command::new("land").with_options(options), &ExecutionContext::new())
        .await;

    assert!(result.success);
    assert_eq!(result.result.as_ref().unwrap()["pendingConfirmation"], true);
    assert!(result.backend_calls().is_empty());
    assert!(backend.calls().is_empty());
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn test_success_carries_call_record_and_reply() {
    let backend = Arc::new(ScriptedBackend::new().reply(Operation::Takeoff, json!({ "altitude": 80 })));
    let result = pipeline(&backend)
        .execute(&Command::new("take off").with_device("tello-1"), &ExecutionContext::new())
        .await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.message, "takeoff executed successfully");
    assert_eq!(result.result.as_ref().unwrap()["altitude"], 80);

    let calls = result.backend_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].endpoint, "/api/drone/takeoff");
    assert_eq!(calls[0].method, HttpMethod::Post);
    assert_eq!(calls[0].status, 200);
    assert_eq!(backend.calls()[0].body, Some(json!({ "droneId": "tello-1" })));
}

#[tokio::test]
async fn test_launch_runs_connect_then_takeoff() {
    let backend = Arc::new(ScriptedBackend::new());
    let result = pipeline(&backend)
        .execute(&Command::new("launch"), &ExecutionContext::new())
        .await;

    assert!(result.success);
    let endpoints: Vec<_> = result.backend_calls().iter().map(|c| c.endpoint.as_str()).collect();
    assert_eq!(endpoints, vec!["/api/drone/connect", "/api/drone/takeoff"]);
}

#[tokio::test]
async fn test_launch_stops_when_connect_fails() {
    let backend = Arc::new(ScriptedBackend::new().fail(
        Operation::Connect,
        TaxonomyError::validation(codes::INVALID_PARAMETER, "unknown drone"),
    ));
    let result = pipeline(&backend)
        .execute(&Command::new("launch"), &ExecutionContext::new())
        .await;

    assert!(!result.success);
    assert_eq!(backend.call_count(Operation::Takeoff), 0);
}

#[tokio::test]
async fn test_move_gets_default_speed() {
    let backend = Arc::new(ScriptedBackend::new());
    let result = pipeline(&backend)
        .execute(&Command::new("fly forward 2 metres"), &ExecutionContext::new())
        .await;

    assert!(result.success, "{}", result.message);
    assert_eq!(
        backend.calls()[0].body,
        Some(json!({ "direction": "forward", "distance": 200, "speed": 50 }))
    );
}

// =============================================================================
// Retry
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_connection_refused_exhausts_retries() {
    let refused = TaxonomyError::network("connection refused").with_code(codes::CONNECTION_REFUSED);
    let backend = Arc::new(ScriptedBackend::new().fail(Operation::Connect, refused));

    let result = dispatcher(&backend)
        .dispatch_action("connect", Map::new(), None, &ExecutionContext::new())
        .await;

    assert!(!result.success);
    assert_eq!(backend.call_count(Operation::Connect), 3);
    assert_eq!(result.error.as_ref().unwrap().code, codes::CONNECTION_REFUSED);

    let calls = result.backend_calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.windows(2).all(|w| w[0].response_time_ms < w[1].response_time_ms));
    assert!(calls[2].response_time_ms >= 2_000);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_then_success() {
    let backend = Arc::new(ScriptedBackend::new().fail_times(
        Operation::Land,
        2,
        TaxonomyError::timeout("backend call exceeded 10000 ms"),
    ));

    let result = dispatcher(&backend)
        .dispatch_action("land", Map::new(), None, &ExecutionContext::new())
        .await;

    assert!(result.success);
    let statuses: Vec<u16> = result.backend_calls().iter().map(|c| c.status).collect();
    assert_eq!(statuses, vec![504, 504, 200]);
}

#[tokio::test]
async fn test_non_retryable_failure_is_not_retried() {
    let backend = Arc::new(ScriptedBackend::new().fail(
        Operation::StartTracking,
        TaxonomyError::business(codes::DUPLICATE_TRACKING_SESSION, "already tracking"),
    ));

    let result = dispatcher(&backend)
        .dispatch_action("start_tracking", params(json!({ "target": "car" })), None, &ExecutionContext::new())
        .await;

    assert!(!result.success);
    assert_eq!(backend.call_count(Operation::StartTracking), 1);
    assert_eq!(result.error.unwrap().code, codes::DUPLICATE_TRACKING_SESSION);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_waits_for_hint() {
    let backend = Arc::new(ScriptedBackend::new().fail_times(
        Operation::TakePhoto,
        1,
        TaxonomyError::rate_limited("slow down", Some(5_000)),
    ));

    let result = dispatcher(&backend)
        .dispatch_action("take_photo", Map::new(), None, &ExecutionContext::new())
        .await;

    assert!(result.success);
    let calls = result.backend_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].response_time_ms >= 5_000);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_wait_is_bounded_by_max_delay() {
    let mut config = AppConfig::default();
    config.retry.max_delay_ms = 3_000;
    let backend = Arc::new(ScriptedBackend::new().fail_times(
        Operation::TakePhoto,
        2,
        TaxonomyError::rate_limited("come back tomorrow", Some(86_400_000)),
    ));
    let dispatcher = Dispatcher::new(backend.clone(), ConfigHandle::fixed(config));

    let started = tokio::time::Instant::now();
    let result = dispatcher
        .dispatch_action("take_photo", Map::new(), None, &ExecutionContext::new())
        .await;

    assert!(result.success);
    assert_eq!(backend.call_count(Operation::TakePhoto), 3);
    assert!(started.elapsed() >= Duration::from_millis(6_000));
    assert!(started.elapsed() < Duration::from_millis(7_000));
}

#[tokio::test]
async fn test_retry_override_makes_single_call() {
    let backend = Arc::new(ScriptedBackend::new().fail(
        Operation::SystemHealth,
        TaxonomyError::network("connection refused"),
    ));
    let dispatcher = dispatcher(&backend).with_retry(RetryPolicy::none());

    let result = dispatcher
        .dispatch_action("system_health", Map::new(), None, &ExecutionContext::new())
        .await;

    assert!(!result.success);
    assert_eq!(backend.call_count(Operation::SystemHealth), 1);
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_config() {
    let mut config = AppConfig::default();
    config.retry.attempts = 1;
    let backend = Arc::new(ScriptedBackend::new().with_latency(Duration::from_millis(10)).fail(
        Operation::Takeoff,
        TaxonomyError::drone("motor fault"),
    ));
    let dispatcher = Dispatcher::new(backend.clone(), ConfigHandle::fixed(config));

    let result = dispatcher
        .dispatch_action("takeoff", Map::new(), None, &ExecutionContext::new())
        .await;

    assert!(!result.success);
    assert_eq!(backend.call_count(Operation::Takeoff), 1);
}
