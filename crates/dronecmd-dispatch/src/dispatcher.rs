//! Command Dispatcher
//!
//! Turns a validated [`Intent`] into backend calls. Each command walks
//!
//! ```text
//! Interpreted → Validated → DryRunComplete
//!                        → AwaitingConfirmation
//!                        → Dispatching → Succeeded | Failed
//! ```
//!
//! Parameter limits and the retry policy are read from the live
//! configuration on every dispatch.

use crate::retry::RetryPolicy;
use dronecmd_client::{BackendClient, BackendReply, BackendRequest, Operation};
use dronecmd_config::ConfigHandle;
use dronecmd_core::{
    codes, BackendCallRecord, CommandOptions, CommandResult, ExecutionContext, ExecutionDetails,
    Intent, TaxonomyError,
};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where a command is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Interpreted,
    Validated,
    DryRunComplete,
    AwaitingConfirmation,
    Dispatching,
    Succeeded,
    Failed,
}

impl DispatchState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DispatchState::DryRunComplete
                | DispatchState::AwaitingConfirmation
                | DispatchState::Succeeded
                | DispatchState::Failed
        )
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            DispatchState::Interpreted => "interpreted",
            DispatchState::Validated => "validated",
            DispatchState::DryRunComplete => "dry_run_complete",
            DispatchState::AwaitingConfirmation => "awaiting_confirmation",
            DispatchState::Dispatching => "dispatching",
            DispatchState::Succeeded => "succeeded",
            DispatchState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Backend operations an action expands to, in call order
pub fn plan_for(action: &str) -> Option<Vec<Operation>> {
    match action {
        "launch" => Some(vec![Operation::Connect, Operation::Takeoff]),
        other => Operation::from_name(other).map(|op| vec![op]),
    }
}

/// Tracks one command through the state machine
struct Run<'a> {
    ctx: &'a ExecutionContext,
    intent: Intent,
    state: DispatchState,
    started: Instant,
    calls: Vec<BackendCallRecord>,
}

impl<'a> Run<'a> {
    fn new(ctx: &'a ExecutionContext, intent: Intent) -> Self {
        Self {
            ctx,
            intent,
            state: DispatchState::Interpreted,
            started: Instant::now(),
            calls: Vec::new(),
        }
    }

    fn advance(&mut self, next: DispatchState) {
        debug!(
            correlation_id = %self.ctx.correlation_id,
            action = %self.intent.action,
            from = %self.state,
            to = %next,
            "dispatch state"
        );
        self.state = next;
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn record(&mut self, request: &BackendRequest, status: u16) {
        self.calls.push(BackendCallRecord {
            endpoint: request.endpoint().to_string(),
            method: request.method(),
            status,
            response_time_ms: self.elapsed_ms(),
        });
    }

    fn details(&self) -> ExecutionDetails {
        ExecutionDetails {
            backend_calls: self.calls.clone(),
            execution_time_ms: self.elapsed_ms(),
        }
    }

    fn succeed(mut self, message: String, result: Map<String, Value>, state: DispatchState) -> CommandResult {
        self.advance(state);
        let details = self.details();
        CommandResult::succeeded(message, self.intent, details, Some(result))
    }

    fn fail(mut self, err: TaxonomyError) -> CommandResult {
        self.advance(DispatchState::Failed);
        let err = self.ctx.annotate(err);
        err.log();
        let details = self.details();
        CommandResult::failed(&err, Some(self.intent), Some(details))
    }
}

/// Validates intents and issues the matching backend calls
#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn BackendClient>,
    config: ConfigHandle,
    /// Replaces the configured retry policy when set
    retry: Option<RetryPolicy>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn BackendClient>, config: ConfigHandle) -> Self {
        Self {
            client,
            config,
            retry: None,
        }
    }

    /// Use `policy` instead of the live `retry` configuration
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn BackendClient> {
        &self.client
    }

    /// Dispatch an action directly, bypassing the interpreter.
    ///
    /// The intent gets confidence 1.0 and goes through the same validation.
    pub async fn dispatch_action(
        &self,
        action: &str,
        parameters: Map<String, Value>,
        options: Option<&CommandOptions>,
        ctx: &ExecutionContext,
    ) -> CommandResult {
        let mut parameters = parameters;
        if let Some(device_id) = &ctx.device_id {
            parameters
                .entry("droneId")
                .or_insert_with(|| Value::from(device_id.as_str()));
        }
        self.dispatch(Intent::new(action, parameters, 1.0), options, ctx)
            .await
    }

    /// Run one intent to a terminal [`CommandResult`]
    pub async fn dispatch(
        &self,
        intent: Intent,
        options: Option<&CommandOptions>,
        ctx: &ExecutionContext,
    ) -> CommandResult {
        let config = self.config.current();
        let mut run = Run::new(ctx, intent);

        let plan = match plan_for(&run.intent.action) {
            Some(plan) => plan,
            None => {
                let err = TaxonomyError::validation(
                    codes::UNKNOWN_ACTION,
                    format!("unknown action '{}'", run.intent.action),
                )
                .with_details(json!({ "action": run.intent.action }));
                return run.fail(err);
            }
        };

        if run.intent.action == "move" && run.intent.param("speed").is_none() {
            run.intent
                .parameters
                .insert("speed".to_string(), Value::from(config.drone.default_speed));
        }

        if let Err(err) = dronecmd_policy::validate_intent(&config.limits, &run.intent) {
            return run.fail(err);
        }
        run.advance(DispatchState::Validated);

        let action = run.intent.action.clone();
        if options.map_or(false, CommandOptions::is_dry_run) {
            let result = json_map(json!({ "dryRun": true, "plan": plan_names(&plan) }));
            return run.succeed(
                format!("Dry run: {} validated, not executed", action),
                result,
                DispatchState::DryRunComplete,
            );
        }
        if options.map_or(false, CommandOptions::requires_confirmation) {
            let result = json_map(json!({ "pendingConfirmation": true, "plan": plan_names(&plan) }));
            return run.succeed(
                format!("{} awaiting confirmation", action),
                result,
                DispatchState::AwaitingConfirmation,
            );
        }

        run.advance(DispatchState::Dispatching);
        let policy = self
            .retry
            .clone()
            .unwrap_or_else(|| RetryPolicy::from_config(&config.retry));
        let mut last_reply = None;
        for operation in plan {
            let request = BackendRequest::from_parameters(operation, &run.intent.parameters);
            match self.call_with_retry(&mut run, &policy, request).await {
                Ok(reply) => last_reply = Some(reply),
                Err(err) => return run.fail(err),
            }
        }

        info!(
            correlation_id = %ctx.correlation_id,
            action = %action,
            calls = run.calls.len(),
            elapsed_ms = run.elapsed_ms(),
            "command executed"
        );
        let result = last_reply.map(BackendReply::into_map).unwrap_or_default();
        run.succeed(
            format!("{} executed successfully", action),
            result,
            DispatchState::Succeeded,
        )
    }

    async fn call_with_retry(
        &self,
        run: &mut Run<'_>,
        policy: &RetryPolicy,
        request: BackendRequest,
    ) -> Result<BackendReply, TaxonomyError> {
        let mut attempt = 1;
        loop {
            match self.client.execute(request.clone()).await {
                Ok(reply) => {
                    run.record(&request, reply.status);
                    return Ok(reply);
                }
                Err(failure) => {
                    run.record(&request, failure.status);
                    let err = failure.error;
                    if !policy.should_retry(attempt, &err) {
                        return Err(err.with_metadata(json!({ "attempts": attempt })));
                    }
                    let wait = policy.delay_for(attempt, &err);
                    warn!(
                        correlation_id = %run.ctx.correlation_id,
                        operation = %request.operation,
                        attempt,
                        code = err.code(),
                        wait_ms = wait.as_millis() as u64,
                        "backend call failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn plan_names(plan: &[Operation]) -> Value {
    plan.iter().map(|op| Value::from(op.name())).collect()
}

fn json_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_for() {
        assert_eq!(plan_for("launch"), Some(vec![Operation::Connect, Operation::Takeoff]));
        assert_eq!(plan_for("move"), Some(vec![Operation::Move]));
        assert_eq!(plan_for("emergency_stop"), Some(vec![Operation::EmergencyStop]));
        assert_eq!(plan_for("barrel_roll"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(DispatchState::Succeeded.is_terminal());
        assert!(DispatchState::DryRunComplete.is_terminal());
        assert!(!DispatchState::Dispatching.is_terminal());
        assert_eq!(DispatchState::AwaitingConfirmation.to_string(), "awaiting_confirmation");
    }
}
