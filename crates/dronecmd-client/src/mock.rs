//! In-memory backend with scripted outcomes, for tests and dry setups.

use crate::request::{BackendFailure, BackendReply, BackendRequest, Operation};
use crate::{BackendClient, BackendResult};
use async_trait::async_trait;
use dronecmd_core::TaxonomyError;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Outcome {
    Reply(Value),
    Fail(TaxonomyError),
}

#[derive(Debug, Default)]
struct Script {
    queued: HashMap<Operation, VecDeque<Outcome>>,
    standing: HashMap<Operation, Outcome>,
    latency: HashMap<Operation, Duration>,
    calls: Vec<BackendRequest>,
}

/// Backend that answers from a script.
///
/// Queued outcomes are consumed first, then the standing outcome for the
/// operation applies. Without either, every call succeeds with
/// `{"success": true}`.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
    latency: Duration,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay calls to one operation, overriding the global latency
    pub fn with_operation_latency(self, operation: Operation, latency: Duration) -> Self {
        self.lock().latency.insert(operation, latency);
        self
    }

    /// Answer every call to `operation` with `body`
    pub fn reply(self, operation: Operation, body: Value) -> Self {
        self.lock().standing.insert(operation, Outcome::Reply(body));
        self
    }

    /// Fail every call to `operation`
    pub fn fail(self, operation: Operation, error: TaxonomyError) -> Self {
        self.lock().standing.insert(operation, Outcome::Fail(error));
        self
    }

    /// Fail the next `times` calls to `operation`, then fall back to the
    /// standing outcome
    pub fn fail_times(self, operation: Operation, times: usize, error: TaxonomyError) -> Self {
        {
            let mut script = self.lock();
            let queue = script.queued.entry(operation).or_default();
            queue.extend(std::iter::repeat(Outcome::Fail(error)).take(times));
        }
        self
    }

    /// Every request received so far, in arrival order
    pub fn calls(&self) -> Vec<BackendRequest> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|r| r.operation == operation)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl BackendClient for ScriptedBackend {
    async fn execute(&self, request: BackendRequest) -> BackendResult {
        let operation = request.operation;
        let (outcome, latency) = {
            let mut script = self.lock();
            script.calls.push(request);
            let queued = script.queued.get_mut(&operation).and_then(VecDeque::pop_front);
            let outcome = queued
                .or_else(|| script.standing.get(&operation).cloned())
                .unwrap_or_else(|| Outcome::Reply(json!({ "success": true })));
            let latency = script.latency.get(&operation).copied().unwrap_or(self.latency);
            (outcome, latency)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match outcome {
            Outcome::Reply(body) => Ok(BackendReply {
                status: 200,
                body,
                elapsed: latency,
            }),
            Outcome::Fail(error) => {
                let status = error.http_status();
                Err(BackendFailure::new(error.with_operation(operation.name()), status, latency))
            }
        }
    }
}
