//! Data Model: Command, Intent, CommandResult, BatchRequest, BatchResult
use crate::error::{SerializedError, TaxonomyError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Message carried by commands a stop-on-error batch never dispatched
pub const SKIPPED_PRIOR_FAILURE: &str = "skipped: prior command failed";
/// Message carried by commands dropped because the batch was cancelled
pub const SKIPPED_CANCELLED: &str = "skipped: batch cancelled";

/// An incoming request. Immutable after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Free text, e.g. "move forward 100 cm"
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CommandContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<CommandOptions>,
}

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
            options: None,
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        let mut ctx = self.context.unwrap_or_default();
        ctx.device_id = Some(device_id.into());
        self.context = Some(ctx);
        self
    }

    pub fn with_options(mut self, options: CommandOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn dry_run(self) -> Self {
        let mut options = self.options.clone().unwrap_or_default();
        options.dry_run = Some(true);
        self.with_options(options)
    }

    pub fn is_dry_run(&self) -> bool {
        self.options.as_ref().map_or(false, CommandOptions::is_dry_run)
    }

    pub fn device_id(&self) -> Option<&str> {
        self.context.as_ref().and_then(|c| c.device_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_before_execution: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CommandOptions {
    pub fn is_dry_run(&self) -> bool {
        self.dry_run == Some(true)
    }

    pub fn requires_confirmation(&self) -> bool {
        self.confirm_before_execution == Some(true)
    }
}

/// Structured interpretation of a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub action: String,
    pub parameters: Map<String, Value>,
    /// 0.0 to 1.0
    pub confidence: f64,
}

impl Intent {
    pub fn new(action: impl Into<String>, parameters: Map<String, Value>, confidence: f64) -> Self {
        Self {
            action: action.into(),
            parameters,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

/// One outbound backend call. Status 0 means no HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendCallRecord {
    pub endpoint: String,
    pub method: HttpMethod,
    pub status: u16,
    pub response_time_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDetails {
    pub backend_calls: Vec<BackendCallRecord>,
    pub execution_time_ms: u64,
}

/// Terminal outcome of one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_details: Option<ExecutionDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SerializedError>,
    /// Set when a batch never dispatched this command
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    pub timestamp: DateTime<Utc>,
}

impl CommandResult {
    pub fn succeeded(
        message: impl Into<String>,
        intent: Intent,
        details: ExecutionDetails,
        result: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            intent: Some(intent),
            execution_details: Some(details),
            result,
            error: None,
            skipped: false,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(
        error: &TaxonomyError,
        intent: Option<Intent>,
        details: Option<ExecutionDetails>,
    ) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            intent,
            execution_details: details,
            result: None,
            error: Some(error.to_serializable()),
            skipped: false,
            timestamp: Utc::now(),
        }
    }

    pub fn skipped(reason: &str) -> Self {
        Self {
            success: false,
            message: reason.to_string(),
            intent: None,
            execution_details: None,
            result: None,
            error: None,
            skipped: true,
            timestamp: Utc::now(),
        }
    }

    pub fn backend_calls(&self) -> &[BackendCallRecord] {
        self.execution_details
            .as_ref()
            .map(|d| d.backend_calls.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Parallel => write!(f, "parallel"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub commands: Vec<Command>,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub stop_on_error: bool,
}

/// Derived counters. Skipped commands are included in `failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_execution_time_ms: u64,
}

impl BatchSummary {
    pub fn from_results(results: &[CommandResult], total_execution_time_ms: u64) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            skipped: results.iter().filter(|r| r.skipped).count(),
            total_execution_time_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub success: bool,
    pub message: String,
    pub results: Vec<CommandResult>,
    pub summary: BatchSummary,
    pub timestamp: DateTime<Utc>,
}

impl BatchResult {
    pub fn from_results(results: Vec<CommandResult>, total_execution_time_ms: u64) -> Self {
        let summary = BatchSummary::from_results(&results, total_execution_time_ms);
        Self {
            success: summary.failed == 0,
            message: format!(
                "Batch completed: {}/{} commands succeeded",
                summary.successful, summary.total
            ),
            results,
            summary,
            timestamp: Utc::now(),
        }
    }
}
