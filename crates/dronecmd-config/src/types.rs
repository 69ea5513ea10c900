//! Configuration record and its documented defaults.
//!
//! Every section deserializes with `#[serde(default)]`, so a file only needs
//! the keys it wants to change.

use dronecmd_policy::Limits;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub schema_version: u32,
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
    pub retry: RetryConfig,
    pub interpreter: InterpreterConfig,
    pub batch: BatchConfig,
    pub drone: DroneConfig,
    pub limits: Limits,
    pub security: SecurityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
            logging: LoggingConfig::default(),
            retry: RetryConfig::default(),
            interpreter: InterpreterConfig::default(),
            batch: BatchConfig::default(),
            drone: DroneConfig::default(),
            limits: Limits::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl AppConfig {
    /// JSON form with secrets masked, safe to log or return over HTTP
    pub fn redacted(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(value) => crate::redact::redact(&value),
            Err(_) => serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendConfig {
    pub url: String,
    /// Per-call timeout
    pub timeout_ms: u64,
    /// Sent as the client identification header on every call
    pub client_id: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            timeout_ms: 10_000,
            client_id: "dronecmd".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub attempts: u32,
    pub delay_ms: u64,
    pub backoff: Backoff,
    /// Upper bound for exponential delays
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 1_000,
            backoff: Backoff::Fixed,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterpreterConfig {
    pub confidence_threshold: f64,
    /// Grammar file; the embedded grammar is used when unset
    pub grammar_path: Option<String>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            grammar_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchConfig {
    /// Commands in flight at once in parallel mode
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DroneConfig {
    pub max_drones: u32,
    /// Speed used for moves that don't name one, in cm/s
    pub default_speed: i64,
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            max_drones: 5,
            default_speed: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityConfig {
    pub token_expiry_secs: u64,
    pub rate_limit_window_ms: u64,
    pub rate_limit_requests: u32,
    /// Required as `x-api-key` on every request when set
    pub api_key: Option<String>,
    pub jwt_secret: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            token_expiry_secs: 3_600,
            rate_limit_window_ms: 60_000,
            rate_limit_requests: 100,
            api_key: None,
            jwt_secret: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_documented_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.backend.timeout_ms, 10_000);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.delay_ms, 1_000);
        assert_eq!(config.retry.backoff, Backoff::Fixed);
        assert_eq!(config.interpreter.confidence_threshold, 0.6);
        assert_eq!(config.drone.max_drones, 5);
        assert_eq!(config.security.rate_limit_requests, 100);
    }

    #[test]
    fn test_camel_case_keys() {
        let value = serde_json::to_value(AppConfig::default()).unwrap();
        assert_eq!(value["drone"]["maxDrones"], 5);
        assert_eq!(value["limits"]["movement"]["maxDistance"], 500);
        assert_eq!(value["retry"]["backoff"], "fixed");
    }

    #[test]
    fn test_partial_sections() {
        let config: AppConfig = serde_json::from_value(json!({
            "retry": {"attempts": 5},
            "drone": {"maxDrones": 10}
        }))
        .unwrap();
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.delay_ms, 1_000);
        assert_eq!(config.drone.max_drones, 10);
        assert_eq!(config.drone.default_speed, 50);
    }
}
