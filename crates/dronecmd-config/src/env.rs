//! Environment overrides.
//!
//! Each variable maps onto one nested configuration path. Overrides are
//! applied after every load, reload and `set`, so the environment always wins.

use crate::error::ConfigError;
use crate::layer::set_path;
use serde_json::Value;

/// Variable naming the configuration file
pub const CONFIG_PATH_VAR: &str = "DRONECMD_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/dronecmd.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Str,
    Int,
    Float,
}

const MAPPINGS: &[(&str, &str, Kind)] = &[
    ("DRONECMD_HOST", "server.host", Kind::Str),
    ("DRONECMD_PORT", "server.port", Kind::Int),
    ("DRONECMD_BACKEND_URL", "backend.url", Kind::Str),
    ("DRONECMD_TIMEOUT_MS", "backend.timeoutMs", Kind::Int),
    ("DRONECMD_LOG_LEVEL", "logging.level", Kind::Str),
    ("DRONECMD_RETRY_ATTEMPTS", "retry.attempts", Kind::Int),
    ("DRONECMD_RETRY_DELAY_MS", "retry.delayMs", Kind::Int),
    ("DRONECMD_CONFIDENCE_THRESHOLD", "interpreter.confidenceThreshold", Kind::Float),
    ("DRONECMD_BATCH_CONCURRENCY", "batch.maxConcurrency", Kind::Int),
    ("DRONECMD_MAX_DRONES", "drone.maxDrones", Kind::Int),
    ("DRONECMD_API_KEY", "security.apiKey", Kind::Str),
    ("DRONECMD_JWT_SECRET", "security.jwtSecret", Kind::Str),
];

/// A snapshot of the overriding variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    vars: Vec<(String, String)>,
}

impl EnvOverrides {
    /// Capture the known variables from the process environment
    pub fn from_process() -> Self {
        Self::from_pairs(
            MAPPINGS
                .iter()
                .filter_map(|(var, _, _)| std::env::var(var).ok().map(|v| (var.to_string(), v))),
        )
    }

    /// Build from explicit pairs; unknown names are ignored
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _): &(String, String)| mapping(k).is_some())
            .collect();
        Self { vars }
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Dot paths these overrides pin
    pub fn paths(&self) -> Vec<&'static str> {
        self.vars
            .iter()
            .filter_map(|(name, _)| mapping(name).map(|(_, path, _)| *path))
            .collect()
    }

    /// Write every override into `config`
    pub fn apply(&self, config: &mut Value) -> Result<(), ConfigError> {
        for (name, raw) in &self.vars {
            let Some((_, path, kind)) = mapping(name) else {
                continue;
            };
            let value = parse(*kind, raw).map_err(|reason| ConfigError::Env {
                var: name.clone(),
                value: raw.clone(),
                reason,
            })?;
            set_path(config, path, value);
        }
        Ok(())
    }
}

fn mapping(name: &str) -> Option<&'static (&'static str, &'static str, Kind)> {
    MAPPINGS.iter().find(|(var, _, _)| *var == name)
}

fn parse(kind: Kind, raw: &str) -> Result<Value, String> {
    let raw = raw.trim();
    match kind {
        Kind::Str => Ok(Value::from(raw)),
        Kind::Int => raw
            .parse::<u64>()
            .map(Value::from)
            .map_err(|e| format!("expected an unsigned integer ({})", e)),
        Kind::Float => raw
            .parse::<f64>()
            .map(Value::from)
            .map_err(|e| format!("expected a number ({})", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_overrides() {
        let env = EnvOverrides::from_pairs([
            ("DRONECMD_PORT", "9090"),
            ("DRONECMD_CONFIDENCE_THRESHOLD", "0.75"),
            ("DRONECMD_API_KEY", "s3cret"),
            ("UNRELATED", "x"),
        ]);
        let mut config = json!({"server": {"port": 8080}});
        env.apply(&mut config).unwrap();

        assert_eq!(config["server"]["port"], 9090);
        assert_eq!(config["interpreter"]["confidenceThreshold"], 0.75);
        assert_eq!(config["security"]["apiKey"], "s3cret");
        assert_eq!(env.paths().len(), 3);
    }

    #[test]
    fn test_invalid_number() {
        let env = EnvOverrides::from_pairs([("DRONECMD_RETRY_ATTEMPTS", "many")]);
        let err = env.apply(&mut json!({})).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "DRONECMD_RETRY_ATTEMPTS"));
    }
}
