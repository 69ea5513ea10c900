use dronecmd_core::TaxonomyError;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config does not match the schema: {0}")]
    Schema(#[source] serde_json::Error),
    #[error("environment variable {var}={value} is invalid: {reason}")]
    Env {
        var: String,
        value: String,
        reason: String,
    },
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

impl From<ConfigError> for TaxonomyError {
    fn from(err: ConfigError) -> Self {
        let details = match &err {
            ConfigError::Invalid(problems) => Some(json!({ "problems": problems })),
            ConfigError::UnknownKey(key) => Some(json!({ "key": key })),
            ConfigError::Env { var, .. } => Some(json!({ "variable": var })),
            _ => None,
        };
        let taxonomy = TaxonomyError::configuration(err.to_string()).with_operation("config");
        match details {
            Some(d) => taxonomy.with_details(d),
            None => taxonomy,
        }
    }
}
