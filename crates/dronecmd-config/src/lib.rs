//! dronecmd Config: the Configuration Manager
//!
//! Loads a JSON record, layers it over documented defaults and environment
//! overrides, validates it and serves immutable snapshots. The backing file
//! is watched and hot-reloaded; a broken edit never replaces a good config.
//!
//! # Example
//!
//! ```no_run
//! use dronecmd_config::{ConfigManager, EnvOverrides};
//!
//! let manager = ConfigManager::load_or_create("config/dronecmd.json", EnvOverrides::from_process())?;
//! let handle = manager.handle();
//!
//! assert_eq!(handle.current().retry.attempts, 3);
//! manager.set("drone.maxDrones", serde_json::json!(10))?;
//! # Ok::<(), dronecmd_config::ConfigError>(())
//! ```

pub mod env;
pub mod error;
pub mod layer;
pub mod manager;
pub mod redact;
pub mod types;
pub mod validate;
pub mod watcher;

pub use env::{EnvOverrides, CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH};
pub use error::ConfigError;
pub use manager::{ConfigEvent, ConfigHandle, ConfigManager, ReloadOutcome};
pub use redact::redact;
pub use types::{
    AppConfig, Backoff, BackendConfig, BatchConfig, DroneConfig, InterpreterConfig, LoggingConfig,
    RetryConfig, SecurityConfig, ServerConfig, SCHEMA_VERSION,
};
pub use validate::validate;
pub use watcher::{spawn_watcher, WatcherGuard, DEFAULT_DEBOUNCE};

pub use dronecmd_policy::Limits;
