//! Configuration Manager
//!
//! Owns the only writable copy of the configuration. Readers hold a
//! [`ConfigHandle`] and get immutable `Arc<AppConfig>` snapshots; a reload or
//! `set` swaps the snapshot atomically through a `watch` channel, so a reader
//! never sees a half-applied record.
//!
//! Layering on every load, reload and `set`:
//!
//! ```text
//! defaults ⊕ file layer (type-checked) ⊕ environment → validate → swap
//! ```
//!
//! A file key that has the right JSON type but an unusable value (out of
//! range, unknown variant) is dropped with a warning and its default kept.
//! Only a file that fails to parse is rejected outright.

use crate::env::{EnvOverrides, CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH};
use crate::error::ConfigError;
use crate::layer::{changed_keys, get_path, leaves, merge, set_path, type_checked};
use crate::types::AppConfig;
use crate::validate::validate;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 16;

/// Notification about the live configuration
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    Changed {
        old: Arc<AppConfig>,
        new: Arc<AppConfig>,
        changed_keys: Vec<String>,
        revision: u64,
    },
    /// A reload was rejected; the previous snapshot stays active
    ReloadFailed { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Unchanged,
    Applied { revision: u64 },
}

/// Read access to the live configuration
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    rx: watch::Receiver<Arc<AppConfig>>,
}

impl ConfigHandle {
    /// Handle on a configuration that never changes
    pub fn fixed(config: AppConfig) -> Self {
        let (_tx, rx) = watch::channel(Arc::new(config));
        Self { rx }
    }

    /// Current snapshot
    pub fn current(&self) -> Arc<AppConfig> {
        self.rx.borrow().clone()
    }

    /// Wait for the next swap. Returns `None` once the manager is gone.
    pub async fn changed(&mut self) -> Option<Arc<AppConfig>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

struct State {
    /// Type-checked content of the backing file
    layer: Value,
    fingerprint: Option<blake3::Hash>,
    revision: u64,
}

pub struct ConfigManager {
    path: PathBuf,
    env: EnvOverrides,
    state: Mutex<State>,
    tx: watch::Sender<Arc<AppConfig>>,
    events: broadcast::Sender<ConfigEvent>,
}

impl ConfigManager {
    /// Load from `DRONECMD_CONFIG` (or the default path) with process env overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_or_create(path, EnvOverrides::from_process())
    }

    /// Load the file at `path`, writing the defaults there first when it is
    /// missing. A parse failure here is fatal; bad values fall back to defaults.
    pub fn load_or_create(path: impl Into<PathBuf>, env: EnvOverrides) -> Result<Self, ConfigError> {
        let path = path.into();
        if !path.exists() {
            let bytes = serde_json::to_vec_pretty(&AppConfig::default()).map_err(ConfigError::Schema)?;
            write_file(&path, &bytes)?;
            info!(path = %path.display(), "created configuration file with defaults");
        }

        let bytes = read_file(&path)?;
        let layer = parse_layer(&path, &bytes)?;
        let config = build(&layer, &env)?;
        debug!(config = %config.redacted(), "configuration loaded");

        let (tx, _rx) = watch::channel(Arc::new(config));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            path,
            env,
            state: Mutex::new(State {
                layer,
                fingerprint: Some(blake3::hash(&bytes)),
                revision: 0,
            }),
            tx,
            events,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle(&self) -> ConfigHandle {
        ConfigHandle {
            rx: self.tx.subscribe(),
        }
    }

    pub fn current(&self) -> Arc<AppConfig> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigEvent> {
        self.events.subscribe()
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// JSON value at a dot path of the live configuration, e.g. `drone`
    /// or `limits.movement.maxDistance`
    pub fn get(&self, path: &str) -> Option<Value> {
        let value = serde_json::to_value(&*self.current()).ok()?;
        get_path(&value, path).cloned()
    }

    /// Change one value, validate, persist and swap.
    ///
    /// On any failure the previous configuration stays in place and the
    /// error is returned.
    pub fn set(&self, path: &str, value: Value) -> Result<Arc<AppConfig>, ConfigError> {
        let defaults = defaults_value()?;
        if path.is_empty() || get_path(&defaults, path).is_none() {
            return Err(ConfigError::UnknownKey(path.to_string()));
        }

        let mut state = self.lock();
        let mut candidate = state.layer.clone();
        set_path(&mut candidate, path, value);

        let mut problems = Vec::new();
        let candidate = type_checked(&defaults, &candidate, &mut problems);
        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }
        let config = build(&candidate, &self.env)?;

        if self.env.paths().iter().any(|p| *p == path) {
            warn!(key = path, "value stored but an environment override takes precedence");
        }

        let bytes = serde_json::to_vec_pretty(&candidate).map_err(ConfigError::Schema)?;
        write_file(&self.path, &bytes)?;

        state.layer = candidate;
        state.fingerprint = Some(blake3::hash(&bytes));
        self.commit(&mut state, config);
        Ok(self.current())
    }

    /// Re-read the backing file.
    ///
    /// Failures are reported through [`ConfigEvent::ReloadFailed`] and the
    /// last good snapshot keeps serving.
    pub fn reload(&self) -> Result<ReloadOutcome, ConfigError> {
        let mut state = self.lock();
        match self.try_reload(&mut state) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "configuration reload rejected, keeping previous");
                let _ = self.events.send(ConfigEvent::ReloadFailed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn try_reload(&self, state: &mut State) -> Result<ReloadOutcome, ConfigError> {
        let bytes = read_file(&self.path)?;
        let fingerprint = blake3::hash(&bytes);
        if state.fingerprint == Some(fingerprint) {
            debug!(path = %self.path.display(), "configuration file unchanged");
            return Ok(ReloadOutcome::Unchanged);
        }

        let layer = parse_layer(&self.path, &bytes)?;
        let config = build(&layer, &self.env)?;

        state.layer = layer;
        state.fingerprint = Some(fingerprint);
        Ok(match self.commit(state, config) {
            Some(revision) => ReloadOutcome::Applied { revision },
            None => ReloadOutcome::Unchanged,
        })
    }

    /// Swap in `config` if it differs from the live one
    fn commit(&self, state: &mut State, config: AppConfig) -> Option<u64> {
        let old = self.current();
        if *old == config {
            return None;
        }

        let keys = match (serde_json::to_value(&*old), serde_json::to_value(&config)) {
            (Ok(a), Ok(b)) => changed_keys(&a, &b),
            _ => Vec::new(),
        };
        let new = Arc::new(config);
        state.revision += 1;
        self.tx.send_replace(new.clone());

        info!(revision = state.revision, changed = ?keys, "configuration updated");
        let _ = self.events.send(ConfigEvent::Changed {
            old,
            new,
            changed_keys: keys,
            revision: state.revision,
        });
        Some(state.revision)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn defaults_value() -> Result<Value, ConfigError> {
    serde_json::to_value(AppConfig::default()).map_err(ConfigError::Schema)
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write through a sibling temp file so readers never see a partial file
fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}

fn parse_layer(path: &Path, bytes: &[u8]) -> Result<Value, ConfigError> {
    let raw: Value = serde_json::from_slice(bytes).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let defaults = defaults_value()?;
    let mut warnings = Vec::new();
    let layer = type_checked(&defaults, &raw, &mut warnings);
    let layer = value_checked(&defaults, layer, &mut warnings);
    for warning in &warnings {
        warn!(path = %path.display(), "{}", warning);
    }
    Ok(layer)
}

/// Drop file keys whose values do not deserialize or validate.
///
/// The layer is kept whole when it resolves cleanly, so related keys (a min
/// and its max) can change together. Otherwise keys are admitted one at a
/// time in path order.
fn value_checked(defaults: &Value, layer: Value, warnings: &mut Vec<String>) -> Value {
    if resolve(defaults, &layer).is_ok() {
        return layer;
    }

    let mut accepted = Value::Object(Map::new());
    for (path, value) in leaves(&layer) {
        let mut trial = accepted.clone();
        set_path(&mut trial, &path, value);
        match resolve(defaults, &trial) {
            Ok(_) => accepted = trial,
            Err(err) => warnings.push(format!("'{}' rejected, default kept: {}", path, err)),
        }
    }
    accepted
}

fn resolve(defaults: &Value, layer: &Value) -> Result<AppConfig, ConfigError> {
    let mut value = defaults.clone();
    merge(&mut value, layer);
    let config: AppConfig = serde_json::from_value(value).map_err(ConfigError::Schema)?;
    validate(&config)?;
    Ok(config)
}

fn build(layer: &Value, env: &EnvOverrides) -> Result<AppConfig, ConfigError> {
    let mut value = defaults_value()?;
    merge(&mut value, layer);
    env.apply(&mut value)?;
    let config: AppConfig = serde_json::from_value(value).map_err(ConfigError::Schema)?;
    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager_with(content: Option<&str>, env: EnvOverrides) -> (tempfile::TempDir, ConfigManager) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dronecmd.json");
        if let Some(content) = content {
            std::fs::write(&path, content).unwrap();
        }
        let manager = ConfigManager::load_or_create(&path, env).unwrap();
        (dir, manager)
    }

    #[test]
    fn test_creates_missing_file() {
        let (dir, manager) = manager_with(None, EnvOverrides::default());
        assert!(dir.path().join("dronecmd.json").exists());
        assert_eq!(*manager.current(), AppConfig::default());
    }

    #[test]
    fn test_invalid_json_is_fatal_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dronecmd.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ConfigManager::load_or_create(&path, EnvOverrides::default()).err().unwrap();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_wrong_types_fall_back_to_defaults() {
        let (_dir, manager) = manager_with(
            Some(r#"{"server": {"port": "not a port"}, "drone": {"maxDrones": 7}}"#),
            EnvOverrides::default(),
        );
        assert_eq!(manager.current().server.port, 8080);
        assert_eq!(manager.current().drone.max_drones, 7);
    }

    #[test]
    fn test_bad_values_fall_back_to_defaults() {
        let cases = [
            r#"{"backend": {"timeoutMs": -5}, "drone": {"maxDrones": 7}}"#,
            r#"{"retry": {"attempts": 50}, "drone": {"maxDrones": 7}}"#,
            r#"{"retry": {"backoff": "linear"}, "drone": {"maxDrones": 7}}"#,
            r#"{"server": {"port": 70000}, "drone": {"maxDrones": 7}}"#,
        ];
        let defaults = AppConfig::default();

        for content in cases {
            let (_dir, manager) = manager_with(Some(content), EnvOverrides::default());
            let config = manager.current();
            assert_eq!(config.drone.max_drones, 7, "{}", content);
            assert_eq!(config.backend.timeout_ms, defaults.backend.timeout_ms);
            assert_eq!(config.retry, defaults.retry);
            assert_eq!(config.server.port, defaults.server.port);
        }
    }

    #[test]
    fn test_related_limits_change_together() {
        let (_dir, manager) = manager_with(
            Some(r#"{"limits": {"movement": {"minDistance": 600, "maxDistance": 1000}}}"#),
            EnvOverrides::default(),
        );
        assert_eq!(manager.current().limits.movement.min_distance, 600);
        assert_eq!(manager.current().limits.movement.max_distance, 1000);
    }

    #[test]
    fn test_reload_drops_only_bad_values() {
        let (dir, manager) = manager_with(None, EnvOverrides::default());
        let path = dir.path().join("dronecmd.json");

        std::fs::write(&path, r#"{"drone": {"maxDrones": 10}, "retry": {"attempts": 0}}"#).unwrap();
        assert_eq!(manager.reload().unwrap(), ReloadOutcome::Applied { revision: 1 });
        assert_eq!(manager.current().drone.max_drones, 10);
        assert_eq!(manager.current().retry.attempts, 3);
    }

    #[test]
    fn test_env_always_wins() {
        let env = EnvOverrides::from_pairs([("DRONECMD_MAX_DRONES", "3")]);
        let (_dir, manager) = manager_with(Some(r#"{"drone": {"maxDrones": 7}}"#), env);
        assert_eq!(manager.get("drone.maxDrones"), Some(json!(3)));

        manager.set("drone.maxDrones", json!(9)).unwrap();
        assert_eq!(manager.current().drone.max_drones, 3);
    }

    #[test]
    fn test_set_persists_and_swaps() {
        let (dir, manager) = manager_with(None, EnvOverrides::default());
        let handle = manager.handle();
        let mut events = manager.subscribe();

        manager.set("retry.attempts", json!(5)).unwrap();

        assert_eq!(handle.current().retry.attempts, 5);
        assert_eq!(manager.revision(), 1);
        let on_disk: Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("dronecmd.json")).unwrap()).unwrap();
        assert_eq!(on_disk["retry"]["attempts"], 5);

        match events.try_recv().unwrap() {
            ConfigEvent::Changed {
                changed_keys,
                revision,
                ..
            } => {
                assert_eq!(changed_keys, vec!["retry.attempts"]);
                assert_eq!(revision, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }

        // Our own write must not count as an external change
        assert_eq!(manager.reload().unwrap(), ReloadOutcome::Unchanged);
    }

    #[test]
    fn test_set_rolls_back_on_invalid_value() {
        let (_dir, manager) = manager_with(None, EnvOverrides::default());
        let before = manager.current();

        let err = manager.set("retry.attempts", json!(50)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert_eq!(manager.current(), before);

        let err = manager.set("retry.attempts", json!("three")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = manager.set("retry.nope", json!(1)).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
        assert_eq!(manager.revision(), 0);
    }

    #[test]
    fn test_reload_keeps_last_good_config() {
        let (dir, manager) = manager_with(None, EnvOverrides::default());
        let path = dir.path().join("dronecmd.json");
        let mut events = manager.subscribe();

        std::fs::write(&path, r#"{"drone": {"maxDrones": 10}}"#).unwrap();
        assert_eq!(manager.reload().unwrap(), ReloadOutcome::Applied { revision: 1 });
        assert_eq!(manager.get("drone").unwrap()["maxDrones"], 10);
        assert!(matches!(events.try_recv().unwrap(), ConfigEvent::Changed { .. }));

        std::fs::write(&path, "{ broken").unwrap();
        assert!(manager.reload().is_err());
        assert_eq!(manager.current().drone.max_drones, 10);
        assert!(matches!(events.try_recv().unwrap(), ConfigEvent::ReloadFailed { .. }));
    }

    #[test]
    fn test_fixed_handle() {
        let mut config = AppConfig::default();
        config.retry.attempts = 2;
        let handle = ConfigHandle::fixed(config);
        assert_eq!(handle.current().retry.attempts, 2);
    }
}
