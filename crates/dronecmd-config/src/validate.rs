//! Semantic validation beyond what the schema enforces.

use crate::error::ConfigError;
use crate::types::AppConfig;

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Collect every problem so the operator can fix them in one go
pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let mut problems = Vec::new();
    let mut check = |ok: bool, problem: String| {
        if !ok {
            problems.push(problem);
        }
    };

    check(config.server.port != 0, "server.port must not be 0".into());
    check(
        config.backend.url.starts_with("http://") || config.backend.url.starts_with("https://"),
        format!("backend.url '{}' must use http or https", config.backend.url),
    );
    check(config.backend.timeout_ms > 0, "backend.timeoutMs must be positive".into());
    check(
        LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()),
        format!(
            "logging.level '{}' must be one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ),
    );

    let retry = &config.retry;
    check(
        (1..=MAX_RETRY_ATTEMPTS).contains(&retry.attempts),
        format!("retry.attempts must be between 1 and {}", MAX_RETRY_ATTEMPTS),
    );
    check(
        retry.max_delay_ms >= retry.delay_ms,
        "retry.maxDelayMs must not be below retry.delayMs".into(),
    );

    let threshold = config.interpreter.confidence_threshold;
    check(
        (0.0..=1.0).contains(&threshold),
        format!("interpreter.confidenceThreshold {} must be within [0, 1]", threshold),
    );
    check(config.batch.max_concurrency >= 1, "batch.maxConcurrency must be at least 1".into());
    check(config.drone.max_drones >= 1, "drone.maxDrones must be at least 1".into());

    let limits = &config.limits;
    let m = &limits.movement;
    check(m.min_distance > 0, "limits.movement.minDistance must be positive".into());
    check(
        m.min_distance <= m.max_distance,
        "limits.movement.minDistance must not exceed maxDistance".into(),
    );
    check(m.min_speed > 0, "limits.movement.minSpeed must be positive".into());
    check(
        m.min_speed <= m.max_speed,
        "limits.movement.minSpeed must not exceed maxSpeed".into(),
    );
    check(
        (m.min_speed..=m.max_speed).contains(&config.drone.default_speed),
        format!(
            "drone.defaultSpeed {} must be within the movement speed limits",
            config.drone.default_speed
        ),
    );
    check(
        limits.rotation.min_angle <= limits.rotation.max_angle,
        "limits.rotation.minAngle must not exceed maxAngle".into(),
    );
    check(limits.altitude.max_height > 0, "limits.altitude.maxHeight must be positive".into());
    let battery = &limits.battery;
    check(
        (0..=100).contains(&battery.min_takeoff_percent)
            && (0..=100).contains(&battery.critical_percent),
        "limits.battery percentages must be within 0..=100".into(),
    );
    check(
        battery.critical_percent <= battery.min_takeoff_percent,
        "limits.battery.criticalPercent must not exceed minTakeoffPercent".into(),
    );

    let security = &config.security;
    check(
        security.rate_limit_window_ms > 0 && security.rate_limit_requests > 0,
        "security rate limit window and requests must be positive".into(),
    );

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(problems))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_problems() {
        let mut config = AppConfig::default();
        config.retry.attempts = 0;
        config.interpreter.confidence_threshold = 1.5;
        config.limits.movement.min_distance = 600;
        config.backend.url = "ftp://drone".to_string();

        match validate(&config) {
            Err(ConfigError::Invalid(problems)) => assert_eq!(problems.len(), 4),
            other => panic!("expected invalid config, got {:?}", other),
        }
    }
}
