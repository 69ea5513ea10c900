//! Constraint validation for intents
//!
//! Operational limits live in the configuration; a [`ConstraintTable`] is
//! rebuilt from them for every dispatch so reloaded limits apply at once.

use crate::verdict::{Verdict, Violation};
use dronecmd_core::{codes, Intent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

pub const DIRECTIONS: [&str; 6] = ["up", "down", "left", "right", "forward", "back"];
pub const ROTATIONS: [&str; 2] = ["cw", "ccw"];

/// Per-domain operational limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Limits {
    pub movement: MovementLimits,
    pub rotation: RotationLimits,
    pub altitude: AltitudeLimits,
    pub battery: BatteryLimits,
}

/// Distances in cm, speeds in cm/s
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MovementLimits {
    pub min_distance: i64,
    pub max_distance: i64,
    pub min_speed: i64,
    pub max_speed: i64,
}

impl Default for MovementLimits {
    fn default() -> Self {
        Self {
            min_distance: 20,
            max_distance: 500,
            min_speed: 10,
            max_speed: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RotationLimits {
    pub min_angle: i64,
    pub max_angle: i64,
}

impl Default for RotationLimits {
    fn default() -> Self {
        Self {
            min_angle: 1,
            max_angle: 360,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AltitudeLimits {
    /// Largest single upward move, in cm
    pub max_height: i64,
}

impl Default for AltitudeLimits {
    fn default() -> Self {
        Self { max_height: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatteryLimits {
    pub min_takeoff_percent: i64,
    pub critical_percent: i64,
}

impl Default for BatteryLimits {
    fn default() -> Self {
        Self {
            min_takeoff_percent: 20,
            critical_percent: 10,
        }
    }
}

/// What a parameter value must satisfy
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Integer within `min..=max`
    Range { min: i64, max: i64 },
    /// One of a fixed set of strings
    OneOf(Vec<String>),
    /// Any non-empty string
    NonEmpty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamConstraint {
    pub name: String,
    pub required: bool,
    pub rule: Rule,
}

impl ParamConstraint {
    pub fn required(name: &str, rule: Rule) -> Self {
        Self {
            name: name.to_string(),
            required: true,
            rule,
        }
    }

    pub fn optional(name: &str, rule: Rule) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            rule,
        }
    }

    fn check(&self, value: Option<&Value>) -> Option<Violation> {
        let value = match value {
            None | Some(Value::Null) if self.required => {
                return Some(Violation::new(
                    codes::MISSING_PARAMETER,
                    &self.name,
                    format!("{} is required", self.name),
                ));
            }
            None | Some(Value::Null) => return None,
            Some(v) => v,
        };

        match &self.rule {
            // Ranged parameters are whole numbers; anything else in range is invalid
            Rule::Range { min, max } => match value.as_f64() {
                Some(n) if n < *min as f64 || n > *max as f64 => Some(
                    Violation::new(
                        codes::PARAMETER_OUT_OF_RANGE,
                        &self.name,
                        format!("{} {} is outside {}..={}", self.name, value, min, max),
                    )
                    .with_context(json!({ "value": value, "min": min, "max": max })),
                ),
                Some(_) if value.as_i64().is_none() => Some(self.invalid(value, "expected a whole number")),
                Some(_) => None,
                None => Some(self.invalid(value, "expected a number")),
            },
            Rule::OneOf(allowed) => match value.as_str() {
                Some(s) if allowed.iter().any(|a| a == s) => None,
                _ => Some(
                    self.invalid(value, &format!("expected one of {}", allowed.join(", ")))
                        .with_context(json!({ "value": value, "allowed": allowed })),
                ),
            },
            Rule::NonEmpty => match value.as_str() {
                Some(s) if !s.trim().is_empty() => None,
                _ => Some(self.invalid(value, "expected a non-empty string")),
            },
        }
    }

    fn invalid(&self, value: &Value, expected: &str) -> Violation {
        Violation::new(
            codes::INVALID_PARAMETER,
            &self.name,
            format!("{} {} is invalid: {}", self.name, value, expected),
        )
        .with_context(json!({ "value": value }))
    }
}

/// Declared parameter constraints per action
#[derive(Debug, Clone, Default)]
pub struct ConstraintTable {
    actions: HashMap<String, Vec<ParamConstraint>>,
    max_height: i64,
}

impl ConstraintTable {
    /// Build the table for the given limits
    pub fn from_limits(limits: &Limits) -> Self {
        let m = &limits.movement;
        let r = &limits.rotation;
        let one_of = |values: &[&str]| Rule::OneOf(values.iter().map(|s| s.to_string()).collect());

        let mut actions = HashMap::new();
        actions.insert(
            "move".to_string(),
            vec![
                ParamConstraint::required("direction", one_of(&DIRECTIONS[..])),
                ParamConstraint::required(
                    "distance",
                    Rule::Range {
                        min: m.min_distance,
                        max: m.max_distance,
                    },
                ),
                ParamConstraint::optional(
                    "speed",
                    Rule::Range {
                        min: m.min_speed,
                        max: m.max_speed,
                    },
                ),
            ],
        );
        actions.insert(
            "rotate".to_string(),
            vec![
                ParamConstraint::optional("direction", one_of(&ROTATIONS[..])),
                ParamConstraint::required(
                    "angle",
                    Rule::Range {
                        min: r.min_angle,
                        max: r.max_angle,
                    },
                ),
            ],
        );
        actions.insert(
            "start_tracking".to_string(),
            vec![ParamConstraint::required("target", Rule::NonEmpty)],
        );
        actions.insert(
            "create_dataset".to_string(),
            vec![ParamConstraint::required("name", Rule::NonEmpty)],
        );
        actions.insert(
            "train_model".to_string(),
            vec![ParamConstraint::required("dataset", Rule::NonEmpty)],
        );

        Self {
            actions,
            max_height: limits.altitude.max_height,
        }
    }

    pub fn constraints_for(&self, action: &str) -> &[ParamConstraint] {
        self.actions.get(action).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check every declared parameter of the intent's action
    pub fn validate(&self, intent: &Intent) -> Verdict {
        let mut violations: Vec<Violation> = self
            .constraints_for(&intent.action)
            .iter()
            .filter_map(|c| c.check(intent.param(&c.name)))
            .collect();

        if intent.action == "move" && violations.is_empty() {
            if let Some(v) = self.check_altitude(intent) {
                violations.push(v);
            }
        }

        if violations.is_empty() {
            Verdict::allow()
        } else {
            Verdict::block(&intent.action, violations)
        }
    }

    fn check_altitude(&self, intent: &Intent) -> Option<Violation> {
        if intent.param("direction").and_then(Value::as_str) != Some("up") {
            return None;
        }
        let distance = intent.param("distance").and_then(Value::as_i64)?;
        (distance > self.max_height).then(|| {
            Violation::new(
                codes::PARAMETER_OUT_OF_RANGE,
                "distance",
                format!(
                    "climbing {} cm exceeds the altitude limit of {} cm",
                    distance, self.max_height
                ),
            )
            .with_context(json!({ "value": distance, "min": 0, "max": self.max_height }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn intent(action: &str, params: Value) -> Intent {
        let parameters: Map<String, Value> = serde_json::from_value(params).unwrap();
        Intent::new(action, parameters, 1.0)
    }

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.movement.max_distance, 500);
        assert_eq!(limits.rotation.max_angle, 360);
        assert_eq!(limits.movement.min_speed, 10);
    }

    #[test]
    fn test_move_within_limits() {
        let table = ConstraintTable::from_limits(&Limits::default());
        let verdict = table.validate(&intent(
            "move",
            json!({"direction": "forward", "distance": 100, "speed": 50}),
        ));
        assert!(verdict.is_allowed());
    }

    #[test]
    fn test_distance_out_of_range() {
        let table = ConstraintTable::from_limits(&Limits::default());
        let verdict = table.validate(&intent(
            "move",
            json!({"direction": "forward", "distance": 600}),
        ));
        assert!(verdict.is_blocked());
        assert_eq!(verdict.violations()[0].code, codes::PARAMETER_OUT_OF_RANGE);
        assert_eq!(verdict.violations()[0].parameter, "distance");
    }

    #[test]
    fn test_fractional_values_are_rejected() {
        let table = ConstraintTable::from_limits(&Limits::default());

        let verdict = table.validate(&intent("move", json!({"direction": "forward", "distance": 100.5})));
        assert!(verdict.is_blocked());
        assert_eq!(verdict.violations()[0].code, codes::INVALID_PARAMETER);
        assert_eq!(verdict.violations()[0].parameter, "distance");

        let verdict = table.validate(&intent("rotate", json!({"angle": 90.0})));
        assert_eq!(verdict.violations()[0].code, codes::INVALID_PARAMETER);

        let verdict = table.validate(&intent("move", json!({"direction": "forward", "distance": 600.5})));
        assert_eq!(verdict.violations()[0].code, codes::PARAMETER_OUT_OF_RANGE);
    }

    #[test]
    fn test_missing_and_invalid_parameters() {
        let table = ConstraintTable::from_limits(&Limits::default());
        let verdict = table.validate(&intent("rotate", json!({"direction": "sideways"})));
        let found: Vec<&str> = verdict.violations().iter().map(|v| v.code.as_str()).collect();
        assert_eq!(found, vec![codes::INVALID_PARAMETER, codes::MISSING_PARAMETER]);
    }

    #[test]
    fn test_altitude_limit() {
        let mut limits = Limits::default();
        limits.altitude.max_height = 300;
        let table = ConstraintTable::from_limits(&limits);

        let up = table.validate(&intent("move", json!({"direction": "up", "distance": 400})));
        assert!(up.is_blocked());

        let forward = table.validate(&intent(
            "move",
            json!({"direction": "forward", "distance": 400}),
        ));
        assert!(forward.is_allowed());
    }

    #[test]
    fn test_unconstrained_action() {
        let table = ConstraintTable::from_limits(&Limits::default());
        assert!(table.validate(&intent("takeoff", json!({}))).is_allowed());
        assert!(table.constraints_for("land").is_empty());
    }

    #[test]
    fn test_limits_from_partial_json() {
        let limits: Limits =
            serde_json::from_value(json!({"movement": {"maxDistance": 800}})).unwrap();
        assert_eq!(limits.movement.max_distance, 800);
        assert_eq!(limits.movement.min_distance, 20);
        assert_eq!(limits.rotation, RotationLimits::default());
    }
}
