//! Typed slot extraction.
//!
//! Converts captured slot text into JSON values:
//! - Distances (`cm` or `m`, always returned in centimetres)
//! - Angles in degrees
//! - Speeds in cm/s
//! - Movement directions and rotation senses

use crate::grammar::SlotType;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref DISTANCE: Regex = Regex::new(r"^(\d+(?:\.\d+)?)\s*(cm|m)?$").unwrap();

    static ref ANGLE: Regex = Regex::new(r"^(\d+(?:\.\d+)?)\s*(deg)?$").unwrap();

    static ref SPEED: Regex = Regex::new(r"^(\d+(?:\.\d+)?)\s*(cm/s|cms|cm per second)?$").unwrap();
}

const DIRECTIONS: [&str; 6] = ["up", "down", "left", "right", "forward", "back"];
const ROTATIONS: [&str; 2] = ["cw", "ccw"];

/// An extracted slot value
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Distance(i64),
    Angle(i64),
    Speed(i64),
    Direction(String),
    Rotation(String),
    Text(String),
}

impl Entity {
    pub fn into_value(self) -> Value {
        match self {
            Entity::Distance(v) | Entity::Angle(v) | Entity::Speed(v) => Value::from(v),
            Entity::Direction(s) | Entity::Rotation(s) | Entity::Text(s) => Value::from(s),
        }
    }
}

/// Parse captured text according to its declared type.
///
/// Returns `None` when the text does not look like the declared type; the
/// matcher turns that into zero slot confidence.
pub fn parse_slot(slot_type: SlotType, raw: &str) -> Option<Entity> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    match slot_type {
        SlotType::Distance => parse_distance(value).map(Entity::Distance),
        SlotType::Angle => parse_angle(value).map(Entity::Angle),
        SlotType::Speed => parse_speed(value).map(Entity::Speed),
        SlotType::Direction => parse_direction(value).map(Entity::Direction),
        SlotType::Rotation => parse_rotation(value).map(Entity::Rotation),
        SlotType::Text => Some(Entity::Text(value.to_string())),
    }
}

/// Distance in centimetres. Bare numbers are centimetres.
pub fn parse_distance(text: &str) -> Option<i64> {
    let caps = DISTANCE.captures(text)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let cm = match caps.get(2).map(|m| m.as_str()) {
        Some("m") => amount * 100.0,
        _ => amount,
    };
    Some(cm.round() as i64)
}

pub fn parse_angle(text: &str) -> Option<i64> {
    let caps = ANGLE.captures(text)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(amount.round() as i64)
}

pub fn parse_speed(text: &str) -> Option<i64> {
    let caps = SPEED.captures(text)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(amount.round() as i64)
}

pub fn parse_direction(text: &str) -> Option<String> {
    DIRECTIONS
        .iter()
        .find(|d| **d == text)
        .map(|d| d.to_string())
}

pub fn parse_rotation(text: &str) -> Option<String> {
    match text {
        "left" => Some("ccw".to_string()),
        "right" => Some("cw".to_string()),
        _ => ROTATIONS.iter().find(|r| **r == text).map(|r| r.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_units() {
        assert_eq!(parse_distance("100"), Some(100));
        assert_eq!(parse_distance("100 cm"), Some(100));
        assert_eq!(parse_distance("1.5 m"), Some(150));
        assert_eq!(parse_distance("2m"), Some(200));
        assert_eq!(parse_distance("far"), None);
    }

    #[test]
    fn test_angle_and_speed() {
        assert_eq!(parse_angle("90 deg"), Some(90));
        assert_eq!(parse_angle("45"), Some(45));
        assert_eq!(parse_speed("50 cm/s"), Some(50));
        assert_eq!(parse_speed("fast"), None);
    }

    #[test]
    fn test_directions() {
        assert_eq!(parse_direction("forward"), Some("forward".to_string()));
        assert_eq!(parse_direction("sideways"), None);
        assert_eq!(parse_rotation("left"), Some("ccw".to_string()));
        assert_eq!(parse_rotation("cw"), Some("cw".to_string()));
    }

    #[test]
    fn test_typed_slot_values() {
        let v = parse_slot(SlotType::Distance, " 3 m ").unwrap().into_value();
        assert_eq!(v, Value::from(300));
        assert!(parse_slot(SlotType::Text, "   ").is_none());
    }
}
