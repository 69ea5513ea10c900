//! Verdict types for parameter validation
//!
//! Provides Allow/Block verdicts with violations and remediation.

use dronecmd_core::{codes, TaxonomyError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// The result of validating an intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Intent may be dispatched
    Allow,

    /// Intent is rejected before any backend call
    Block {
        /// Action that was validated
        action: String,
        /// Specific violations, in parameter declaration order
        violations: Vec<Violation>,
        /// Possible remediation steps
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        remediation: Vec<String>,
    },
}

impl Verdict {
    pub fn allow() -> Self {
        Verdict::Allow
    }

    pub fn block(action: impl Into<String>, violations: Vec<Violation>) -> Self {
        let remediation = violations.iter().filter_map(Violation::remediation).collect();
        Verdict::Block {
            action: action.into(),
            violations,
            remediation,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Verdict::Block { .. })
    }

    /// Get the violations if this is a block verdict
    pub fn violations(&self) -> &[Violation] {
        match self {
            Verdict::Block { violations, .. } => violations,
            Verdict::Allow => &[],
        }
    }

    /// Convert into the pipeline error.
    ///
    /// The first violation decides the code; all of them go into `details`.
    pub fn into_result(self) -> Result<(), TaxonomyError> {
        match self {
            Verdict::Allow => Ok(()),
            Verdict::Block {
                action,
                violations,
                remediation,
            } => {
                let code = violations
                    .first()
                    .map(|v| v.code.clone())
                    .unwrap_or_else(|| codes::VALIDATION_ERROR.to_string());
                let message = violations
                    .iter()
                    .map(|v| v.description.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(TaxonomyError::validation(&code, message)
                    .with_operation(action.clone())
                    .with_details(json!({
                        "action": action,
                        "violations": violations,
                        "remediation": remediation,
                    })))
            }
        }
    }
}

/// A specific parameter violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Taxonomy code, e.g. `PARAMETER_OUT_OF_RANGE`
    pub code: String,
    pub parameter: String,
    pub description: String,
    /// Offending value and bounds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl Violation {
    pub fn new(
        code: impl Into<String>,
        parameter: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            parameter: parameter.into(),
            description: description.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    fn remediation(&self) -> Option<String> {
        let step = match self.code.as_str() {
            codes::MISSING_PARAMETER => format!("Provide a value for '{}'", self.parameter),
            codes::PARAMETER_OUT_OF_RANGE => {
                let bounds = self.context.as_ref()?;
                format!(
                    "Use a '{}' between {} and {}",
                    self.parameter, bounds["min"], bounds["max"]
                )
            }
            codes::INVALID_PARAMETER => {
                format!("Check the type and spelling of '{}'", self.parameter)
            }
            _ => return None,
        };
        Some(step)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Verdict::Allow => write!(f, "ALLOW"),
            Verdict::Block {
                action, violations, ..
            } => {
                write!(f, "BLOCK: {}", action)?;
                if !violations.is_empty() {
                    write!(f, " ({} violations)", violations.len())?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dronecmd_core::ErrorKind;

    #[test]
    fn test_verdict_allow() {
        let verdict = Verdict::allow();
        assert!(verdict.is_allowed());
        assert!(!verdict.is_blocked());
        assert!(verdict.into_result().is_ok());
    }

    #[test]
    fn test_verdict_block() {
        let violation = Violation::new(
            codes::PARAMETER_OUT_OF_RANGE,
            "distance",
            "distance 600 is outside 20..=500",
        )
        .with_context(json!({"value": 600, "min": 20, "max": 500}));
        let verdict = Verdict::block("move", vec![violation]);
        assert!(verdict.is_blocked());
        assert_eq!(verdict.violations().len(), 1);
        assert_eq!(format!("{}", verdict), "BLOCK: move (1 violations)");

        let err = verdict.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.code(), "PARAMETER_OUT_OF_RANGE");
        assert_eq!(
            err.details().unwrap()["remediation"][0],
            "Use a 'distance' between 20 and 500"
        );
    }

    #[test]
    fn test_verdict_serialization() {
        let verdict = Verdict::block(
            "rotate",
            vec![Violation::new(codes::MISSING_PARAMETER, "angle", "angle is required")],
        );

        let json = serde_json::to_string(&verdict).unwrap();
        assert!(json.contains("BLOCK"));
        assert!(json.contains("Provide a value for 'angle'"));

        let parsed: Verdict = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_blocked());
    }
}
