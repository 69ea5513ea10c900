//! dronecmd Policy: parameter validation
//!
//! Checks an [`Intent`](dronecmd_core::Intent) against the constraint table
//! derived from the live operational limits.
//!
//! ```text
//! Intent → ConstraintTable (from Limits) → Verdict → Ok(()) | ValidationError
//! ```
//!
//! # Example
//!
//! ```
//! use dronecmd_core::Intent;
//! use dronecmd_policy::{validate_intent, Limits};
//! use serde_json::json;
//!
//! let params = json!({"direction": "forward", "distance": 600});
//! let intent = Intent::new("move", serde_json::from_value(params).unwrap(), 0.9);
//!
//! let err = validate_intent(&Limits::default(), &intent).unwrap_err();
//! assert_eq!(err.code(), "PARAMETER_OUT_OF_RANGE");
//! ```

pub mod constraints;
pub mod verdict;

pub use constraints::{
    AltitudeLimits, BatteryLimits, ConstraintTable, Limits, MovementLimits, ParamConstraint,
    RotationLimits, Rule, DIRECTIONS, ROTATIONS,
};
pub use verdict::{Verdict, Violation};

use dronecmd_core::{Intent, TaxonomyError};

/// Validate an intent against the given limits
pub fn validate_intent(limits: &Limits, intent: &Intent) -> Result<(), TaxonomyError> {
    let verdict = ConstraintTable::from_limits(limits).validate(intent);
    if let Verdict::Block { violations, .. } = &verdict {
        tracing::debug!(
            action = %intent.action,
            violations = violations.len(),
            "intent blocked by constraints"
        );
    }
    verdict.into_result()
}
