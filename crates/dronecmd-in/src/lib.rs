//! dronecmd-in: natural language to drone intents
//!
//! Converts operator text into a structured [`Intent`] (action, typed
//! parameters, confidence) or a `ValidationError(INVALID_COMMAND)` when no
//! action clears the confidence threshold.
//!
//! # Example
//!
//! ```
//! use dronecmd_core::Command;
//! use dronecmd_in::Interpreter;
//!
//! let interpreter = Interpreter::builtin().unwrap();
//! let intent = interpreter
//!     .interpret(&Command::new("move forward 1.5 metres"), 0.6)
//!     .unwrap();
//!
//! assert_eq!(intent.action, "move");
//! assert_eq!(intent.parameters["distance"], 150);
//! ```

pub mod entities;
pub mod grammar;
pub mod matcher;
pub mod normalizer;

use dronecmd_core::{codes, Command, Intent, TaxonomyError};
use grammar::CompiledGrammar;
use matcher::{Candidate, MatchResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub use grammar::GrammarError;

/// The verdict of an interpretation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// An action cleared the threshold
    Match,
    /// No confident match, need clarification
    Abstain,
}

/// Full outcome of interpreting a piece of text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpretation {
    pub verdict: Verdict,
    pub normalized: String,
    /// Winning intent (if Match)
    pub intent: Option<Intent>,
    /// Best candidate's confidence, even when it did not clear the threshold
    pub confidence: f64,
    /// Reason for abstaining (if Abstain)
    pub abstain_reason: Option<String>,
    pub clarification: Option<String>,
    pub suggestions: Vec<String>,
}

impl Interpretation {
    fn abstain(
        normalized: String,
        confidence: f64,
        reason: &str,
        clarification: String,
        suggestions: Vec<String>,
    ) -> Self {
        Self {
            verdict: Verdict::Abstain,
            normalized,
            intent: None,
            confidence,
            abstain_reason: Some(reason.to_string()),
            clarification: Some(clarification),
            suggestions,
        }
    }

    /// Turn an abstention into the pipeline error
    pub fn into_result(self) -> Result<Intent, TaxonomyError> {
        match (self.verdict, self.intent) {
            (Verdict::Match, Some(intent)) => Ok(intent),
            _ => Err(TaxonomyError::validation(
                codes::INVALID_COMMAND,
                self.clarification
                    .unwrap_or_else(|| "command could not be interpreted".to_string()),
            )
            .with_user_message("I couldn't understand that command.")
            .with_details(json!({
                "reason": self.abstain_reason,
                "normalized": self.normalized,
                "confidence": self.confidence,
                "suggestions": self.suggestions,
            }))),
        }
    }
}

/// Command interpreter backed by a compiled grammar
#[derive(Debug, Clone)]
pub struct Interpreter {
    grammar: CompiledGrammar,
}

impl Interpreter {
    pub fn new(grammar: CompiledGrammar) -> Self {
        Self { grammar }
    }

    /// Interpreter using the grammar embedded in the crate
    pub fn builtin() -> Result<Self, GrammarError> {
        Ok(Self::new(CompiledGrammar::builtin()?))
    }

    /// Interpreter using a grammar file on disk
    pub fn from_path(path: &str) -> Result<Self, GrammarError> {
        Ok(Self::new(CompiledGrammar::load(path)?))
    }

    pub fn grammar(&self) -> &CompiledGrammar {
        &self.grammar
    }

    /// Interpret a command, failing with `INVALID_COMMAND` below `threshold`
    pub fn interpret(&self, command: &Command, threshold: f64) -> Result<Intent, TaxonomyError> {
        let mut intent = self.analyze(&command.text, threshold).into_result()?;
        if let Some(device_id) = command.device_id() {
            intent
                .parameters
                .insert("droneId".to_string(), Value::from(device_id));
        }
        Ok(intent)
    }

    /// Interpret text without turning abstentions into errors
    pub fn analyze(&self, text: &str, threshold: f64) -> Interpretation {
        let normalized = normalizer::normalize(text);

        if normalizer::is_too_vague(text) {
            return Interpretation::abstain(
                normalized,
                0.0,
                "too_vague",
                "I'm not sure what you'd like the drone to do. Try 'take off' or 'move forward 100 cm'."
                    .to_string(),
                vec![
                    "take off".to_string(),
                    "move {direction} {distance}".to_string(),
                    "rotate {direction} {angle}".to_string(),
                    "land".to_string(),
                ],
            );
        }

        match matcher::match_text(&normalized, &self.grammar) {
            MatchResult::Match(candidates) => self.decide(normalized, candidates, threshold),
            MatchResult::Abstain(abstain) => Interpretation::abstain(
                normalized,
                0.0,
                &abstain.reason,
                abstain.clarification,
                abstain.suggestions,
            ),
        }
    }

    fn decide(&self, normalized: String, candidates: Vec<Candidate>, threshold: f64) -> Interpretation {
        let mut candidates = candidates.into_iter();
        let Some(best) = candidates.next() else {
            return Interpretation::abstain(normalized, 0.0, "no_match", String::new(), Vec::new());
        };

        if best.confidence < threshold {
            let clarification = if best.invalid_slots.is_empty() {
                format!(
                    "'{}' might be '{}' but confidence {:.2} is below {:.2}.",
                    normalized, best.action, best.confidence, threshold
                )
            } else {
                format!(
                    "'{}' looks like '{}' but these values are not understood: {}.",
                    normalized,
                    best.action,
                    best.invalid_slots.join(", ")
                )
            };
            let suggestions = self
                .grammar
                .rule(&best.action)
                .map(|r| r.patterns.iter().map(|p| p.original.clone()).collect())
                .unwrap_or_default();
            return Interpretation::abstain(
                normalized,
                best.confidence,
                "low_confidence",
                clarification,
                suggestions,
            );
        }

        tracing::debug!(
            action = %best.action,
            confidence = best.confidence,
            pattern = %best.matched_pattern,
            "command interpreted"
        );

        Interpretation {
            verdict: Verdict::Match,
            normalized,
            confidence: best.confidence,
            intent: Some(Intent::new(best.action, best.parameters, best.confidence)),
            abstain_reason: None,
            clarification: None,
            suggestions: Vec::new(),
        }
    }
}

impl From<GrammarError> for TaxonomyError {
    fn from(err: GrammarError) -> Self {
        TaxonomyError::configuration(err.to_string()).with_operation("load_grammar")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dronecmd_core::ErrorKind;

    #[test]
    fn test_interpret_move() {
        let interpreter = Interpreter::builtin().unwrap();
        let intent = interpreter
            .interpret(&Command::new("Move forward 100 cm"), 0.6)
            .unwrap();

        assert_eq!(intent.action, "move");
        assert_eq!(intent.parameters["direction"], "forward");
        assert_eq!(intent.parameters["distance"], 100);
    }

    #[test]
    fn test_vague_input() {
        let interpreter = Interpreter::builtin().unwrap();
        let result = interpreter.analyze("x", 0.6);
        assert_eq!(result.verdict, Verdict::Abstain);
        assert_eq!(result.abstain_reason, Some("too_vague".to_string()));
    }

    #[test]
    fn test_below_threshold_is_invalid_command() {
        let interpreter = Interpreter::builtin().unwrap();
        let err = interpreter
            .interpret(&Command::new("move sideways 100"), 0.6)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.code(), "INVALID_COMMAND");
        assert_eq!(err.details().unwrap()["reason"], "low_confidence");
    }

    #[test]
    fn test_device_id_copied() {
        let interpreter = Interpreter::builtin().unwrap();
        let intent = interpreter
            .interpret(&Command::new("take off").with_device("tello-7"), 0.6)
            .unwrap();
        assert_eq!(intent.action, "takeoff");
        assert_eq!(intent.parameters["droneId"], "tello-7");
    }
}
