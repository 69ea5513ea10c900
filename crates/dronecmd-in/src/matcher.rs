//! Intent matching.
//!
//! Matches normalized text against compiled grammar patterns, converts
//! slots to typed values and scores every candidate.
//!
//! Candidates are ranked by confidence (descending), then rule priority
//! (ascending), then action name, so equal inputs always produce the same
//! winner.

use crate::entities::parse_slot;
use crate::grammar::{CompiledGrammar, CompiledPattern, CompiledRule};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Literal characters at which a pattern counts as fully specific
const FULL_SPECIFICITY: f64 = 12.0;

/// Result of matching text against grammar
#[derive(Debug, Clone)]
pub enum MatchResult {
    /// At least one rule matched; best candidate first
    Match(Vec<Candidate>),
    /// No match found, but can suggest clarification
    Abstain(AbstainResult),
}

/// A scored rule match
#[derive(Debug, Clone)]
pub struct Candidate {
    pub action: String,
    pub parameters: Map<String, Value>,
    pub confidence: f64,
    pub priority: u32,
    pub matched_pattern: String,
    /// Slots whose text did not parse as the declared type
    pub invalid_slots: Vec<String>,
}

/// Result when no match is found
#[derive(Debug, Clone)]
pub struct AbstainResult {
    pub reason: String,
    pub clarification: String,
    pub suggestions: Vec<String>,
}

/// Match text against a compiled grammar
pub fn match_text(text: &str, grammar: &CompiledGrammar) -> MatchResult {
    let mut candidates: Vec<Candidate> = grammar
        .rules
        .iter()
        .filter_map(|rule| best_for_rule(text, rule))
        .collect();

    if candidates.is_empty() {
        return MatchResult::Abstain(generate_abstain_result(text, grammar));
    }

    candidates.sort_by(rank);
    MatchResult::Match(candidates)
}

fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.priority.cmp(&b.priority))
        .then_with(|| a.action.cmp(&b.action))
}

/// Best-scoring pattern of one rule
fn best_for_rule(text: &str, rule: &CompiledRule) -> Option<Candidate> {
    rule.patterns
        .iter()
        .filter_map(|pattern| try_match_pattern(text, rule, pattern))
        .max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(Ordering::Equal)
        })
}

fn try_match_pattern(text: &str, rule: &CompiledRule, pattern: &CompiledPattern) -> Option<Candidate> {
    let captures = pattern.regex.captures(text)?;

    let mut parameters = Map::new();
    let mut invalid_slots = Vec::new();
    let mut min_slot_confidence: f64 = 1.0;

    for slot_name in &pattern.slot_names {
        let raw = captures.name(slot_name).map(|m| m.as_str()).unwrap_or("");
        let Some(spec) = rule.params.get(slot_name) else {
            continue;
        };

        match parse_slot(spec.r#type, raw) {
            Some(entity) => {
                let confidence = slot_confidence(raw);
                min_slot_confidence = min_slot_confidence.min(confidence);
                parameters.insert(slot_name.clone(), entity.into_value());
            }
            None => {
                min_slot_confidence = 0.0;
                invalid_slots.push(slot_name.clone());
                parameters.insert(slot_name.clone(), Value::from(raw.trim()));
            }
        }
    }

    // Declared defaults for slots this pattern does not capture
    for (name, spec) in &rule.params {
        if parameters.contains_key(name) {
            continue;
        }
        if let Some(default) = &spec.default {
            if let Ok(value) = serde_json::to_value(default) {
                parameters.insert(name.clone(), value);
            }
        }
    }

    let specificity = (pattern.specificity as f64 / FULL_SPECIFICITY).min(1.0);
    let confidence = (0.4 + 0.2 * specificity + 0.4 * min_slot_confidence).min(1.0);

    Some(Candidate {
        action: rule.name.clone(),
        parameters,
        confidence,
        priority: rule.priority,
        matched_pattern: pattern.original.clone(),
        invalid_slots,
    })
}

/// Confidence for a slot that parsed as its declared type
fn slot_confidence(value: &str) -> f64 {
    let value = value.trim();
    let words = value.split_whitespace().count();
    match words {
        0 => 0.0,
        // Typed values are short; long captures are usually swallowed words
        1 | 2 => 1.0,
        3 => 0.8,
        _ => 0.6,
    }
}

/// Generate an abstain result when no match is found
fn generate_abstain_result(text: &str, grammar: &CompiledGrammar) -> AbstainResult {
    let first_word = text.split_whitespace().next().unwrap_or("");

    // Rules sharing the leading verb, e.g. "move" without a distance
    let partial_matches: Vec<&CompiledRule> = grammar
        .rules
        .iter()
        .filter(|r| {
            !first_word.is_empty()
                && r.patterns
                    .iter()
                    .any(|p| p.original.split_whitespace().next() == Some(first_word))
        })
        .collect();

    match partial_matches.len() {
        0 => AbstainResult {
            reason: "no_match".to_string(),
            clarification: format!("I don't understand '{}'. Here are some things I can do:", text),
            suggestions: grammar
                .rules
                .iter()
                .take(5)
                .filter_map(|r| r.patterns.first().map(|p| p.original.clone()))
                .collect(),
        },
        1 => AbstainResult {
            reason: "incomplete".to_string(),
            clarification: format!(
                "'{}' looks like '{}' but is missing something.",
                text, partial_matches[0].name
            ),
            suggestions: partial_matches[0]
                .patterns
                .iter()
                .map(|p| p.original.clone())
                .collect(),
        },
        _ => AbstainResult {
            reason: "ambiguous".to_string(),
            clarification: format!(
                "'{}' could mean different things. Did you want to: {}?",
                text,
                partial_matches
                    .iter()
                    .map(|r| r.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            suggestions: partial_matches.iter().map(|r| r.name.clone()).collect(),
        },
    }
}
