//! Grammar loading and representation.
//!
//! Supports the drone-intents.yaml format with:
//! - Multiple patterns per rule
//! - Typed slots (`distance`, `angle`, `speed`, `direction`, `rotation`, `text`)
//! - Per-slot defaults
//! - A priority used to break confidence ties

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// Grammar shipped with the crate
pub const DEFAULT_GRAMMAR: &str = include_str!("../../../grammars/drone-intents.yaml");

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("failed to read grammar file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse grammar YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid pattern '{pattern}' in rule '{rule}': {reason}")]
    Pattern {
        rule: String,
        pattern: String,
        reason: String,
    },
    #[error("rule '{rule}' uses undeclared slot '{slot}'")]
    UndeclaredSlot { rule: String, slot: String },
    #[error("grammar defines no rules")]
    Empty,
}

/// Top-level grammar file structure
#[derive(Debug, Clone, Deserialize)]
pub struct GrammarFile {
    pub version: String,
    pub rules: Vec<Rule>,
}

/// A single action rule with multiple patterns
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub name: String,
    pub description: String,
    pub patterns: Vec<String>,
    #[serde(default)]
    pub params: HashMap<String, ParamSpec>,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    100
}

/// Parameter specification for a rule
#[derive(Debug, Clone, Deserialize)]
pub struct ParamSpec {
    pub r#type: SlotType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    Distance,
    Angle,
    Speed,
    Direction,
    Rotation,
    Text,
}

/// Compiled grammar ready for matching
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    pub version: String,
    pub rules: Vec<CompiledRule>,
}

/// A compiled rule with regex patterns
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub description: String,
    pub patterns: Vec<CompiledPattern>,
    pub params: HashMap<String, ParamSpec>,
    pub priority: u32,
}

/// A compiled pattern with extracted slot names
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub original: String,
    pub regex: regex::Regex,
    pub slot_names: Vec<String>,
    /// Specificity score (more literal chars = higher)
    pub specificity: usize,
}

impl CompiledGrammar {
    /// Load and compile a grammar from a YAML file
    pub fn load(path: &str) -> Result<Self, GrammarError> {
        let content = std::fs::read_to_string(path).map_err(|source| GrammarError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// The grammar embedded at build time
    pub fn builtin() -> Result<Self, GrammarError> {
        Self::from_yaml(DEFAULT_GRAMMAR)
    }

    /// Compile a grammar from YAML content
    pub fn from_yaml(yaml: &str) -> Result<Self, GrammarError> {
        let file: GrammarFile = serde_yaml::from_str(yaml)?;
        if file.rules.is_empty() {
            return Err(GrammarError::Empty);
        }

        let mut rules = Vec::with_capacity(file.rules.len());
        for rule in file.rules {
            let mut patterns = Vec::with_capacity(rule.patterns.len());
            for p in &rule.patterns {
                let compiled = compile_pattern(p).map_err(|reason| GrammarError::Pattern {
                    rule: rule.name.clone(),
                    pattern: p.clone(),
                    reason,
                })?;
                // Every slot must be typed, otherwise the matcher can't convert it
                if let Some(slot) = compiled
                    .slot_names
                    .iter()
                    .find(|s| !rule.params.contains_key(s.as_str()))
                {
                    return Err(GrammarError::UndeclaredSlot {
                        rule: rule.name.clone(),
                        slot: slot.clone(),
                    });
                }
                patterns.push(compiled);
            }

            rules.push(CompiledRule {
                name: rule.name,
                description: rule.description,
                patterns,
                params: rule.params,
                priority: rule.priority,
            });
        }

        // Matching order is irrelevant for the result, but keep it stable
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));

        Ok(CompiledGrammar {
            version: file.version,
            rules,
        })
    }

    pub fn rule(&self, name: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }
}

/// Compile a pattern string with {slot} placeholders into a regex
fn compile_pattern(pattern: &str) -> Result<CompiledPattern, String> {
    let mut regex_str = String::from("^");
    let mut slot_names = Vec::new();
    let mut specificity = 0;

    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '{' {
            let mut slot_name = String::new();
            let mut closed = false;
            for next in chars.by_ref() {
                if next == '}' {
                    closed = true;
                    break;
                }
                slot_name.push(next);
            }
            if !closed || slot_name.is_empty() {
                return Err("unterminated or empty slot".to_string());
            }
            if slot_names.contains(&slot_name) {
                return Err(format!("slot '{}' used twice", slot_name));
            }

            // Non-greedy so later literals anchor the split
            regex_str.push_str(&format!("(?P<{}>.+?)", slot_name));
            slot_names.push(slot_name);
        } else {
            if c.is_alphanumeric() || c == ' ' {
                specificity += 1;
            }
            regex_str.push_str(&regex::escape(&c.to_string()));
        }
    }

    regex_str.push('$');

    let regex = regex::RegexBuilder::new(&regex_str)
        .case_insensitive(true)
        .build()
        .map_err(|e| format!("Invalid pattern regex: {}", e))?;

    Ok(CompiledPattern {
        original: pattern.to_string(),
        regex,
        slot_names,
        specificity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_compilation() {
        let pattern = compile_pattern("move {direction} {distance}").unwrap();
        assert_eq!(pattern.slot_names, vec!["direction", "distance"]);

        let caps = pattern.regex.captures("move forward 100 cm").unwrap();
        assert_eq!(caps.name("direction").unwrap().as_str(), "forward");
        assert_eq!(caps.name("distance").unwrap().as_str(), "100 cm");
    }

    #[test]
    fn test_literal_pattern_is_anchored() {
        let pattern = compile_pattern("land").unwrap();
        assert!(pattern.regex.is_match("land"));
        assert!(!pattern.regex.is_match("land the drone now please"));
        assert_eq!(pattern.specificity, 4);
    }

    #[test]
    fn test_builtin_grammar_compiles() {
        let grammar = CompiledGrammar::builtin().unwrap();
        assert!(grammar.rule("move").is_some());
        assert!(grammar.rule("launch").is_some());
        // Lowest priority first
        assert_eq!(grammar.rules[0].name, "emergency_stop");
    }

    #[test]
    fn test_undeclared_slot_rejected() {
        let err = CompiledGrammar::from_yaml(
            r#"
version: "1.0"
rules:
  - name: move
    description: Move
    patterns:
      - "move {direction}"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, GrammarError::UndeclaredSlot { .. }));
    }

    #[test]
    fn test_unterminated_slot_rejected() {
        assert!(compile_pattern("move {direction").is_err());
    }
}
