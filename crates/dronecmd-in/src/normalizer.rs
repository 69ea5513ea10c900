//! Text normalization for the interpreter.
//!
//! Normalizes operator input to improve pattern matching:
//! - Lowercase conversion
//! - Whitespace and punctuation cleanup
//! - Politeness prefixes ("please", "can you") dropped
//! - Contractions expanded
//! - Drone vocabulary folded ("counter clockwise" → "ccw", "metres" → "m")

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Common contractions and their expansions
    static ref CONTRACTIONS: Vec<(&'static str, &'static str)> = vec![
        ("what's", "what is"),
        ("where's", "where is"),
        ("it's", "it is"),
        ("don't", "do not"),
        ("can't", "cannot"),
        ("let's", "let us"),
        ("i'm", "i am"),
    ];

    /// Phrase synonyms, applied in order on word boundaries.
    /// Longer phrases come before their substrings.
    static ref SYNONYMS: Vec<(Regex, &'static str)> = [
        (r"\b(counter|anti)[- ]?clockwise\b", "ccw"),
        (r"\bclockwise\b", "cw"),
        (r"\bbackwards?\b", "back"),
        (r"\b(forwards|ahead)\b", "forward"),
        (r"\bupwards?\b", "up"),
        (r"\bdownwards?\b", "down"),
        (r"\bcentimet(er|re)s?\b", "cm"),
        (r"\bmet(er|re)s?\b", "m"),
        (r"\bdegrees?\b", "deg"),
        (r"\b(picture|pic|snapshot|image|photograph)\b", "photo"),
    ]
    .iter()
    .map(|(p, r)| (Regex::new(p).unwrap(), *r))
    .collect();

    static ref POLITENESS: Regex =
        Regex::new(r"^(please |(can|could|would) you (please )?)+").unwrap();

    static ref TRAILING_POLITENESS: Regex = Regex::new(r" please$").unwrap();

    /// Multiple whitespace pattern
    static ref MULTI_SPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Normalize text for pattern matching
pub fn normalize(text: &str) -> String {
    let mut result = text.to_lowercase();

    // Degree sign sticks to numbers ("90°")
    result = result.replace('°', " deg");
    result = result.replace([',', ';', '!', '?'], " ");

    for (contraction, expansion) in CONTRACTIONS.iter() {
        result = result.replace(contraction, expansion);
    }

    for (pattern, replacement) in SYNONYMS.iter() {
        result = pattern.replace_all(&result, *replacement).into_owned();
    }

    result = MULTI_SPACE.replace_all(result.trim(), " ").to_string();

    // Trailing full stop, but keep decimals like "1.5"
    while result.ends_with('.') {
        result.pop();
    }

    result = POLITENESS.replace(&result, "").to_string();
    result = TRAILING_POLITENESS.replace(&result, "").to_string();

    result.trim().to_string()
}

/// Check if text is too vague to interpret at all
pub fn is_too_vague(text: &str) -> bool {
    let normalized = normalize(text);
    let mut words = normalized.split_whitespace();

    match (words.next(), words.next()) {
        (None, _) => true,
        // Short single tokens ("x", "ok") carry no action
        (Some(word), None) => word.chars().filter(|c| c.is_alphanumeric()).count() < 3,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_normalization() {
        assert_eq!(normalize("  Take   OFF!  "), "take off");
        assert_eq!(normalize("Land the drone."), "land the drone");
    }

    #[test]
    fn test_units_and_directions() {
        assert_eq!(normalize("Move backwards 2 metres"), "move back 2 m");
        assert_eq!(normalize("rotate counter clockwise 90 degrees"), "rotate ccw 90 deg");
        assert_eq!(normalize("turn clockwise 45°"), "turn cw 45 deg");
        assert_eq!(normalize("fly forward 1.5 m."), "fly forward 1.5 m");
    }

    #[test]
    fn test_politeness_dropped() {
        assert_eq!(normalize("Please take a picture"), "take a photo");
        assert_eq!(normalize("could you please land, please"), "land");
    }

    #[test]
    fn test_contraction_expansion() {
        assert_eq!(normalize("what's the status?"), "what is the status");
    }

    #[test]
    fn test_vague_detection() {
        assert!(is_too_vague("  x  "));
        assert!(is_too_vague("?!"));
        assert!(!is_too_vague("land"));
        assert!(!is_too_vague("move up 50"));
    }
}
