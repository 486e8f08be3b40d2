//! Item name canonicalization
//!
//! Receipt printers and people write the same product many ways
//! ("EGGS, LARGE", "large egg", "Large  Eggs."). Everything that compares
//! names goes through [`normalize`] first.

use std::sync::OnceLock;

use regex::Regex;

/// Characters removed outright, so "ben's" and "bens" agree
fn elided_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"['’`.]").expect("valid regex"))
}

/// Any other punctuation splits words ("semi-skimmed" -> "semi skimmed")
fn word_breaks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("valid regex"))
}

/// Canonicalize an item name for comparison.
///
/// Lowercases, strips punctuation, collapses whitespace and drops trivial
/// plural suffixes word by word. Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let elided = elided_chars().replace_all(&lowered, "");
    let spaced = word_breaks().replace_all(&elided, " ");

    spaced
        .split_whitespace()
        .map(singularize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip a trivial plural suffix from one lowercase word.
///
/// Every output either ends in a non-`s` character or in `ss`/`us`/`is`,
/// none of which are stripped again.
fn singularize(word: &str) -> String {
    if word.chars().count() <= 3 {
        return word.to_string();
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    if word.ends_with("ies") && word.chars().count() > 4 {
        return format!("{}y", &word[..word.len() - 3]);
    }
    for suffix in ["sses", "xes", "ches", "shes", "oes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    match word.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => word.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_and_case() {
        assert_eq!(normalize(" Milk "), normalize("milk"));
        assert_eq!(normalize("Whole   MILK\t"), "whole milk");
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(normalize("Ben's Rice."), "ben rice");
        assert_eq!(normalize("Semi-Skimmed Milk"), "semi skimmed milk");
        assert_eq!(normalize("EGGS, LARGE"), "egg large");
    }

    #[test]
    fn test_plurals() {
        assert_eq!(normalize("apples"), "apple");
        assert_eq!(normalize("Tomatoes"), "tomato");
        assert_eq!(normalize("strawberries"), "strawberry");
        assert_eq!(normalize("boxes"), "box");
        assert_eq!(normalize("peaches"), "peach");
        assert_eq!(normalize("glasses"), "glass");
        // Words that only look plural
        assert_eq!(normalize("hummus"), "hummus");
        assert_eq!(normalize("swiss"), "swiss");
        assert_eq!(normalize("tennis"), "tennis");
    }

    #[test]
    fn test_idempotent() {
        for name in [
            " Milk ",
            "Semi-Skimmed Milk",
            "STRAWBERRIES 400G",
            "glasses",
            "Ben's Rice.",
            "café crème",
            "",
            "   ",
            "potatoes, baby (2kg)",
        ] {
            let once = normalize(name);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", name);
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" .,- "), "");
    }
}
