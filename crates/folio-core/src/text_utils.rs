//! Text helpers shared by the transform and the view-state layer.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

static RE_NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

pub const MARK_OPEN: &str = "<mark>";
pub const MARK_CLOSE: &str = "</mark>";

/// Identifier for a play name: lowercase, non-alphanumeric runs become one
/// underscore, no leading or trailing underscores.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    RE_NON_ALNUM
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Ordering used for play and character names.
///
/// Case-insensitive first so "lady Macbeth" sorts next to "Lady Macduff"; the
/// byte-order tie-break keeps the result total and deterministic.
pub fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Trimmed, lowercased search query, or `None` when there is nothing to match.
pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// `needle` must already be lowercased (see [`normalize_query`]).
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Wraps every case-insensitive occurrence of `query` in `<mark>` tags.
#[derive(Debug, Clone)]
pub struct Highlighter {
    pattern: Option<Regex>,
}

impl Highlighter {
    pub fn new(query: &str) -> Self {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Self { pattern: None };
        }
        let pattern = RegexBuilder::new(&regex::escape(trimmed))
            .case_insensitive(true)
            .build()
            .ok();
        Self { pattern }
    }

    pub fn is_active(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn apply(&self, text: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern
                .replace_all(text, |caps: &regex::Captures<'_>| {
                    format!("{MARK_OPEN}{}{MARK_CLOSE}", &caps[0])
                })
                .into_owned(),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation_runs() {
        assert_eq!(
            slugify("A Midsummer Night's Dream"),
            "a_midsummer_night_s_dream"
        );
        assert_eq!(slugify("  Henry V, Part 1 "), "henry_v_part_1");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn collate_ignores_case_then_breaks_ties() {
        assert_eq!(collate("banquo", "Macbeth"), Ordering::Less);
        assert_eq!(collate("Ariel", "ariel"), Ordering::Less);
        assert_eq!(collate("Puck", "Puck"), Ordering::Equal);
    }

    #[test]
    fn highlight_wraps_every_match_preserving_case() {
        let highlighter = Highlighter::new("  rose ");
        assert_eq!(
            highlighter.apply("A Rose by any other name, a rose."),
            "A <mark>Rose</mark> by any other name, a <mark>rose</mark>."
        );
    }

    #[test]
    fn highlight_treats_metacharacters_literally() {
        let highlighter = Highlighter::new("what?");
        assert_eq!(
            highlighter.apply("what? whatever"),
            "<mark>what?</mark> whatever"
        );
    }

    #[test]
    fn empty_query_leaves_text_unchanged() {
        let highlighter = Highlighter::new("   ");
        assert!(!highlighter.is_active());
        assert_eq!(highlighter.apply("To be, or not to be"), "To be, or not to be");
        assert_eq!(normalize_query(" \t"), None);
    }
}
