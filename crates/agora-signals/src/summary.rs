//! Cluster summaries.
//!
//! Semantic summarization is an external concern; the engine consumes it
//! through the [`Summarizer`] trait. The built-in [`LexicalSummarizer`] is
//! the fallback: it surfaces the most frequent non-trivial terms shared
//! across member descriptions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Maximum terms the lexical fallback includes.
const MAX_FALLBACK_TERMS: usize = 3;

/// Terms shorter than this are noise.
const MIN_TERM_LEN: usize = 4;

/// A human-readable cluster summary with a similarity score in 0..=1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    /// Semantic similarity across the summarized descriptions; the lexical
    /// fallback reports a low fixed confidence.
    pub similarity: f64,
}

impl Summary {
    pub fn new(text: impl Into<String>, similarity: f64) -> Self {
        Self {
            text: text.into(),
            similarity: similarity.clamp(0.0, 1.0),
        }
    }

    /// Placeholder when no summary could be produced at all.
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            similarity: 0.0,
        }
    }
}

/// External semantic summarization contract.
pub trait Summarizer {
    /// Summarize a set of descriptions, or `None` if unavailable.
    fn summarize(&self, descriptions: &[String]) -> Option<Summary>;
}

/// Lexical overlap fallback.
///
/// Counts lowercase terms of at least [`MIN_TERM_LEN`] characters, keeps
/// those appearing in at least two descriptions, and joins the most
/// frequent few.
#[derive(Debug, Default, Clone)]
pub struct LexicalSummarizer;

impl Summarizer for LexicalSummarizer {
    fn summarize(&self, descriptions: &[String]) -> Option<Summary> {
        if descriptions.is_empty() {
            return None;
        }

        // term → number of descriptions containing it
        let mut doc_counts: HashMap<String, usize> = HashMap::new();
        for description in descriptions {
            let mut seen: Vec<String> = Vec::new();
            for term in description
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| t.len() >= MIN_TERM_LEN)
                .map(str::to_lowercase)
            {
                if !seen.contains(&term) {
                    seen.push(term);
                }
            }
            for term in seen {
                *doc_counts.entry(term).or_insert(0) += 1;
            }
        }

        let mut shared: Vec<(String, usize)> = doc_counts
            .into_iter()
            .filter(|(_, count)| *count >= 2 || descriptions.len() == 1)
            .collect();
        if shared.is_empty() {
            return None;
        }
        shared.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        shared.truncate(MAX_FALLBACK_TERMS);

        let coverage = shared[0].1 as f64 / descriptions.len() as f64;
        let text = shared
            .into_iter()
            .map(|(term, _)| term)
            .collect::<Vec<_>>()
            .join(" ");
        // Lexical overlap is a weak similarity signal; never report more
        // than 0.5.
        Some(Summary::new(text, coverage * 0.5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn shared_terms_surface() {
        let summary = LexicalSummarizer
            .summarize(&descs(&[
                "streetlight broken on main avenue",
                "another broken streetlight near the avenue",
                "streetlight out again",
            ]))
            .unwrap();
        assert!(summary.text.contains("streetlight"));
        assert!(summary.similarity > 0.0);
        assert!(summary.similarity <= 0.5);
    }

    #[test]
    fn no_overlap_yields_none() {
        let result =
            LexicalSummarizer.summarize(&descs(&["flooded basement", "noisy generator"]));
        assert_eq!(result, None);
    }

    #[test]
    fn short_words_are_ignored() {
        let summary = LexicalSummarizer
            .summarize(&descs(&["the the the pothole", "a pothole in the road"]))
            .unwrap();
        assert!(!summary.text.contains("the"));
        assert!(summary.text.contains("pothole"));
    }

    #[test]
    fn empty_input_yields_none() {
        assert_eq!(LexicalSummarizer.summarize(&[]), None);
    }

    #[test]
    fn similarity_is_clamped() {
        let s = Summary::new("x", 3.0);
        assert_eq!(s.similarity, 1.0);
        let s = Summary::new("x", -1.0);
        assert_eq!(s.similarity, 0.0);
    }
}
