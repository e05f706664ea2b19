//! Tokenizer, keyword patterns and the chunk relevance score.
//!
//! `score = (query-token hits in text + keyword bonus) / sqrt(text tokens + 1)`

use atlas_core::error::KnowledgeError;
use regex::Regex;
use std::collections::HashSet;

/// Lowercase the input and split it on every run of characters that are not
/// Unicode letters or digits.
pub fn tokenize(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// A case-insensitive alternation of user-supplied patterns.
///
/// An empty list never matches.
#[derive(Debug, Clone)]
pub struct KeywordPattern {
    regex: Option<Regex>,
}

impl KeywordPattern {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, KnowledgeError> {
        let mut parts = Vec::new();
        for p in patterns {
            let p = p.as_ref().trim();
            if p.is_empty() {
                continue;
            }
            Regex::new(p).map_err(|e| KnowledgeError::InvalidPattern {
                pattern: p.to_string(),
                reason: e.to_string(),
            })?;
            parts.push(format!("(?:{p})"));
        }

        if parts.is_empty() {
            return Ok(Self::never());
        }

        let combined = format!("(?i)(?:{})", parts.join("|"));
        let regex = Regex::new(&combined).map_err(|e| KnowledgeError::InvalidPattern {
            pattern: combined.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { regex: Some(regex) })
    }

    /// A pattern that matches nothing.
    pub fn never() -> Self {
        Self { regex: None }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(text))
    }
}

/// Scores chunk text against a query.
#[derive(Debug, Clone)]
pub struct Scorer {
    ranking: KeywordPattern,
    bonus: f64,
}

impl Scorer {
    pub fn new(ranking: KeywordPattern, bonus: f64) -> Self {
        Self {
            ranking,
            bonus: if bonus.is_finite() { bonus.max(0.0) } else { 0.0 },
        }
    }

    /// Score `text` against `query`. Deterministic and never negative.
    pub fn score(&self, query: &str, text: &str) -> f64 {
        self.score_with(&Self::query_terms(query), text)
    }

    /// The unique token set of a query, computed once per search.
    pub(crate) fn query_terms(query: &str) -> HashSet<String> {
        tokenize(query).into_iter().collect()
    }

    pub(crate) fn score_with(&self, terms: &HashSet<String>, text: &str) -> f64 {
        let tokens = tokenize(text);
        let mut hits = tokens.iter().filter(|t| terms.contains(*t)).count() as f64;
        if self.ranking.is_match(text) {
            hits += self.bonus;
        }
        hits / ((tokens.len() + 1) as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking() -> KeywordPattern {
        KeywordPattern::new(&["piecz", "księg", "bram", "ritua", "fortec", "cieni", "nexus", "lyr", "kael"])
            .unwrap()
    }

    #[test]
    fn tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("Alpha beta. Pieczęć gamma!"),
            vec!["alpha", "beta", "pieczęć", "gamma"]
        );
        assert_eq!(tokenize("  --  "), Vec::<String>::new());
        assert_eq!(tokenize("R2-D2, 42x"), vec!["r2", "d2", "42x"]);
    }

    #[test]
    fn tokenize_keeps_non_latin_letters() {
        assert_eq!(tokenize("ŻÓŁW idzie"), vec!["żółw", "idzie"]);
    }

    #[test]
    fn pattern_is_case_insensitive() {
        let p = ranking();
        assert!(p.is_match("Pieczęć"));
        assert!(p.is_match("KSIĘGA"));
        assert!(!p.is_match("nothing to see"));
    }

    #[test]
    fn empty_pattern_list_never_matches() {
        let p = KeywordPattern::new::<&str>(&[]).unwrap();
        assert!(!p.is_match("anything"));
        assert!(!KeywordPattern::new(&["", "  "]).unwrap().is_match(""));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = KeywordPattern::new(&["ok", "Brama("]).unwrap_err();
        assert!(matches!(err, KnowledgeError::InvalidPattern { ref pattern, .. } if pattern == "Brama("));
    }

    #[test]
    fn alternatives_with_groups_combine() {
        let p = KeywordPattern::new(&["Piecz(e|ę)ć", "Rytua(ł|l)"]).unwrap();
        assert!(p.is_match("the pieczeć"));
        assert!(p.is_match("RYTUAŁ"));
        assert!(!p.is_match("rytuax"));
    }

    #[test]
    fn score_counts_repeated_hits() {
        let scorer = Scorer::new(KeywordPattern::never(), 3.0);
        // 2 hits over 4 tokens: 2 / sqrt(5)
        let s = scorer.score("gamma", "gamma delta gamma epsilon");
        assert!((s - 2.0 / 5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn score_applies_keyword_bonus_independent_of_query() {
        let scorer = Scorer::new(ranking(), 3.0);
        let s = scorer.score("unrelated", "Alpha beta. Pieczęć gamma.");
        assert!((s - 3.0 / 5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn score_is_non_negative_on_empty_inputs() {
        let scorer = Scorer::new(ranking(), 3.0);
        assert_eq!(scorer.score("", ""), 0.0);
        assert_eq!(scorer.score("query", ""), 0.0);
        assert!(scorer.score("", "Kael") > 0.0);
    }

    #[test]
    fn negative_bonus_is_clamped() {
        let scorer = Scorer::new(ranking(), -5.0);
        assert_eq!(scorer.score("x", "Kael"), 0.0);
    }

    #[test]
    fn score_is_deterministic() {
        let scorer = Scorer::new(ranking(), 3.0);
        let text = "Brama otwiera się przed Kael. Brama milczy.";
        assert_eq!(scorer.score("brama kael", text), scorer.score("brama kael", text));
    }
}
