// src/ranking/keyword.rs
//! Deterministic keyword-overlap similarity, used whenever embeddings are
//! unavailable.

use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is",
    "it", "its", "of", "on", "or", "our", "that", "the", "their", "this", "to", "we", "with",
    "you", "your", "will", "can", "all", "more", "other", "into", "over", "about", "who",
    "which", "using", "use", "new", "inc", "llc", "company", "team", "work", "working",
];

/// Lowercase tokens with stop words and one-letter noise removed. `+` and `#`
/// stay attached ("c++", "c#").
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|t| t.len() > 1 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    let union = a.len() + b.len() - inter;
    inter as f32 / union as f32
}

#[derive(Debug, Clone)]
pub struct KeywordSimilarity {
    important_terms: Vec<String>,
    term_bonus: f32,
    bonus_cap: f32,
    floor: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordScore {
    pub score: f32,
    pub jaccard: f32,
    pub shared_important: Vec<String>,
}

impl KeywordSimilarity {
    pub fn new(important_terms: &[String], term_bonus: f32, bonus_cap: f32, floor: f32) -> Self {
        Self {
            important_terms: important_terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            term_bonus: term_bonus.max(0.0),
            bonus_cap: bonus_cap.max(0.0),
            floor: floor.clamp(0.0, 1.0),
        }
    }

    pub fn score(&self, course_text: &str, company_text: &str) -> KeywordScore {
        let a = tokenize(course_text);
        let b = tokenize(company_text);
        let j = jaccard(&a, &b);

        let course_l = course_text.to_lowercase();
        let company_l = company_text.to_lowercase();
        let shared: Vec<String> = self
            .important_terms
            .iter()
            .filter(|t| course_l.contains(t.as_str()) && company_l.contains(t.as_str()))
            .cloned()
            .collect();

        let bonus = (shared.len() as f32 * self.term_bonus).min(self.bonus_cap);
        let mut score = (j + bonus).min(1.0);
        if !shared.is_empty() && a.intersection(&b).next().is_none() {
            score = score.max(self.floor);
        }

        KeywordScore {
            score: score.clamp(0.0, 1.0),
            jaccard: j,
            shared_important: shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> KeywordSimilarity {
        let terms: Vec<String> = ["python", "cad", "machine learning", "hvac"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        KeywordSimilarity::new(&terms, 0.05, 0.20, 0.15)
    }

    #[test]
    fn tokenizer_drops_stop_words_and_keeps_symbols() {
        let t = tokenize("The C++ and C# developers, with Python!");
        assert!(t.contains("c++") && t.contains("c#") && t.contains("python"));
        assert!(!t.contains("the") && !t.contains("with"));
    }

    #[test]
    fn identical_texts_score_one() {
        let s = sim().score("heat transfer hvac design", "heat transfer hvac design");
        assert!((s.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn floor_applies_when_only_important_terms_overlap() {
        // "cad" appears inside "autocad" but no token is shared
        let s = sim().score("cad drafting", "autocad licensing reseller");
        assert_eq!(s.jaccard, 0.0);
        assert!((s.score - 0.15).abs() < 1e-6);
    }

    #[test]
    fn bonus_is_capped() {
        let terms: Vec<String> = (0..10).map(|i| format!("term{i}")).collect();
        let k = KeywordSimilarity::new(&terms, 0.05, 0.20, 0.15);
        let text = terms.join(" ");
        let s = k.score(&text, &text);
        assert!((s.score - 1.0).abs() < 1e-6);
        let s = k.score(&format!("{text} alpha beta gamma"), &format!("{text} delta"));
        assert!(s.score <= s.jaccard + 0.20 + 1e-6);
    }

    #[test]
    fn disjoint_texts_score_zero() {
        let s = sim().score("pottery glazing", "freight trucking");
        assert_eq!(s.score, 0.0);
    }
}
