// src/skills/mod.rs
//! Skill extraction from free-text course outcomes.
//!
//! Four independent pattern families run over every outcome:
//! 1. action phrases ("apply fluid dynamics principles" → Fluid Dynamics)
//! 2. capitalized multi-word technical terms, filtered by allow/deny lists
//! 3. a fixed tool/software dictionary
//! 4. domain keyword banks, gated by markers in the course context
//!
//! Results are merged by normalized name. If fewer than three unique skills
//! survive and a title is known, skills are inferred from the title at reduced
//! confidence. Extraction never fails.

pub mod disciplines;
pub mod patterns;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use patterns::{
    in_list, ACTION_VERB_RE, ANALYTICAL_HINTS, CAPITALIZED_TERM_RE, DOMAIN_BANKS, FRAMEWORK_HINTS,
    GENERIC_TAIL, INSTRUCTIONAL_PREFIXES, LEADING_FILLER, PHRASE_BLACKLIST, PHRASE_STOP_WORDS,
    TECH_WHITELIST, TOOL_DICTIONARY,
};

pub const MAX_CONFIDENCE: f32 = 0.95;
const MERGE_STEP: f32 = 0.1;

const ACTION_CONFIDENCE: f32 = 0.85;
const CAPITALIZED_CONFIDENCE: f32 = 0.75;
const TOOL_CONFIDENCE: f32 = 0.9;
const DOMAIN_CONFIDENCE: f32 = 0.8;
const TITLE_BASE_CONFIDENCE: f32 = 0.75;
const GENERIC_BASE_CONFIDENCE: f32 = 0.5;
const INTRO_PENALTY: f32 = 0.9;
const MIN_UNIQUE_SKILLS: usize = 3;
const EXCERPT_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Technical,
    Analytical,
    Domain,
    Tool,
    Framework,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSkill {
    /// Normalized, title-cased display name.
    pub name: String,
    pub category: SkillCategory,
    pub confidence: f32,
    /// Outcome text (truncated) the skill was found in.
    pub source: String,
    pub keywords: Vec<String>,
}

impl ExtractedSkill {
    pub fn new(name: &str, category: SkillCategory, confidence: f32, source: &str) -> Self {
        let name = normalize_skill_name(name);
        Self {
            keywords: keywords_for(&name),
            name,
            category,
            confidence: confidence.clamp(0.0, 1.0),
            source: excerpt(source),
        }
    }

    /// Case/punctuation-insensitive identity.
    pub fn key(&self) -> String {
        skill_key(&self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillExtractionResult {
    pub skills: Vec<ExtractedSkill>,
    pub inferred_from_title: bool,
    pub outcomes_processed: usize,
    pub processing_time_ms: u64,
}

/* ----------------------------
Normalization
---------------------------- */

/// Title-case a skill name, keeping short all-caps acronyms and symbol tokens
/// ("HVAC", "C++"). ASCII-only case mapping keeps this idempotent.
pub fn normalize_skill_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '+' | '#' | '.') {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .map(|w| w.trim_end_matches('.'))
        .filter(|w| !w.is_empty())
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(w: &str) -> String {
    let has_symbol = w.contains('+') || w.contains('#') || w.contains('.');
    let is_acronym = (2..=5).contains(&w.len())
        && w.chars().any(|c| c.is_ascii_uppercase())
        && w.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if has_symbol || is_acronym {
        return w.to_string();
    }
    let mut chars = w.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(w.len());
            out.push(first.to_ascii_uppercase());
            out.extend(chars.map(|c| c.to_ascii_lowercase()));
            out
        }
        None => String::new(),
    }
}

/// Dedup key: lowercase normalized name.
pub fn skill_key(name: &str) -> String {
    normalize_skill_name(name).to_lowercase()
}

/// Merging two sightings of one skill: raise, cap at 0.95, never lower.
pub fn merge_confidence(a: f32, b: f32) -> f32 {
    let hi = a.max(b);
    let boosted = (hi + MERGE_STEP).min(MAX_CONFIDENCE);
    hi.max(boosted).clamp(0.0, 1.0)
}

fn keywords_for(name: &str) -> Vec<String> {
    let mut out: Vec<String> = name
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 1 && !in_list(PHRASE_STOP_WORDS, w))
        .collect();
    out.dedup();
    out
}

fn excerpt(s: &str) -> String {
    let s = s.trim();
    if s.chars().count() > EXCERPT_CHARS {
        s.chars().take(EXCERPT_CHARS).collect()
    } else {
        s.to_string()
    }
}

/// Category heuristics for phrases that do not come from a dictionary.
pub fn categorize(name: &str) -> SkillCategory {
    let l = name.to_lowercase();
    if let Some(t) = TOOL_DICTIONARY
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(name))
    {
        return t.category;
    }
    if FRAMEWORK_HINTS.iter().any(|h| l.contains(h)) {
        return SkillCategory::Framework;
    }
    if ANALYTICAL_HINTS.iter().any(|h| l.contains(h)) {
        return SkillCategory::Analytical;
    }
    SkillCategory::Technical
}

/* ----------------------------
Accumulator
---------------------------- */

/// Insertion-ordered, key-deduplicated skill set.
#[derive(Debug, Default)]
struct SkillSet {
    order: Vec<String>,
    by_key: HashMap<String, ExtractedSkill>,
}

impl SkillSet {
    fn add(&mut self, skill: ExtractedSkill) {
        let key = skill.key();
        if key.is_empty() {
            return;
        }
        match self.by_key.get_mut(&key) {
            Some(existing) => {
                if skill.confidence > existing.confidence {
                    existing.category = skill.category;
                }
                existing.confidence = merge_confidence(existing.confidence, skill.confidence);
                for k in skill.keywords {
                    if !existing.keywords.contains(&k) {
                        existing.keywords.push(k);
                    }
                }
            }
            None => {
                self.order.push(key.clone());
                self.by_key.insert(key, skill);
            }
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn into_sorted(mut self, max: usize) -> Vec<ExtractedSkill> {
        let mut out: Vec<ExtractedSkill> = self
            .order
            .iter()
            .filter_map(|k| self.by_key.remove(k))
            .collect();
        // Stable: equal confidences keep discovery order.
        out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        out.truncate(max);
        out
    }
}

/// Merge two extraction results by normalized name (used when the same course
/// is re-extracted, e.g. after outcomes are edited).
pub fn merge_skill_sets(a: Vec<ExtractedSkill>, b: Vec<ExtractedSkill>) -> Vec<ExtractedSkill> {
    let mut set = SkillSet::default();
    let total = a.len() + b.len();
    for s in a.into_iter().chain(b) {
        set.add(s);
    }
    set.into_sorted(total)
}

/* ----------------------------
Extractor
---------------------------- */

#[derive(Debug, Clone)]
pub struct SkillExtractor {
    pub max_skills: usize,
}

impl Default for SkillExtractor {
    fn default() -> Self {
        Self { max_skills: 25 }
    }
}

impl SkillExtractor {
    pub fn new(max_skills: usize) -> Self {
        Self {
            max_skills: max_skills.max(1),
        }
    }

    pub fn extract(
        &self,
        outcomes: &[String],
        title: Option<&str>,
        level: Option<&str>,
    ) -> SkillExtractionResult {
        let t0 = Instant::now();
        let mut set = SkillSet::default();

        let context = format!(
            "{} {} {}",
            title.unwrap_or_default(),
            level.unwrap_or_default(),
            outcomes.join(" ")
        )
        .to_lowercase();

        let mut processed = 0usize;
        for outcome in outcomes.iter().map(|o| o.trim()).filter(|o| !o.is_empty()) {
            processed += 1;
            for s in action_phrases(outcome) {
                set.add(s);
            }
            for s in capitalized_terms(outcome) {
                set.add(s);
            }
            for s in dictionary_tools(outcome) {
                set.add(s);
            }
            for s in domain_keywords(outcome, &context) {
                set.add(s);
            }
        }

        let mut inferred = false;
        if set.len() < MIN_UNIQUE_SKILLS {
            if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
                inferred = true;
                for s in infer_from_title(title, level) {
                    set.add(s);
                }
            }
        }

        let skills = set.into_sorted(self.max_skills);
        tracing::debug!(
            outcomes = processed,
            skills = skills.len(),
            inferred,
            "skills extracted"
        );

        SkillExtractionResult {
            skills,
            inferred_from_title: inferred,
            outcomes_processed: processed,
            processing_time_ms: t0.elapsed().as_millis() as u64,
        }
    }
}

/// Family 1: verb + following noun phrase, cut at stop words and punctuation.
fn action_phrases(outcome: &str) -> Vec<ExtractedSkill> {
    let mut out = Vec::new();
    for m in ACTION_VERB_RE.find_iter(outcome) {
        let rest = &outcome[m.end()..];
        let clause = rest
            .split(|c: char| matches!(c, ',' | '.' | ';' | ':' | '(' | ')' | '\n'))
            .next()
            .unwrap_or_default();

        let mut words: Vec<&str> = clause.split_whitespace().take(8).collect();
        strip_leading_filler(&mut words);
        if words.len() >= 2
            && in_list(GENERIC_TAIL, words[0])
            && words[1].eq_ignore_ascii_case("of")
        {
            words.drain(0..2);
            strip_leading_filler(&mut words);
        }

        let mut phrase: Vec<&str> = words
            .into_iter()
            .take_while(|w| !in_list(PHRASE_STOP_WORDS, w))
            .take(4)
            .collect();
        while phrase.last().is_some_and(|w| in_list(GENERIC_TAIL, w)) {
            phrase.pop();
        }
        if phrase.is_empty() {
            continue;
        }
        let joined = phrase.join(" ");
        if joined.len() < 3 || (phrase.len() == 1 && in_list(PHRASE_BLACKLIST, &joined)) {
            continue;
        }
        out.push(ExtractedSkill::new(
            &joined,
            categorize(&joined),
            ACTION_CONFIDENCE,
            outcome,
        ));
    }
    out
}

fn strip_leading_filler(words: &mut Vec<&str>) {
    while words.first().is_some_and(|w| in_list(LEADING_FILLER, w)) {
        words.remove(0);
    }
}

/// Family 2: capitalized multi-word terms. A technical whitelist hit overrides
/// the instructional-prefix denylist; leading instructional words are dropped.
fn capitalized_terms(outcome: &str) -> Vec<ExtractedSkill> {
    let mut out = Vec::new();
    for m in CAPITALIZED_TERM_RE.find_iter(outcome) {
        let raw = m.as_str();
        let lower = raw.to_lowercase();
        let whitelisted = TECH_WHITELIST.iter().any(|w| lower.contains(w));
        let denied = INSTRUCTIONAL_PREFIXES.iter().any(|p| {
            lower.starts_with(p)
                && lower[p.len()..]
                    .chars()
                    .next()
                    .is_none_or(|c| !c.is_alphanumeric())
        });
        if denied && !whitelisted {
            continue;
        }

        let mut words: Vec<&str> = raw.split([' ', '-']).filter(|w| !w.is_empty()).collect();
        while words.first().is_some_and(|w| {
            in_list(LEADING_FILLER, w)
                || in_list(INSTRUCTIONAL_PREFIXES, w)
                || ACTION_VERB_RE.is_match(w)
        }) {
            words.remove(0);
        }
        if words.len() < 2 || words.len() > 5 {
            continue;
        }
        let joined = words.join(" ");
        out.push(ExtractedSkill::new(
            &joined,
            categorize(&joined),
            CAPITALIZED_CONFIDENCE,
            outcome,
        ));
    }
    out
}

/// Family 3: fixed dictionary of tools and frameworks.
fn dictionary_tools(outcome: &str) -> Vec<ExtractedSkill> {
    TOOL_DICTIONARY
        .iter()
        .filter(|t| t.re.is_match(outcome))
        .map(|t| ExtractedSkill::new(t.name, t.category, TOOL_CONFIDENCE, outcome))
        .collect()
}

/// Family 4: domain keywords, only for banks whose markers appear in the context.
fn domain_keywords(outcome: &str, context: &str) -> Vec<ExtractedSkill> {
    let mut out = Vec::new();
    for bank in DOMAIN_BANKS
        .iter()
        .filter(|b| b.markers.iter().any(|m| context.contains(m)))
    {
        for (re, name) in &bank.keywords {
            if re.is_match(outcome) {
                out.push(ExtractedSkill::new(
                    name,
                    SkillCategory::Domain,
                    DOMAIN_CONFIDENCE,
                    outcome,
                ));
            }
        }
    }
    out
}

/// Fallback: discipline table keyed by title substrings, else generic analytical skills.
fn infer_from_title(title: &str, level: Option<&str>) -> Vec<ExtractedSkill> {
    let mut multiplier = disciplines::level_multiplier(level);
    if disciplines::is_introductory(level, Some(title)) {
        multiplier *= INTRO_PENALTY;
    }
    let source = format!("title: {title}");

    let names = disciplines::skills_for_title(title);
    if names.is_empty() {
        return disciplines::GENERIC_ANALYTICAL
            .iter()
            .map(|n| {
                ExtractedSkill::new(
                    n,
                    SkillCategory::Analytical,
                    GENERIC_BASE_CONFIDENCE * multiplier,
                    &source,
                )
            })
            .collect();
    }
    names
        .into_iter()
        .map(|n| {
            ExtractedSkill::new(
                n,
                categorize(n),
                TITLE_BASE_CONFIDENCE * multiplier,
                &source,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(r: &SkillExtractionResult) -> Vec<String> {
        r.skills.iter().map(|s| s.name.clone()).collect()
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [
            "fluid dynamics",
            "HVAC systems",
            "c++ programming",
            "  heat---transfer!! ",
            "ASP.NET core",
            "Über-Design",
            "a1 b2",
        ] {
            let once = normalize_skill_name(raw);
            assert_eq!(normalize_skill_name(&once), once, "raw = {raw:?}");
        }
        assert_eq!(normalize_skill_name("fluid dynamics"), "Fluid Dynamics");
        assert_eq!(normalize_skill_name("HVAC systems"), "HVAC Systems");
    }

    #[test]
    fn merge_confidence_never_decreases_and_caps() {
        assert!((merge_confidence(0.8, 0.7) - 0.9).abs() < 1e-6);
        assert!((merge_confidence(0.9, 0.9) - 0.95).abs() < 1e-6);
        assert!((merge_confidence(0.95, 0.95) - 0.95).abs() < 1e-6);
        assert!((merge_confidence(0.99, 0.1) - 0.99).abs() < 1e-6);
    }

    #[test]
    fn action_phrase_strips_generic_tail_and_stop_words() {
        let found = action_phrases(
            "Apply fluid dynamics principles to analyze heat transfer in HVAC systems",
        );
        let n: Vec<_> = found.iter().map(|s| s.name.as_str()).collect();
        assert!(n.contains(&"Fluid Dynamics"), "got {n:?}");
        assert!(n.contains(&"Heat Transfer"), "got {n:?}");
    }

    #[test]
    fn blacklisted_single_words_are_dropped() {
        let found = action_phrases("Analyze data and evaluate results");
        assert!(found.is_empty(), "got {found:?}");
    }

    #[test]
    fn capitalized_terms_respect_whitelist_and_denylist() {
        let found = capitalized_terms("Explain The Role of Leaders in Society");
        assert!(found.is_empty(), "denylisted prefix without tech words: {found:?}");

        let found = capitalized_terms("Perform Finite Element Analysis on brackets");
        let n: Vec<_> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(n, vec!["Finite Element Analysis"]);
    }

    #[test]
    fn domain_keywords_need_a_context_marker() {
        let outcome = "Discuss algorithms used in daily life";
        assert!(domain_keywords(outcome, "history of science").is_empty());
        let found = domain_keywords(outcome, "intro to computer science");
        assert_eq!(found[0].name, "Algorithms");
        assert_eq!(found[0].category, SkillCategory::Domain);
    }

    #[test]
    fn title_fallback_applies_level_multiplier() {
        let ex = SkillExtractor::default();
        let r = ex.extract(&[], Some("Introduction to Marketing"), Some("Introductory"));
        assert!(r.inferred_from_title);
        let ms = r.skills.iter().find(|s| s.name == "Market Research").unwrap();
        // 0.75 * 0.85 * 0.9
        assert!((ms.confidence - 0.57375).abs() < 1e-4, "{}", ms.confidence);
    }

    #[test]
    fn unknown_title_yields_generic_analytical() {
        let ex = SkillExtractor::default();
        let r = ex.extract(&[], Some("Pottery Studio"), None);
        assert!(names(&r).contains(&"Critical Thinking".to_string()));
        assert!(r
            .skills
            .iter()
            .all(|s| s.category == SkillCategory::Analytical));
    }

    #[test]
    fn empty_input_without_title_is_empty() {
        let r = SkillExtractor::default().extract(&[], None, None);
        assert!(r.skills.is_empty());
        assert!(!r.inferred_from_title);
    }
}
