// src/occupations/mod.rs
//! Skill → standardized occupation mapping.
//!
//! Each [`OccupationProvider`] maps extracted skills to [`StandardOccupation`]
//! records in its own way; [`OccupationCoordinator`] fans out to all usable
//! providers and merges their answers into a consensus ranking.

pub mod coordinator;
pub mod providers;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;
use crate::skills::ExtractedSkill;

pub use coordinator::{CoordinatedOccupation, CoordinationResult, OccupationCoordinator};
pub use providers::{build_providers, EscoProvider, LocalCatalogProvider, OnetProvider};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkActivity {
    pub description: String,
    /// 0..=1; O*NET importance scaled down from 1..5.
    pub importance: f32,
}

/// Provider-neutral occupation record. Every provider normalizes its native
/// payload into this shape before returning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardOccupation {
    /// SOC-style code ("17-2141.00"); ESCO codes are crosswalked first.
    pub code: String,
    pub title: String,
    pub description: String,
    pub match_score: f32,
    pub confidence: f32,
    pub skills: Vec<String>,
    pub work_activities: Vec<WorkActivity>,
    pub tools: Vec<String>,
    pub technologies: Vec<String>,
    /// Input skill names that led to this occupation.
    pub matched_skills: Vec<String>,
    pub provider: String,
}

impl StandardOccupation {
    /// First two digits of the code, if it looks like a SOC code.
    pub fn soc_major(&self) -> Option<&str> {
        soc_major(&self.code)
    }
}

pub fn soc_major(code: &str) -> Option<&str> {
    let major = code.get(0..2)?;
    major.chars().all(|c| c.is_ascii_digit()).then_some(major)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OccupationMappingResult {
    pub occupations: Vec<StandardOccupation>,
    pub unmapped_skills: Vec<String>,
    pub api_calls: u32,
    pub cache_hits: u32,
    pub processing_time_ms: u64,
}

#[async_trait]
pub trait OccupationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Static ordering weight; higher runs (and is listed) first.
    fn priority(&self) -> f32;

    fn is_enabled(&self) -> bool {
        true
    }

    fn is_configured(&self) -> bool;

    async fn health_check(&self) -> bool;

    async fn map_skills_to_occupations(
        &self,
        skills: &[ExtractedSkill],
    ) -> ProviderResult<OccupationMappingResult>;
}

/// Grouping key for occupation titles: lowercase, punctuation stripped,
/// whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Append `items` to `into`, skipping case-insensitive duplicates.
pub(crate) fn union_into(into: &mut Vec<String>, items: &[String]) {
    for it in items {
        if !into.iter().any(|x| x.eq_ignore_ascii_case(it)) {
            into.push(it.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_normalization_groups_variants() {
        assert_eq!(
            normalize_title("  Mechanical   Engineers "),
            normalize_title("mechanical engineers.")
        );
        assert_eq!(normalize_title("Software Developers, Applications"), "software developers applications");
    }

    #[test]
    fn soc_major_requires_digits() {
        assert_eq!(soc_major("17-2141.00"), Some("17"));
        assert_eq!(soc_major("x7-1"), None);
        assert_eq!(soc_major("1"), None);
    }

    #[test]
    fn union_is_case_insensitive() {
        let mut v = vec!["Python".to_string()];
        union_into(&mut v, &["python".into(), "SQL".into()]);
        assert_eq!(v, vec!["Python".to_string(), "SQL".to_string()]);
    }
}
