// src/occupations/providers/local_catalog.rs
//! Offline provider backed by a small occupation catalog (built-in or TOML).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::error::ProviderResult;
use crate::occupations::{OccupationMappingResult, OccupationProvider, StandardOccupation, WorkActivity};
use crate::skills::{skill_key, ExtractedSkill};

const PROVIDER: &str = "local";
const BUILTIN_CATALOG: &str = include_str!("catalog.toml");
const CATALOG_CONFIDENCE: f32 = 0.7;
/// Substring matches only count for terms at least this long.
const MIN_PARTIAL_LEN: usize = 4;

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    occupations: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    code: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default)]
    technologies: Vec<String>,
    #[serde(default)]
    work_activities: Vec<CatalogActivity>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogActivity {
    description: String,
    #[serde(default)]
    importance: f32,
}

impl CatalogEntry {
    /// Every lowercase term this entry answers to.
    fn terms(&self) -> impl Iterator<Item = String> + '_ {
        self.keywords
            .iter()
            .chain(&self.skills)
            .chain(&self.tools)
            .chain(&self.technologies)
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
    }

    fn matches(&self, key: &str) -> bool {
        self.terms().any(|t| {
            t == key
                || (t.len() >= MIN_PARTIAL_LEN
                    && key.len() >= MIN_PARTIAL_LEN
                    && (key.contains(&t) || t.contains(key)))
        })
    }
}

pub struct LocalCatalogProvider {
    entries: Vec<CatalogEntry>,
    priority: f32,
    enabled: bool,
    top_n: usize,
}

impl LocalCatalogProvider {
    /// Built-in catalog. A broken embedded table degrades to an empty catalog.
    pub fn builtin(priority: f32) -> Self {
        match Self::from_toml_str(BUILTIN_CATALOG, priority) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "built-in occupation catalog failed to parse");
                Self::with_entries(Vec::new(), priority)
            }
        }
    }

    pub fn from_toml_str(s: &str, priority: f32) -> Result<Self> {
        let file: CatalogFile = toml::from_str(s).context("parsing occupation catalog")?;
        Ok(Self::with_entries(file.occupations, priority))
    }

    pub fn from_toml_file(path: &Path, priority: f32) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading occupation catalog from {}", path.display()))?;
        Self::from_toml_str(&content, priority)
            .with_context(|| format!("loading occupation catalog at {}", path.display()))
    }

    fn with_entries(entries: Vec<CatalogEntry>, priority: f32) -> Self {
        Self {
            entries,
            priority,
            enabled: true,
            top_n: 10,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pure mapping step; the trait method only adds timing.
    pub fn map_skills(&self, skills: &[ExtractedSkill]) -> OccupationMappingResult {
        let total_weight: f32 = skills.iter().map(|s| s.confidence.max(0.0)).sum();
        if total_weight <= 0.0 {
            return OccupationMappingResult {
                unmapped_skills: skills.iter().map(|s| s.name.clone()).collect(),
                ..Default::default()
            };
        }

        let keys: Vec<String> = skills.iter().map(|s| skill_key(&s.name)).collect();
        let mut mapped = vec![false; skills.len()];
        let mut out: Vec<StandardOccupation> = Vec::new();

        for entry in &self.entries {
            let mut weight = 0.0f32;
            let mut matched = Vec::new();
            for (i, (skill, key)) in skills.iter().zip(&keys).enumerate() {
                if !key.is_empty() && entry.matches(key) {
                    weight += skill.confidence.max(0.0);
                    matched.push(skill.name.clone());
                    mapped[i] = true;
                }
            }
            if matched.is_empty() {
                continue;
            }
            out.push(StandardOccupation {
                code: entry.code.clone(),
                title: entry.title.clone(),
                description: entry.description.clone(),
                match_score: (weight / total_weight).clamp(0.0, 1.0).sqrt(),
                confidence: CATALOG_CONFIDENCE,
                skills: entry.skills.clone(),
                work_activities: entry
                    .work_activities
                    .iter()
                    .map(|a| WorkActivity {
                        description: a.description.clone(),
                        importance: a.importance.clamp(0.0, 1.0),
                    })
                    .collect(),
                tools: entry.tools.clone(),
                technologies: entry.technologies.clone(),
                matched_skills: matched,
                provider: PROVIDER.to_string(),
            });
        }

        out.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
        out.truncate(self.top_n);

        OccupationMappingResult {
            occupations: out,
            unmapped_skills: skills
                .iter()
                .zip(mapped)
                .filter(|(_, m)| !m)
                .map(|(s, _)| s.name.clone())
                .collect(),
            api_calls: 0,
            cache_hits: 0,
            processing_time_ms: 0,
        }
    }
}

#[async_trait]
impl OccupationProvider for LocalCatalogProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn priority(&self) -> f32 {
        self.priority
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_configured(&self) -> bool {
        !self.entries.is_empty()
    }

    async fn health_check(&self) -> bool {
        !self.entries.is_empty()
    }

    async fn map_skills_to_occupations(
        &self,
        skills: &[ExtractedSkill],
    ) -> ProviderResult<OccupationMappingResult> {
        let t0 = Instant::now();
        let mut r = self.map_skills(skills);
        r.processing_time_ms = t0.elapsed().as_millis() as u64;
        Ok(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::SkillCategory;

    fn skill(name: &str, c: f32) -> ExtractedSkill {
        ExtractedSkill::new(name, SkillCategory::Technical, c, "test")
    }

    #[test]
    fn builtin_catalog_parses_and_spans_groups() {
        let p = LocalCatalogProvider::builtin(0.6);
        assert!(p.len() >= 15);
        for major in ["11", "13", "15", "17", "19", "29"] {
            assert!(
                p.entries.iter().any(|e| e.code.starts_with(major)),
                "missing SOC group {major}"
            );
        }
    }

    #[test]
    fn thermal_skills_map_to_mechanical_engineers() {
        let p = LocalCatalogProvider::builtin(0.6);
        let r = p.map_skills(&[skill("Fluid Dynamics", 0.95), skill("Heat Transfer", 0.95)]);
        let top = &r.occupations[0];
        assert_eq!(top.title, "Mechanical Engineers");
        assert!(top.code.starts_with("17-"));
        assert!((top.match_score - 1.0).abs() < 1e-6);
        assert!(r.unmapped_skills.is_empty());
    }

    #[test]
    fn unmatched_skills_are_reported() {
        let p = LocalCatalogProvider::builtin(0.6);
        let r = p.map_skills(&[skill("Basket Weaving", 0.8), skill("Python", 0.9)]);
        assert_eq!(r.unmapped_skills, vec!["Basket Weaving".to_string()]);
        assert!(r.occupations.iter().any(|o| o.title == "Software Developers"));
    }

    #[test]
    fn custom_catalog_from_toml() {
        let toml = r#"
            [[occupations]]
            code = "17-2011.00"
            title = "Aerospace Engineers"
            keywords = ["aerodynamics"]
        "#;
        let p = LocalCatalogProvider::from_toml_str(toml, 0.5).unwrap();
        let r = p.map_skills(&[skill("Aerodynamics", 0.8)]);
        assert_eq!(r.occupations.len(), 1);
        assert_eq!(r.occupations[0].provider, "local");
    }
}
