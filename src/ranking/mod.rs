// src/ranking/mod.rs
//! Similarity ranking of discovered companies against the course profile.
//!
//! Per candidate:
//! - raw similarity: embeddings when available and the breaker allows,
//!   otherwise keyword overlap
//! - `penalized = raw × (1 − penalty)`, penalty = max(exclusion, generic industry)
//! - with open roles: `boost = boost_factor × (0.5 + 0.5 × min(1, jobs / saturation))`,
//!   `final = min(1, penalized × (1 + boost))`
//!
//! The keep/filter threshold adapts to the pool size.

pub mod embeddings;
pub mod keyword;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::SharedClock;
use crate::config::RankingConfig;
use crate::discovery::DiscoveredCompany;
use crate::exclusion::{ExclusionContext, ExclusionDecision, IndustryExclusionEngine};
use crate::occupations::CoordinatedOccupation;
use crate::skills::{skill_key, ExtractedSkill};
use crate::telemetry::{PipelineEvent, SharedTelemetry};

pub use embeddings::{cosine_similarity, CircuitBreaker, EmbeddingProvider, OpenAiEmbeddings};
pub use keyword::{jaccard, tokenize, KeywordScore, KeywordSimilarity};

const TOP_OCCUPATION_TITLES: usize = 5;
const MAX_PROFILE_TECHNOLOGIES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMethod {
    Embedding,
    Keyword,
    /// Ranking skipped; candidates passed through unscored.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMatch {
    pub company_id: String,
    pub raw_score: f32,
    pub penalty: f32,
    pub final_score: f32,
    pub confidence_tier: ConfidenceTier,
    pub matching_skills: Vec<String>,
    pub matching_activities: Vec<String>,
    pub explanation: String,
    pub hiring_boost: f32,
    pub method: SimilarityMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCompany {
    pub company: DiscoveredCompany,
    pub semantic: Option<SemanticMatch>,
    pub exclusion: ExclusionDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingOutcome {
    pub kept: Vec<RankedCompany>,
    pub filtered: Vec<RankedCompany>,
    pub threshold: Option<f32>,
    pub skipped: bool,
    pub method: SimilarityMethod,
}

/// Course side of the comparison.
#[derive(Debug, Clone, Default)]
pub struct CourseProfile {
    pub skills: Vec<ExtractedSkill>,
    pub occupations: Vec<CoordinatedOccupation>,
}

impl CourseProfile {
    pub fn new(skills: Vec<ExtractedSkill>, occupations: Vec<CoordinatedOccupation>) -> Self {
        Self { skills, occupations }
    }

    /// Nothing to compare against: ranking is skipped.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty() && self.occupations.is_empty()
    }

    fn high_importance_activities(&self, min_importance: f32) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for o in &self.occupations {
            for wa in &o.occupation.work_activities {
                if wa.importance >= min_importance
                    && !out.iter().any(|x| x.eq_ignore_ascii_case(&wa.description))
                {
                    out.push(wa.description.clone());
                }
            }
        }
        out
    }

    /// Skills, top occupation titles, high-importance work activities and
    /// technologies, as one text.
    pub fn course_text(&self, min_importance: f32) -> String {
        let mut parts: Vec<String> = self.skills.iter().map(|s| s.name.clone()).collect();
        parts.extend(
            self.occupations
                .iter()
                .take(TOP_OCCUPATION_TITLES)
                .map(|o| o.occupation.title.clone()),
        );
        parts.extend(self.high_importance_activities(min_importance));
        let mut techs: Vec<String> = Vec::new();
        for o in &self.occupations {
            crate::occupations::union_into(&mut techs, &o.occupation.technologies);
        }
        techs.truncate(MAX_PROFILE_TECHNOLOGIES);
        parts.extend(techs);
        parts.join(". ")
    }
}

/// Description, job titles and technologies. Falls back to the sector text
/// when the company carries none of those.
pub fn company_text(c: &DiscoveredCompany) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(d) = c.description.as_deref().filter(|d| !d.trim().is_empty()) {
        parts.push(d.to_string());
    }
    parts.extend(c.job_postings.iter().map(|j| j.title.clone()));
    parts.extend(c.technologies.iter().cloned());
    if parts.is_empty() {
        if let Some(s) = c.sector_text() {
            parts.push(s);
        }
    }
    parts.join(". ")
}

pub fn hiring_boost(boost_factor: f32, job_count: usize, saturation: usize) -> f32 {
    if job_count == 0 {
        return 0.0;
    }
    let volume = (job_count as f32 / saturation.max(1) as f32).min(1.0);
    boost_factor * (0.5 + 0.5 * volume)
}

/// `final = min(1, raw × (1 − penalty) × (1 + boost))`, clamped to [0,1].
pub fn final_score(raw: f32, penalty: f32, boost: f32) -> f32 {
    let penalized = raw.clamp(0.0, 1.0) * (1.0 - penalty.clamp(0.0, 1.0));
    (penalized * (1.0 + boost.max(0.0))).clamp(0.0, 1.0)
}

pub struct SimilarityRanker {
    cfg: RankingConfig,
    exclusion: Arc<IndustryExclusionEngine>,
    keyword: KeywordSimilarity,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    breaker: CircuitBreaker,
    telemetry: SharedTelemetry,
}

impl SimilarityRanker {
    pub fn new(
        cfg: RankingConfig,
        exclusion: Arc<IndustryExclusionEngine>,
        embeddings: Option<Arc<dyn EmbeddingProvider>>,
        clock: SharedClock,
        telemetry: SharedTelemetry,
    ) -> Self {
        let keyword = KeywordSimilarity::new(
            &cfg.important_terms,
            cfg.important_term_bonus,
            cfg.important_bonus_cap,
            cfg.keyword_floor,
        );
        let breaker = CircuitBreaker::new(cfg.breaker_failure_threshold, cfg.breaker_cooldown_secs, clock);
        Self {
            cfg,
            exclusion,
            keyword,
            embeddings,
            breaker,
            telemetry,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn tier(&self, score: f32) -> ConfidenceTier {
        if score >= self.cfg.high_tier {
            ConfidenceTier::High
        } else if score >= self.cfg.medium_tier {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    /// Embedding scores when possible; `None` means fall back to keywords.
    async fn embedding_scores(&self, anchor: &str, texts: &[String]) -> Option<Vec<f32>> {
        let provider = self.embeddings.as_ref()?;
        if !self.breaker.allow() {
            self.telemetry.record(PipelineEvent::DegradedMode {
                reason: "embedding circuit open".into(),
            });
            return None;
        }
        match provider.batch_similarity(anchor, texts).await {
            Ok(scores) if scores.len() == texts.len() => {
                self.breaker.record_success();
                Some(scores)
            }
            Ok(scores) => {
                self.on_embedding_failure(format!(
                    "{} returned {} scores for {} candidates",
                    provider.name(),
                    scores.len(),
                    texts.len()
                ));
                None
            }
            Err(e) => {
                self.on_embedding_failure(e.to_string());
                None
            }
        }
    }

    fn on_embedding_failure(&self, reason: String) {
        tracing::warn!(reason = %reason, "embedding similarity failed, using keyword fallback");
        if let Some(failures) = self.breaker.record_failure() {
            tracing::warn!(failures, "embedding circuit opened");
            self.telemetry.record(PipelineEvent::CircuitOpened { failures });
        }
        self.telemetry.record(PipelineEvent::DegradedMode { reason });
    }

    pub async fn rank(
        &self,
        profile: &CourseProfile,
        companies: Vec<DiscoveredCompany>,
        ctx: &ExclusionContext,
    ) -> RankingOutcome {
        if profile.is_empty() {
            tracing::info!(candidates = companies.len(), "course profile empty, ranking skipped");
            let kept = companies
                .into_iter()
                .map(|c| {
                    let exclusion =
                        self.exclusion
                            .evaluate(c.sector_text().as_deref(), &c.job_titles(), ctx);
                    RankedCompany {
                        company: c,
                        semantic: None,
                        exclusion,
                    }
                })
                .collect();
            return RankingOutcome {
                kept,
                filtered: Vec::new(),
                threshold: None,
                skipped: true,
                method: SimilarityMethod::None,
            };
        }

        let pool = companies.len();
        let threshold = self.cfg.threshold_for_pool(pool);
        self.telemetry
            .record(PipelineEvent::ThresholdSelected { pool, threshold });

        let anchor = profile.course_text(self.cfg.work_activity_min_importance);
        let texts: Vec<String> = companies.iter().map(company_text).collect();

        let (raw_scores, method) = match self.embedding_scores(&anchor, &texts).await {
            Some(s) => (s, SimilarityMethod::Embedding),
            None => (
                texts
                    .iter()
                    .map(|t| self.keyword.score(&anchor, t).score)
                    .collect(),
                SimilarityMethod::Keyword,
            ),
        };

        let activities = profile.high_importance_activities(self.cfg.work_activity_min_importance);
        let mut ranked: Vec<RankedCompany> = Vec::with_capacity(pool);
        for ((company, text), raw) in companies.into_iter().zip(&texts).zip(raw_scores) {
            let exclusion = self
                .exclusion
                .evaluate(company.sector_text().as_deref(), &company.job_titles(), ctx);
            let penalty = self
                .exclusion
                .ranking_penalty(&exclusion, company.industry.as_deref());
            let boost = hiring_boost(
                self.cfg.boost_factor,
                company.job_postings.len(),
                self.cfg.job_count_saturation,
            );
            let final_score = final_score(raw, penalty, boost);

            let text_l = text.to_lowercase();
            let text_tokens = tokenize(text);
            let matching_skills: Vec<String> = profile
                .skills
                .iter()
                .filter(|s| {
                    let k = skill_key(&s.name);
                    !k.is_empty() && text_l.contains(&k)
                })
                .map(|s| s.name.clone())
                .collect();
            let matching_activities: Vec<String> = activities
                .iter()
                .filter(|a| tokenize(a).iter().filter(|t| t.len() > 4).any(|t| text_tokens.contains(t)))
                .cloned()
                .collect();

            let explanation = explain(
                raw,
                penalty,
                boost,
                &matching_skills,
                &exclusion,
                company.job_postings.len(),
            );
            ranked.push(RankedCompany {
                semantic: Some(SemanticMatch {
                    company_id: company.key(),
                    raw_score: raw,
                    penalty,
                    final_score,
                    confidence_tier: self.tier(final_score),
                    matching_skills,
                    matching_activities,
                    explanation,
                    hiring_boost: boost,
                    method,
                }),
                company,
                exclusion,
            });
        }

        // stable: equal scores keep discovery order
        ranked.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));
        let (kept, filtered): (Vec<_>, Vec<_>) =
            ranked.into_iter().partition(|r| score_of(r) >= threshold);

        if !filtered.is_empty() {
            self.telemetry.record(PipelineEvent::CandidatesDropped {
                stage: "similarity_threshold",
                count: filtered.len(),
            });
        }
        tracing::info!(
            pool,
            threshold,
            kept = kept.len(),
            filtered = filtered.len(),
            method = ?method,
            "ranking finished"
        );

        RankingOutcome {
            kept,
            filtered,
            threshold: Some(threshold),
            skipped: false,
            method,
        }
    }
}

fn score_of(r: &RankedCompany) -> f32 {
    r.semantic.as_ref().map(|s| s.final_score).unwrap_or(0.0)
}

fn explain(
    raw: f32,
    penalty: f32,
    boost: f32,
    skills: &[String],
    exclusion: &ExclusionDecision,
    jobs: usize,
) -> String {
    let mut s = format!("similarity {raw:.2}");
    if !skills.is_empty() {
        let shown: Vec<&str> = skills.iter().take(3).map(String::as_str).collect();
        s.push_str(&format!("; matches {}", shown.join(", ")));
    }
    if penalty > 0.0 {
        s.push_str(&format!("; penalty {penalty:.2} ({})", exclusion.reason));
    }
    if boost > 0.0 {
        s.push_str(&format!("; hiring boost {:.0}% for {jobs} open roles", boost * 100.0));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_score_is_clamped() {
        assert_eq!(final_score(1.0, 0.0, 5.0), 1.0);
        assert_eq!(final_score(2.0, -1.0, 0.0), 1.0);
        assert_eq!(final_score(0.9, 1.0, 0.5), 0.0);
        assert_eq!(final_score(-0.5, 0.0, 0.2), 0.0);
    }

    #[test]
    fn hiring_boost_scales_with_volume() {
        assert_eq!(hiring_boost(0.15, 0, 10), 0.0);
        assert!((hiring_boost(0.15, 1, 10) - 0.0825).abs() < 1e-6);
        assert!((hiring_boost(0.15, 10, 10) - 0.15).abs() < 1e-6);
        assert!((hiring_boost(0.15, 50, 10) - 0.15).abs() < 1e-6);
    }

    #[test]
    fn adaptive_threshold_tracks_pool_size() {
        let cfg = RankingConfig::default();
        assert!((cfg.threshold_for_pool(25) - 0.50).abs() < 1e-6);
        assert!((cfg.threshold_for_pool(15) - 0.45).abs() < 1e-6);
        assert!((cfg.threshold_for_pool(8) - 0.40).abs() < 1e-6);
        assert!((cfg.threshold_for_pool(5) - 0.35).abs() < 1e-6);
        assert!((cfg.threshold_for_pool(4) - 0.35).abs() < 1e-6);
    }

    #[test]
    fn company_text_falls_back_to_sector() {
        let mut c = DiscoveredCompany::new("Acme", "test");
        c.industry = Some("Mechanical Engineering".into());
        assert_eq!(company_text(&c), "Mechanical Engineering");
        c.technologies = vec!["SolidWorks".into()];
        assert_eq!(company_text(&c), "SolidWorks");
    }
}
