// src/occupations/coordinator.rs
//! Parallel fan-out over occupation providers and consensus merge.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{normalize_title, union_into, OccupationMappingResult, OccupationProvider, StandardOccupation};
use crate::error::{PipelineError, PipelineResult, ProviderError};
use crate::skills::ExtractedSkill;
use crate::telemetry::{PipelineEvent, SharedTelemetry};

const W_MATCH: f32 = 0.4;
const W_CONFIDENCE: f32 = 0.3;
const W_AGREEMENT: f32 = 0.3;
const HEALTH_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatedOccupation {
    pub occupation: StandardOccupation,
    pub consensus_score: f32,
    /// Provider names that contributed, in merge order.
    pub providers: Vec<String>,
    pub avg_match_score: f32,
    pub avg_confidence: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinationResult {
    pub occupations: Vec<CoordinatedOccupation>,
    pub unmapped_skills: Vec<String>,
    pub providers_queried: usize,
    pub providers_succeeded: Vec<String>,
    pub api_calls: u32,
    pub cache_hits: u32,
    pub processing_time_ms: u64,
}

/// 0.4·avg(match) + 0.3·avg(confidence) + 0.3·(matched/queried), clamped to [0,1].
pub fn consensus_score(
    avg_match: f32,
    avg_confidence: f32,
    providers_matched: usize,
    providers_queried: usize,
) -> f32 {
    let agreement = if providers_queried == 0 {
        0.0
    } else {
        (providers_matched as f32 / providers_queried as f32).min(1.0)
    };
    (W_MATCH * avg_match + W_CONFIDENCE * avg_confidence + W_AGREEMENT * agreement).clamp(0.0, 1.0)
}

pub struct OccupationCoordinator {
    providers: Vec<Arc<dyn OccupationProvider>>,
    per_call_timeout: Duration,
    top_n: usize,
    telemetry: SharedTelemetry,
}

impl OccupationCoordinator {
    pub fn new(
        providers: Vec<Arc<dyn OccupationProvider>>,
        per_call_timeout_secs: u64,
        top_n: usize,
        telemetry: SharedTelemetry,
    ) -> Self {
        Self {
            providers,
            per_call_timeout: Duration::from_secs(per_call_timeout_secs.max(1)),
            top_n: top_n.max(1),
            telemetry,
        }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Enabled + configured + healthy providers, highest priority first.
    async fn usable_providers(&self) -> Vec<Arc<dyn OccupationProvider>> {
        let candidates: Vec<_> = self
            .providers
            .iter()
            .filter(|p| {
                let ok = p.is_enabled() && p.is_configured();
                if !ok {
                    tracing::debug!(provider = p.name(), "occupation provider disabled or not configured");
                }
                ok
            })
            .cloned()
            .collect();

        let health_timeout = self.per_call_timeout.min(Duration::from_secs(HEALTH_TIMEOUT_SECS));
        let checks = candidates.iter().map(|p| {
            let p = Arc::clone(p);
            async move {
                let healthy = tokio::time::timeout(health_timeout, p.health_check())
                    .await
                    .unwrap_or(false);
                (p, healthy)
            }
        });

        let mut usable = Vec::new();
        for (p, healthy) in join_all(checks).await {
            self.telemetry.record(PipelineEvent::ProviderHealth {
                provider: p.name(),
                healthy,
            });
            if healthy {
                usable.push(p);
            } else {
                tracing::warn!(provider = p.name(), "occupation provider failed health check");
            }
        }
        usable.sort_by(|a, b| b.priority().total_cmp(&a.priority()));
        usable
    }

    /// Map skills to a consensus-ranked occupation list.
    ///
    /// Fails only when no provider is usable or every usable provider failed.
    pub async fn coordinate(&self, skills: &[ExtractedSkill]) -> PipelineResult<CoordinationResult> {
        let t0 = Instant::now();
        let usable = self.usable_providers().await;
        if usable.is_empty() {
            return Err(PipelineError::NoOccupationProviders);
        }

        let timeout = self.per_call_timeout;
        let calls = usable.iter().map(|p| {
            let p = Arc::clone(p);
            async move {
                let started = Instant::now();
                let res = match tokio::time::timeout(timeout, p.map_skills_to_occupations(skills)).await {
                    Ok(r) => r,
                    Err(_) => Err(ProviderError::Timeout {
                        provider: p.name(),
                        secs: timeout.as_secs(),
                    }),
                };
                (p, res, started.elapsed().as_millis() as u64)
            }
        });

        // Results keep priority order; isolation is per future.
        let mut successes: Vec<(&'static str, OccupationMappingResult)> = Vec::new();
        for (p, res, ms) in join_all(calls).await {
            match res {
                Ok(r) => {
                    self.telemetry.record(PipelineEvent::ProviderSucceeded {
                        provider: p.name(),
                        occupations: r.occupations.len(),
                        cache_hits: r.cache_hits,
                        api_calls: r.api_calls,
                        ms,
                    });
                    successes.push((p.name(), r));
                }
                Err(e) => {
                    tracing::warn!(provider = p.name(), error = %e, "occupation provider failed");
                    self.telemetry.record(PipelineEvent::ProviderFailed {
                        provider: p.name(),
                        stage: "map_skills",
                        reason: e.to_string(),
                    });
                }
            }
        }
        if successes.is_empty() {
            return Err(PipelineError::NoOccupationProviders);
        }

        let queried = usable.len();
        let mut result = merge_results(&successes, queried, self.top_n);
        result.providers_queried = queried;
        result.unmapped_skills = unmapped(skills, &result.occupations);
        result.processing_time_ms = t0.elapsed().as_millis() as u64;

        tracing::info!(
            providers = queried,
            succeeded = result.providers_succeeded.len(),
            occupations = result.occupations.len(),
            unmapped = result.unmapped_skills.len(),
            "occupation coordination finished"
        );
        Ok(result)
    }
}

#[derive(Default)]
struct Group {
    merged: Option<StandardOccupation>,
    providers: Vec<String>,
    match_sum: f32,
    confidence_sum: f32,
    entries: usize,
}

fn merge_results(
    successes: &[(&'static str, OccupationMappingResult)],
    providers_queried: usize,
    top_n: usize,
) -> CoordinationResult {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Group> = HashMap::new();
    let mut out = CoordinationResult::default();

    for (name, r) in successes {
        out.providers_succeeded.push(name.to_string());
        out.api_calls += r.api_calls;
        out.cache_hits += r.cache_hits;

        for occ in &r.occupations {
            let key = normalize_title(&occ.title);
            if key.is_empty() {
                continue;
            }
            let g = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                Group::default()
            });
            g.match_sum += occ.match_score.clamp(0.0, 1.0);
            g.confidence_sum += occ.confidence.clamp(0.0, 1.0);
            g.entries += 1;
            if !g.providers.iter().any(|p| p == name) {
                g.providers.push(name.to_string());
            }
            g.merged = Some(match g.merged.take() {
                None => occ.clone(),
                Some(prev) => merge_pair(prev, occ),
            });
        }
    }

    let mut merged: Vec<CoordinatedOccupation> = order
        .into_iter()
        .filter_map(|k| groups.remove(&k))
        .filter_map(|g| {
            let mut occ = g.merged?;
            let n = g.entries.max(1) as f32;
            let avg_match = g.match_sum / n;
            let avg_conf = g.confidence_sum / n;
            occ.match_score = avg_match;
            occ.confidence = avg_conf;
            Some(CoordinatedOccupation {
                consensus_score: consensus_score(avg_match, avg_conf, g.providers.len(), providers_queried),
                occupation: occ,
                providers: g.providers,
                avg_match_score: avg_match,
                avg_confidence: avg_conf,
            })
        })
        .collect();

    merged.sort_by(|a, b| {
        b.consensus_score
            .total_cmp(&a.consensus_score)
            .then(b.avg_match_score.total_cmp(&a.avg_match_score))
    });
    merged.truncate(top_n);
    out.occupations = merged;
    out
}

/// Last match wins for scalar display fields; collections are unioned.
fn merge_pair(mut prev: StandardOccupation, next: &StandardOccupation) -> StandardOccupation {
    if !next.code.is_empty() {
        prev.code = next.code.clone();
    }
    if !next.title.is_empty() {
        prev.title = next.title.clone();
    }
    if !next.description.is_empty() {
        prev.description = next.description.clone();
    }
    prev.provider = next.provider.clone();
    union_into(&mut prev.skills, &next.skills);
    union_into(&mut prev.tools, &next.tools);
    union_into(&mut prev.technologies, &next.technologies);
    union_into(&mut prev.matched_skills, &next.matched_skills);
    for wa in &next.work_activities {
        match prev
            .work_activities
            .iter_mut()
            .find(|x| x.description.eq_ignore_ascii_case(&wa.description))
        {
            Some(existing) => existing.importance = existing.importance.max(wa.importance),
            None => prev.work_activities.push(wa.clone()),
        }
    }
    prev
}

fn unmapped(skills: &[ExtractedSkill], occupations: &[CoordinatedOccupation]) -> Vec<String> {
    skills
        .iter()
        .filter(|s| {
            !occupations.iter().any(|o| {
                o.occupation
                    .matched_skills
                    .iter()
                    .chain(o.occupation.skills.iter())
                    .any(|m| m.eq_ignore_ascii_case(&s.name))
            })
        })
        .map(|s| s.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(title: &str, provider: &str, m: f32, c: f32) -> StandardOccupation {
        StandardOccupation {
            code: "17-2141.00".into(),
            title: title.into(),
            description: String::new(),
            match_score: m,
            confidence: c,
            skills: vec![],
            work_activities: vec![],
            tools: vec![],
            technologies: vec![],
            matched_skills: vec![],
            provider: provider.into(),
        }
    }

    #[test]
    fn consensus_rises_with_agreement() {
        let one = consensus_score(0.6, 0.7, 1, 3);
        let two = consensus_score(0.6, 0.7, 2, 3);
        let three = consensus_score(0.6, 0.7, 3, 3);
        assert!(one < two && two < three);
        assert!((three - (0.24 + 0.21 + 0.3)).abs() < 1e-6);
    }

    #[test]
    fn merge_groups_by_normalized_title_and_unions_collections() {
        let mut a = occ("Mechanical Engineers", "a", 0.8, 0.9);
        a.tools = vec!["ANSYS".into()];
        let mut b = occ("mechanical engineers", "b", 0.6, 0.7);
        b.tools = vec!["ansys".into(), "SolidWorks".into()];
        b.description = "Design machines".into();

        let successes = vec![
            ("a", OccupationMappingResult { occupations: vec![a], ..Default::default() }),
            ("b", OccupationMappingResult { occupations: vec![b], ..Default::default() }),
        ];
        let r = merge_results(&successes, 2, 10);
        assert_eq!(r.occupations.len(), 1);
        let c = &r.occupations[0];
        assert_eq!(c.providers, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(c.occupation.tools, vec!["ANSYS".to_string(), "SolidWorks".to_string()]);
        // last match wins for scalars
        assert_eq!(c.occupation.title, "mechanical engineers");
        assert_eq!(c.occupation.provider, "b");
        assert!((c.avg_match_score - 0.7).abs() < 1e-6);
    }
}
