// src/occupations/providers/onet.rs
//! O*NET Web Services provider: keyword search per skill, then detail,
//! work-activity and technology lookups for the best-scoring codes.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;

use crate::clock::{SharedClock, TtlCache};
use crate::config::{OccupationsConfig, RemoteProviderConfig};
use crate::error::{ProviderError, ProviderResult};
use crate::http;
use crate::occupations::{OccupationMappingResult, OccupationProvider, StandardOccupation, WorkActivity};
use crate::skills::{skill_key, ExtractedSkill};

const PROVIDER: &str = "onet";
const ONET_CONFIDENCE: f32 = 0.9;
const HITS_PER_SKILL: usize = 10;
/// Codes that get the detail/activity/technology follow-up calls.
const DETAIL_LIMIT: usize = 5;

/* ----------------------------
Shield records (O*NET payloads)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    occupation: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchHit {
    code: String,
    title: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OccupationResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WorkActivitiesResponse {
    #[serde(default)]
    element: Vec<ActivityElement>,
}

#[derive(Debug, Clone, Deserialize)]
struct ActivityElement {
    name: String,
    #[serde(default)]
    importance: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExampleListResponse {
    #[serde(default)]
    category: Vec<ExampleCategory>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExampleCategory {
    #[serde(default)]
    title: String,
    #[serde(default)]
    example: Vec<Example>,
}

#[derive(Debug, Clone, Deserialize)]
struct Example {
    title: String,
}

/// Normalized detail payload kept in the per-code cache.
#[derive(Debug, Clone, Default)]
struct OccupationDetail {
    title: String,
    description: String,
    work_activities: Vec<WorkActivity>,
    technologies: Vec<String>,
    tools: Vec<String>,
}

/// O*NET reports importance either 1..5 or 0..100.
fn scale_importance(raw: Option<f32>) -> f32 {
    match raw {
        None => 0.5,
        Some(v) if v > 5.0 => (v / 100.0).clamp(0.0, 1.0),
        Some(v) => ((v - 1.0) / 4.0).clamp(0.0, 1.0),
    }
}

fn flatten_examples(r: ExampleListResponse) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for c in r.category {
        if c.example.is_empty() && !c.title.is_empty() {
            out.push(c.title);
            continue;
        }
        for e in c.example {
            if !out.iter().any(|x| x.eq_ignore_ascii_case(&e.title)) {
                out.push(e.title);
            }
        }
    }
    out
}

/// Rank-decayed hit weight; the first hit counts fully.
fn rank_weight(rank: usize) -> f32 {
    1.0 / (1.0 + rank as f32 * 0.25)
}

pub struct OnetProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    enabled: bool,
    priority: f32,
    timeout_secs: u64,
    top_n: usize,
    max_skills: usize,
    search_cache: TtlCache<String, Vec<SearchHit>>,
    detail_cache: TtlCache<String, OccupationDetail>,
}

impl OnetProvider {
    pub fn new(cfg: &RemoteProviderConfig, occ: &OccupationsConfig, clock: SharedClock) -> Self {
        Self {
            http: http::client(occ.per_call_timeout_secs),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.trim().to_string(),
            enabled: cfg.enabled,
            priority: cfg.priority,
            timeout_secs: occ.per_call_timeout_secs,
            top_n: occ.top_n.max(1),
            max_skills: occ.max_skills_per_query.max(1),
            search_cache: TtlCache::new(occ.cache_ttl_secs, clock.clone()),
            detail_cache: TtlCache::new(occ.cache_ttl_secs, clock),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header("X-API-Key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn search(&self, keyword: &str, stats: &mut Stats) -> ProviderResult<Vec<SearchHit>> {
        let key = keyword.to_lowercase();
        if let Some(hit) = self.search_cache.get(&key) {
            stats.cache_hits += 1;
            return Ok(hit);
        }
        stats.api_calls += 1;
        let end = HITS_PER_SKILL.to_string();
        let resp: SearchResponse = http::send_json(
            PROVIDER,
            self.timeout_secs,
            self.get("/online/search").query(&[("keyword", keyword), ("end", end.as_str())]),
        )
        .await?;
        self.search_cache.insert(key, resp.occupation.clone());
        Ok(resp.occupation)
    }

    /// Detail lookups are best-effort; a failed sub-call leaves that part empty.
    async fn detail(&self, code: &str, stats: &mut Stats) -> OccupationDetail {
        if let Some(d) = self.detail_cache.get(&code.to_string()) {
            stats.cache_hits += 1;
            return d;
        }
        let base = format!("/online/occupations/{code}");
        let mut d = OccupationDetail::default();

        stats.api_calls += 1;
        match http::send_json::<OccupationResponse>(PROVIDER, self.timeout_secs, self.get(&base)).await {
            Ok(r) => {
                d.title = r.title;
                d.description = r.description;
            }
            Err(e) => tracing::debug!(provider = PROVIDER, code, error = %e, "occupation detail failed"),
        }

        stats.api_calls += 1;
        match http::send_json::<WorkActivitiesResponse>(
            PROVIDER,
            self.timeout_secs,
            self.get(&format!("{base}/summary/work_activities")),
        )
        .await
        {
            Ok(r) => {
                d.work_activities = r
                    .element
                    .into_iter()
                    .map(|e| WorkActivity {
                        description: e.name,
                        importance: scale_importance(e.importance),
                    })
                    .collect();
            }
            Err(e) => tracing::debug!(provider = PROVIDER, code, error = %e, "work activities failed"),
        }

        stats.api_calls += 1;
        match http::send_json::<ExampleListResponse>(
            PROVIDER,
            self.timeout_secs,
            self.get(&format!("{base}/summary/technology_skills")),
        )
        .await
        {
            Ok(r) => d.technologies = flatten_examples(r),
            Err(e) => tracing::debug!(provider = PROVIDER, code, error = %e, "technology skills failed"),
        }

        stats.api_calls += 1;
        match http::send_json::<ExampleListResponse>(
            PROVIDER,
            self.timeout_secs,
            self.get(&format!("{base}/summary/tools_used")),
        )
        .await
        {
            Ok(r) => d.tools = flatten_examples(r),
            Err(e) => tracing::debug!(provider = PROVIDER, code, error = %e, "tools failed"),
        }

        self.detail_cache.insert(code.to_string(), d.clone());
        d
    }
}

#[derive(Debug, Default)]
struct Stats {
    api_calls: u32,
    cache_hits: u32,
}

#[derive(Debug, Default)]
struct Tally {
    title: String,
    weight: f32,
    matched: Vec<String>,
}

#[async_trait]
impl OccupationProvider for OnetProvider {
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
        !self.api_key.is_empty() && !self.base_url.is_empty()
    }

    async fn health_check(&self) -> bool {
        http::probe(self.get("/about/")).await
    }

    async fn map_skills_to_occupations(
        &self,
        skills: &[ExtractedSkill],
    ) -> ProviderResult<OccupationMappingResult> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured { provider: PROVIDER });
        }
        let t0 = Instant::now();
        let mut stats = Stats::default();

        let mut queried: Vec<&ExtractedSkill> = skills.iter().collect();
        queried.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        queried.truncate(self.max_skills);
        if queried.is_empty() {
            return Ok(OccupationMappingResult::default());
        }

        let mut order: Vec<String> = Vec::new();
        let mut tallies: HashMap<String, Tally> = HashMap::new();
        let mut total_weight = 0.0f32;
        let mut last_err: Option<ProviderError> = None;
        let mut any_ok = false;
        let mut unmapped = Vec::new();

        for skill in &queried {
            total_weight += skill.confidence.max(0.0);
            let hits = match self.search(&skill.name, &mut stats).await {
                Ok(h) => {
                    any_ok = true;
                    h
                }
                Err(e) => {
                    tracing::debug!(provider = PROVIDER, skill = %skill.name, error = %e, "search failed");
                    last_err = Some(e);
                    continue;
                }
            };
            if hits.is_empty() {
                unmapped.push(skill.name.clone());
            }
            for (rank, hit) in hits.into_iter().take(HITS_PER_SKILL).enumerate() {
                let t = tallies.entry(hit.code.clone()).or_insert_with(|| {
                    order.push(hit.code.clone());
                    Tally {
                        title: hit.title.clone(),
                        ..Default::default()
                    }
                });
                t.weight += skill.confidence.max(0.0) * rank_weight(rank);
                if !t.matched.iter().any(|m| skill_key(m) == skill_key(&skill.name)) {
                    t.matched.push(skill.name.clone());
                }
            }
        }

        if !any_ok {
            return Err(last_err.unwrap_or(ProviderError::Malformed {
                provider: PROVIDER,
                message: "every search failed".into(),
            }));
        }

        let mut ranked: Vec<(String, Tally)> = order
            .into_iter()
            .filter_map(|code| tallies.remove(&code).map(|t| (code, t)))
            .collect();
        ranked.sort_by(|a, b| b.1.weight.total_cmp(&a.1.weight));
        ranked.truncate(self.top_n);

        let mut occupations = Vec::with_capacity(ranked.len());
        for (i, (code, tally)) in ranked.into_iter().enumerate() {
            let detail = if i < DETAIL_LIMIT {
                self.detail(&code, &mut stats).await
            } else {
                OccupationDetail::default()
            };
            let match_score = if total_weight > 0.0 {
                (tally.weight / total_weight).clamp(0.0, 1.0)
            } else {
                0.0
            };
            occupations.push(StandardOccupation {
                code,
                title: if detail.title.is_empty() { tally.title } else { detail.title },
                description: detail.description,
                match_score,
                confidence: ONET_CONFIDENCE,
                skills: Vec::new(),
                work_activities: detail.work_activities,
                tools: detail.tools,
                technologies: detail.technologies,
                matched_skills: tally.matched,
                provider: PROVIDER.to_string(),
            });
        }

        unmapped.extend(
            skills
                .iter()
                .filter(|s| !queried.iter().any(|q| std::ptr::eq(*q, *s)))
                .map(|s| s.name.clone()),
        );

        Ok(OccupationMappingResult {
            occupations,
            unmapped_skills: unmapped,
            api_calls: stats.api_calls,
            cache_hits: stats.cache_hits,
            processing_time_ms: t0.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::decode;

    #[test]
    fn search_payload_is_shielded() {
        let body = r#"{"keyword":"heat transfer","start":1,"end":2,"total":2,
            "occupation":[
              {"href":"x","code":"17-2141.00","title":"Mechanical Engineers","tags":{"bright_outlook":true}},
              {"href":"y","code":"17-3027.00","title":"Mechanical Engineering Technologists and Technicians"}
            ]}"#;
        let r: SearchResponse = decode(PROVIDER, body).unwrap();
        assert_eq!(r.occupation.len(), 2);
        assert_eq!(r.occupation[0].code, "17-2141.00");
    }

    #[test]
    fn technology_examples_flatten_and_dedup() {
        let body = r#"{"category":[
            {"title":"Analytical software","example":[{"title":"MATLAB"},{"title":"ANSYS"}]},
            {"title":"CAD software","example":[{"title":"matlab"},{"title":"SolidWorks"}]},
            {"title":"Spreadsheet software"}
        ]}"#;
        let r: ExampleListResponse = decode(PROVIDER, body).unwrap();
        assert_eq!(
            flatten_examples(r),
            vec!["MATLAB", "ANSYS", "SolidWorks", "Spreadsheet software"]
        );
    }

    #[test]
    fn importance_scales_into_unit_range() {
        assert!((scale_importance(Some(5.0)) - 1.0).abs() < 1e-6);
        assert!((scale_importance(Some(1.0))).abs() < 1e-6);
        assert!((scale_importance(Some(85.0)) - 0.85).abs() < 1e-6);
        assert!((scale_importance(None) - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let cfg = RemoteProviderConfig {
            enabled: true,
            priority: 1.0,
            base_url: "http://127.0.0.1:9".into(),
            api_key: String::new(),
        };
        let p = OnetProvider::new(&cfg, &OccupationsConfig::default(), crate::clock::system_clock());
        assert!(!p.is_configured());
        let err = p.map_skills_to_occupations(&[]).await.unwrap_err();
        assert_eq!(err, ProviderError::NotConfigured { provider: PROVIDER });
    }
}
