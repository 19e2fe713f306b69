// src/occupations/providers/esco.rs
//! ESCO (European Skills, Competences, Qualifications and Occupations) provider.
//! ESCO occupations carry ISCO-08 codes; they are crosswalked to SOC major
//! groups so downstream classification sees a single code system.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;

use crate::clock::{SharedClock, TtlCache};
use crate::config::{OccupationsConfig, RemoteProviderConfig};
use crate::error::{ProviderError, ProviderResult};
use crate::http;
use crate::occupations::{OccupationMappingResult, OccupationProvider, StandardOccupation};
use crate::skills::ExtractedSkill;

const PROVIDER: &str = "esco";
const ESCO_CONFIDENCE: f32 = 0.8;
const HITS_PER_SKILL: usize = 10;
const DETAIL_LIMIT: usize = 5;
const MAX_ESSENTIAL_SKILLS: usize = 15;

/* ----------------------------
Shield records (ESCO payloads)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    #[serde(rename = "_embedded", default)]
    embedded: SearchEmbedded,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SearchEmbedded {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchHit {
    uri: String,
    title: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OccupationResource {
    #[serde(default)]
    code: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: HashMap<String, Literal>,
    #[serde(rename = "_links", default)]
    links: ResourceLinks,
}

#[derive(Debug, Clone, Deserialize)]
struct Literal {
    #[serde(default)]
    literal: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ResourceLinks {
    #[serde(rename = "hasEssentialSkill", default)]
    essential: Vec<LinkedTitle>,
}

#[derive(Debug, Clone, Deserialize)]
struct LinkedTitle {
    title: String,
}

#[derive(Debug, Clone, Default)]
struct ResourceDetail {
    soc_code: Option<String>,
    title: String,
    description: String,
    skills: Vec<String>,
}

impl From<OccupationResource> for ResourceDetail {
    fn from(r: OccupationResource) -> Self {
        Self {
            soc_code: isco_to_soc(&r.code),
            title: r.title,
            description: r
                .description
                .get("en")
                .map(|l| l.literal.clone())
                .unwrap_or_default(),
            skills: r
                .links
                .essential
                .into_iter()
                .take(MAX_ESSENTIAL_SKILLS)
                .map(|l| l.title)
                .collect(),
        }
    }
}

/* ----------------------------
ISCO-08 → SOC crosswalk
---------------------------- */

/// (ISCO prefix, SOC major). Longest prefix wins.
const ISCO_SOC: &[(&str, &str)] = &[
    ("0", "55"),
    ("1", "11"),
    ("211", "19"),
    ("212", "15"),
    ("213", "19"),
    ("214", "17"),
    ("215", "17"),
    ("216", "17"),
    ("22", "29"),
    ("23", "25"),
    ("24", "13"),
    ("25", "15"),
    ("261", "23"),
    ("262", "25"),
    ("263", "19"),
    ("264", "27"),
    ("265", "27"),
    ("2", "19"),
    ("31", "17"),
    ("32", "29"),
    ("33", "13"),
    ("34", "27"),
    ("35", "15"),
    ("4", "43"),
    ("5", "41"),
    ("6", "45"),
    ("7", "47"),
    ("8", "51"),
    ("9", "53"),
];

/// "2144.1" → "17-2144". `None` for codes without a leading digit.
pub fn isco_to_soc(isco: &str) -> Option<String> {
    let digits: String = isco
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .take(4)
        .collect();
    if digits.is_empty() {
        return None;
    }
    let major = ISCO_SOC
        .iter()
        .filter(|(prefix, _)| digits.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, soc)| *soc)?;
    Some(format!("{major}-{digits}"))
}

fn title_case(s: &str) -> String {
    crate::skills::normalize_skill_name(s)
}

pub struct EscoProvider {
    http: reqwest::Client,
    base_url: String,
    enabled: bool,
    priority: f32,
    timeout_secs: u64,
    top_n: usize,
    max_skills: usize,
    search_cache: TtlCache<String, Vec<SearchHit>>,
    resource_cache: TtlCache<String, ResourceDetail>,
}

impl EscoProvider {
    pub fn new(cfg: &RemoteProviderConfig, occ: &OccupationsConfig, clock: SharedClock) -> Self {
        Self {
            http: http::client(occ.per_call_timeout_secs),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            enabled: cfg.enabled,
            priority: cfg.priority,
            timeout_secs: occ.per_call_timeout_secs,
            top_n: occ.top_n.max(1),
            max_skills: occ.max_skills_per_query.max(1),
            search_cache: TtlCache::new(occ.cache_ttl_secs, clock.clone()),
            resource_cache: TtlCache::new(occ.cache_ttl_secs, clock),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn search(&self, text: &str, api_calls: &mut u32, cache_hits: &mut u32) -> ProviderResult<Vec<SearchHit>> {
        let key = text.to_lowercase();
        if let Some(hits) = self.search_cache.get(&key) {
            *cache_hits += 1;
            return Ok(hits);
        }
        *api_calls += 1;
        let limit = HITS_PER_SKILL.to_string();
        let resp: SearchResponse = http::send_json(
            PROVIDER,
            self.timeout_secs,
            self.get("/search").query(&[
                ("text", text),
                ("type", "occupation"),
                ("language", "en"),
                ("limit", limit.as_str()),
            ]),
        )
        .await?;
        self.search_cache.insert(key, resp.embedded.results.clone());
        Ok(resp.embedded.results)
    }

    async fn resource(&self, uri: &str, api_calls: &mut u32, cache_hits: &mut u32) -> Option<ResourceDetail> {
        if let Some(d) = self.resource_cache.get(&uri.to_string()) {
            *cache_hits += 1;
            return Some(d);
        }
        *api_calls += 1;
        let res = http::send_json::<OccupationResource>(
            PROVIDER,
            self.timeout_secs,
            self.get("/resource/occupation")
                .query(&[("uri", uri), ("language", "en")]),
        )
        .await;
        match res {
            Ok(r) => {
                let d = ResourceDetail::from(r);
                self.resource_cache.insert(uri.to_string(), d.clone());
                Some(d)
            }
            Err(e) => {
                tracing::debug!(provider = PROVIDER, uri, error = %e, "occupation resource failed");
                None
            }
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    title: String,
    weight: f32,
    matched: Vec<String>,
}

#[async_trait]
impl OccupationProvider for EscoProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn priority(&self) -> f32 {
        self.priority
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// ESCO is a public API; only the base URL is required.
    fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    async fn health_check(&self) -> bool {
        http::probe(
            self.get("/search")
                .query(&[("text", "engineer"), ("type", "occupation"), ("limit", "1")]),
        )
        .await
    }

    async fn map_skills_to_occupations(
        &self,
        skills: &[ExtractedSkill],
    ) -> ProviderResult<OccupationMappingResult> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured { provider: PROVIDER });
        }
        let t0 = Instant::now();
        let (mut api_calls, mut cache_hits) = (0u32, 0u32);

        let mut queried: Vec<&ExtractedSkill> = skills.iter().collect();
        queried.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        queried.truncate(self.max_skills);
        if queried.is_empty() {
            return Ok(OccupationMappingResult::default());
        }

        let mut order: Vec<String> = Vec::new();
        let mut tallies: HashMap<String, Tally> = HashMap::new();
        let mut total_weight = 0.0f32;
        let mut last_err = None;
        let mut any_ok = false;
        let mut unmapped = Vec::new();

        for skill in &queried {
            total_weight += skill.confidence.max(0.0);
            let hits = match self.search(&skill.name, &mut api_calls, &mut cache_hits).await {
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
                let t = tallies.entry(hit.uri.clone()).or_insert_with(|| {
                    order.push(hit.uri.clone());
                    Tally {
                        title: hit.title.clone(),
                        ..Default::default()
                    }
                });
                t.weight += skill.confidence.max(0.0) / (1.0 + rank as f32 * 0.25);
                if !t.matched.contains(&skill.name) {
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
            .filter_map(|uri| tallies.remove(&uri).map(|t| (uri, t)))
            .collect();
        ranked.sort_by(|a, b| b.1.weight.total_cmp(&a.1.weight));
        ranked.truncate(self.top_n);

        let mut occupations = Vec::with_capacity(ranked.len());
        for (i, (uri, tally)) in ranked.into_iter().enumerate() {
            // Without a resolvable code the record cannot be classified.
            let detail = if i < DETAIL_LIMIT {
                self.resource(&uri, &mut api_calls, &mut cache_hits).await
            } else {
                None
            };
            let Some(detail) = detail else { continue };
            let Some(code) = detail.soc_code.clone() else { continue };
            occupations.push(StandardOccupation {
                code,
                title: title_case(if detail.title.is_empty() { &tally.title } else { &detail.title }),
                description: detail.description,
                match_score: if total_weight > 0.0 {
                    (tally.weight / total_weight).clamp(0.0, 1.0)
                } else {
                    0.0
                },
                confidence: ESCO_CONFIDENCE,
                skills: detail.skills.iter().map(|s| title_case(s)).collect(),
                work_activities: Vec::new(),
                tools: Vec::new(),
                technologies: Vec::new(),
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
            api_calls,
            cache_hits,
            processing_time_ms: t0.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::decode;

    #[test]
    fn crosswalk_uses_longest_prefix() {
        assert_eq!(isco_to_soc("2144.1").as_deref(), Some("17-2144"));
        assert_eq!(isco_to_soc("2512").as_deref(), Some("15-2512"));
        assert_eq!(isco_to_soc("2221.3").as_deref(), Some("29-2221"));
        assert_eq!(isco_to_soc("1213").as_deref(), Some("11-1213"));
        assert_eq!(isco_to_soc("2611").as_deref(), Some("23-2611"));
        assert_eq!(isco_to_soc("abc"), None);
    }

    #[test]
    fn resource_payload_normalizes() {
        let body = r#"{
            "className":"Occupation",
            "uri":"http://data.europa.eu/esco/occupation/abc",
            "code":"2144.1",
            "title":"mechanical engineer",
            "description":{"en":{"literal":"Mechanical engineers research, plan and design mechanical products.","mimetype":"plain/text"}},
            "_links":{"hasEssentialSkill":[{"href":"h","title":"thermodynamics"},{"href":"i","title":"engineering principles"}]}
        }"#;
        let r: OccupationResource = decode(PROVIDER, body).unwrap();
        let d = ResourceDetail::from(r);
        assert_eq!(d.soc_code.as_deref(), Some("17-2144"));
        assert!(d.description.starts_with("Mechanical engineers"));
        assert_eq!(d.skills, vec!["thermodynamics", "engineering principles"]);
    }

    #[test]
    fn search_payload_tolerates_missing_embedded() {
        let r: SearchResponse = decode(PROVIDER, "{}").unwrap();
        assert!(r.embedded.results.is_empty());
    }
}
