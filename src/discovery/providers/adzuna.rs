// src/discovery/providers/adzuna.rs
//! Adzuna job search, grouped by employer. Each employer with at least one
//! open role becomes a candidate carrying those roles as job postings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::AdzunaConfig;
use crate::discovery::providers::{has_secret, DiscoveryProvider};
use crate::discovery::{normalize_company_name, DiscoveredCompany, JobPosting, SearchFilter};
use crate::error::{ProviderError, ProviderResult};
use crate::http;

const PROVIDER: &str = "adzuna";
const MAX_PAGE: usize = 50;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<AdzunaJob>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AdzunaJob {
    title: Option<String>,
    description: Option<String>,
    redirect_url: Option<String>,
    created: Option<String>,
    company: Option<Named>,
    location: Option<Named>,
    category: Option<Category>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Named {
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Category {
    label: Option<String>,
}

/// "Engineering Jobs" → "Engineering".
fn industry_from_category(label: &str) -> String {
    label.trim().trim_end_matches(" Jobs").trim().to_string()
}

/// Titles may contain `<strong>` highlight tags and entities.
fn clean_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    decoded.replace("<strong>", "").replace("</strong>", "").trim().to_string()
}

fn group_by_employer(jobs: Vec<AdzunaJob>) -> Vec<DiscoveredCompany> {
    let mut out: Vec<DiscoveredCompany> = Vec::new();
    for j in jobs {
        let Some(employer) = j
            .company
            .and_then(|c| c.display_name)
            .map(|n| clean_text(&n))
            .filter(|n| !n.is_empty())
        else {
            continue;
        };
        let location = j.location.and_then(|l| l.display_name).map(|l| clean_text(&l));
        let posting = j.title.map(|t| JobPosting {
            title: clean_text(&t),
            location: location.clone(),
            url: j.redirect_url,
            posted_at: j
                .created
                .as_deref()
                .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
                .map(|d| d.with_timezone(&Utc)),
        });

        let norm = normalize_company_name(&employer);
        let idx = match out.iter().position(|c| normalize_company_name(&c.name) == norm) {
            Some(i) => i,
            None => {
                let mut c = DiscoveredCompany::new(employer, PROVIDER);
                c.location = location;
                c.industry = j
                    .category
                    .and_then(|c| c.label)
                    .map(|l| industry_from_category(&l))
                    .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("unknown"));
                c.description = j.description.map(|d| clean_text(&d));
                out.push(c);
                out.len() - 1
            }
        };
        if let Some(p) = posting {
            out[idx].job_postings.push(p);
        }
    }
    out
}

pub struct AdzunaProvider {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_key: String,
    country_code: String,
    enabled: bool,
    timeout_secs: u64,
}

impl AdzunaProvider {
    pub fn new(cfg: &AdzunaConfig, timeout_secs: u64) -> Self {
        Self {
            http: http::client(timeout_secs),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            app_id: cfg.app_id.trim().to_string(),
            app_key: cfg.app_key.trim().to_string(),
            country_code: cfg.country_code.trim().to_lowercase(),
            enabled: cfg.enabled,
            timeout_secs,
        }
    }

    fn query(&self, filter: &SearchFilter) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("app_id", self.app_id.clone()),
            ("app_key", self.app_key.clone()),
            ("results_per_page", filter.page_size.clamp(1, MAX_PAGE).to_string()),
            ("content-type", "application/json".to_string()),
        ];
        if !filter.industry_keywords.is_empty() {
            q.push(("what_or", filter.industry_keywords.join(" ")));
        }
        if let Some(loc) = filter.locations.first().filter(|l| !l.trim().is_empty()) {
            q.push(("where", loc.clone()));
        }
        q
    }
}

#[async_trait]
impl DiscoveryProvider for AdzunaProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn is_configured(&self) -> bool {
        self.enabled && has_secret(&self.app_id) && has_secret(&self.app_key)
    }

    async fn search_organizations(&self, filter: &SearchFilter) -> ProviderResult<Vec<DiscoveredCompany>> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured { provider: PROVIDER });
        }
        let url = format!("{}/jobs/{}/search/1", self.base_url, self.country_code);
        let resp: SearchResponse = http::send_json(
            PROVIDER,
            self.timeout_secs,
            self.http.get(url).query(&self.query(filter)),
        )
        .await?;
        Ok(group_by_employer(resp.results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_group_under_one_employer() {
        let body = r#"{"results":[
            {"title":"<strong>Mechanical</strong> Engineer","redirect_url":"https://a/1",
             "created":"2025-01-10T08:00:00Z",
             "company":{"display_name":"Hill Country HVAC"},
             "location":{"display_name":"Austin, Travis County"},
             "category":{"label":"Engineering Jobs"}},
            {"title":"Thermal Analyst","company":{"display_name":"Hill Country HVAC LLC"},
             "location":{"display_name":"Austin, Travis County"}},
            {"title":"Orphan role"},
            {"title":"Test Tech","company":{"display_name":"Bluebonnet Labs"},
             "category":{"label":"Unknown"}}
        ]}"#;
        let resp: SearchResponse = http::decode(PROVIDER, body).unwrap();
        let out = group_by_employer(resp.results);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "Hill Country HVAC");
        assert_eq!(out[0].industry.as_deref(), Some("Engineering"));
        assert_eq!(out[0].job_titles(), vec!["Mechanical Engineer", "Thermal Analyst"]);
        assert!(out[0].job_postings[0].posted_at.is_some());
        assert_eq!(out[1].industry, None);
    }

    #[test]
    fn query_omits_keywords_for_location_only_searches() {
        let cfg = AdzunaConfig {
            app_id: "id".into(),
            app_key: "key".into(),
            ..Default::default()
        };
        let p = AdzunaProvider::new(&cfg, 5);
        assert!(p.is_configured());
        let f = SearchFilter {
            locations: vec!["Texas".into()],
            page_size: 500,
            ..Default::default()
        };
        let q = p.query(&f);
        assert!(q.iter().all(|(k, _)| *k != "what_or"));
        assert!(q.contains(&("results_per_page", "50".to_string())));
        assert!(q.contains(&("where", "Texas".to_string())));
    }
}
