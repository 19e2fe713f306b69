// src/discovery/providers/apollo.rs
//! Apollo.io: organization search, people search and job postings.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ApolloConfig;
use crate::discovery::providers::{has_secret, DiscoveryProvider};
use crate::discovery::{Contact, DiscoveredCompany, FundingInfo, JobPosting, SearchFilter};
use crate::error::{ProviderError, ProviderResult};
use crate::http;

const PROVIDER: &str = "apollo";
const CONTACTS_PER_COMPANY: usize = 5;

/* ----------------------------
Shield records (Apollo payloads)
---------------------------- */

#[derive(Debug, Serialize)]
struct OrganizationSearch<'a> {
    organization_locations: &'a [String],
    q_organization_keyword_tags: &'a [String],
    organization_num_employees_ranges: &'a [String],
    page: u32,
    per_page: usize,
}

#[derive(Debug, Deserialize)]
struct OrganizationSearchResponse {
    #[serde(default)]
    organizations: Vec<Organization>,
    #[serde(default)]
    accounts: Vec<Organization>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Organization {
    id: Option<String>,
    name: Option<String>,
    website_url: Option<String>,
    primary_domain: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    industry: Option<String>,
    keywords: Vec<String>,
    estimated_num_employees: Option<u32>,
    short_description: Option<String>,
    technology_names: Vec<String>,
    total_funding: Option<f64>,
    latest_funding_stage: Option<String>,
    latest_funding_round_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct PeopleSearch<'a> {
    organization_ids: [&'a str; 1],
    person_titles: &'a [String],
    per_page: usize,
}

#[derive(Debug, Deserialize)]
struct PeopleSearchResponse {
    #[serde(default)]
    people: Vec<Person>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Person {
    name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    title: Option<String>,
    email: Option<String>,
    linkedin_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobPostingsResponse {
    #[serde(default)]
    organization_job_postings: Vec<ApolloJob>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApolloJob {
    title: Option<String>,
    city: Option<String>,
    state: Option<String>,
    url: Option<String>,
    posted_at: Option<String>,
}

fn join_location(parts: &[Option<&str>]) -> Option<String> {
    let joined: Vec<&str> = parts
        .iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    (!joined.is_empty()).then(|| joined.join(", "))
}

/// RFC 3339 or a bare `YYYY-MM-DD`.
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|n| n.and_utc())
}

fn to_company(o: Organization) -> Option<DiscoveredCompany> {
    let name = o.name.filter(|n| !n.trim().is_empty())?;
    let mut c = DiscoveredCompany::new(name.trim(), PROVIDER);
    c.external_id = o.id;
    c.website = o.website_url.or(o.primary_domain);
    c.location = join_location(&[o.city.as_deref(), o.state.as_deref(), o.country.as_deref()]);
    c.industry = o.industry;
    c.sector_keywords = o.keywords;
    c.employee_count = o.estimated_num_employees;
    c.description = o.short_description.map(|d| html_escape::decode_html_entities(&d).to_string());
    c.technologies = o.technology_names;
    if o.total_funding.is_some() || o.latest_funding_stage.is_some() {
        c.funding = Some(FundingInfo {
            total_raised_usd: o.total_funding,
            latest_round: o.latest_funding_stage,
            latest_round_usd: None,
            latest_round_at: o.latest_funding_round_date.as_deref().and_then(parse_date),
        });
    }
    Some(c)
}

fn to_contact(p: Person) -> Option<Contact> {
    let name = p
        .name
        .or_else(|| {
            let parts: Vec<&str> = [p.first_name.as_deref(), p.last_name.as_deref()]
                .into_iter()
                .flatten()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        })
        .filter(|n| !n.trim().is_empty())?;
    Some(Contact {
        name,
        title: p.title,
        email: p.email.filter(|e| e.contains('@')),
        linkedin_url: p.linkedin_url,
    })
}

fn to_job(j: ApolloJob) -> Option<JobPosting> {
    let title = j.title.filter(|t| !t.trim().is_empty())?;
    Some(JobPosting {
        title,
        location: join_location(&[j.city.as_deref(), j.state.as_deref()]),
        url: j.url,
        posted_at: j.posted_at.as_deref().and_then(parse_date),
    })
}

pub struct ApolloProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    enabled: bool,
    timeout_secs: u64,
}

impl ApolloProvider {
    pub fn new(cfg: &ApolloConfig, timeout_secs: u64) -> Self {
        Self {
            http: http::client(timeout_secs),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.trim().to_string(),
            enabled: cfg.enabled,
            timeout_secs,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .header("X-Api-Key", &self.api_key)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
    }

    fn ensure_configured(&self) -> ProviderResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured { provider: PROVIDER })
        }
    }
}

#[async_trait]
impl DiscoveryProvider for ApolloProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn is_configured(&self) -> bool {
        self.enabled && has_secret(&self.api_key) && !self.base_url.is_empty()
    }

    async fn search_organizations(&self, filter: &SearchFilter) -> ProviderResult<Vec<DiscoveredCompany>> {
        self.ensure_configured()?;
        let body = OrganizationSearch {
            organization_locations: &filter.locations,
            q_organization_keyword_tags: &filter.industry_keywords,
            organization_num_employees_ranges: &filter.employee_ranges,
            page: 1,
            per_page: filter.page_size,
        };
        let resp: OrganizationSearchResponse = http::send_json(
            PROVIDER,
            self.timeout_secs,
            self.post("/mixed_companies/search").json(&body),
        )
        .await?;
        Ok(resp
            .organizations
            .into_iter()
            .chain(resp.accounts)
            .filter_map(to_company)
            .collect())
    }

    async fn find_contacts(
        &self,
        company: &DiscoveredCompany,
        filter: &SearchFilter,
    ) -> ProviderResult<Vec<Contact>> {
        self.ensure_configured()?;
        let Some(id) = company.external_id.as_deref().filter(|_| company.source == PROVIDER) else {
            return Ok(Vec::new());
        };
        let body = PeopleSearch {
            organization_ids: [id],
            person_titles: &filter.contact_titles,
            per_page: CONTACTS_PER_COMPANY,
        };
        let resp: PeopleSearchResponse = http::send_json(
            PROVIDER,
            self.timeout_secs,
            self.post("/mixed_people/search").json(&body),
        )
        .await?;
        Ok(resp.people.into_iter().filter_map(to_contact).collect())
    }

    async fn job_postings(&self, company: &DiscoveredCompany) -> ProviderResult<Vec<JobPosting>> {
        self.ensure_configured()?;
        let Some(id) = company.external_id.as_deref().filter(|_| company.source == PROVIDER) else {
            return Ok(Vec::new());
        };
        let resp: JobPostingsResponse = http::send_json(
            PROVIDER,
            self.timeout_secs,
            self.http
                .get(format!("{}/organizations/{id}/job_postings", self.base_url))
                .header("X-Api-Key", &self.api_key),
        )
        .await?;
        Ok(resp
            .organization_job_postings
            .into_iter()
            .filter_map(to_job)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organization_payload_maps_to_company() {
        let body = r#"{
            "organizations": [{
                "id": "5f1",
                "name": "Lone Star Thermal",
                "website_url": "http://www.lonestarthermal.com",
                "city": "Austin", "state": "Texas", "country": "United States",
                "industry": "mechanical or industrial engineering",
                "keywords": ["hvac", "heat exchangers"],
                "estimated_num_employees": 140,
                "short_description": "Heat exchangers &amp; chillers",
                "technology_names": ["SolidWorks"],
                "total_funding": 12000000,
                "latest_funding_stage": "Series A",
                "latest_funding_round_date": "2024-03-01T00:00:00.000+00:00"
            }, {"id": "nameless"}]
        }"#;
        let resp: OrganizationSearchResponse = http::decode(PROVIDER, body).unwrap();
        let out: Vec<DiscoveredCompany> = resp.organizations.into_iter().filter_map(to_company).collect();
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert_eq!(c.location.as_deref(), Some("Austin, Texas, United States"));
        assert_eq!(c.description.as_deref(), Some("Heat exchangers & chillers"));
        assert_eq!(c.key(), "lonestarthermal.com");
        let f = c.funding.as_ref().unwrap();
        assert_eq!(f.latest_round.as_deref(), Some("Series A"));
        assert!(f.latest_round_at.is_some());
    }

    #[test]
    fn people_without_any_name_are_skipped() {
        let body = r#"{"people":[
            {"first_name":"Dana","last_name":"Ortiz","title":"Director of Engineering","email":"email_not_unlocked"},
            {"title":"CTO"}
        ]}"#;
        let resp: PeopleSearchResponse = http::decode(PROVIDER, body).unwrap();
        let out: Vec<Contact> = resp.people.into_iter().filter_map(to_contact).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Dana Ortiz");
        assert_eq!(out[0].email, None);
    }

    #[test]
    fn dates_accept_rfc3339_and_plain_days() {
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("2024-03-01T12:00:00Z").is_some());
        assert!(parse_date("soon").is_none());
    }

    #[test]
    fn placeholder_key_is_not_configured() {
        let p = ApolloProvider::new(&ApolloConfig::default(), 5);
        assert!(!p.is_configured());
        let cfg = ApolloConfig {
            api_key: "k".into(),
            ..Default::default()
        };
        assert!(ApolloProvider::new(&cfg, 5).is_configured());
    }
}
