// src/discovery/enrich.rs
//! Dedup, enrichment and scoring of discovered candidates.
//!
//! Enrichment runs sequentially with a pacing delay between candidates so a
//! large pool never bursts the providers' rate limits.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use strsim::jaro_winkler;
use tokio::time::{sleep, timeout};

use crate::clock::SharedClock;
use crate::discovery::providers::DiscoveryProvider;
use crate::discovery::{
    normalize_company_name, BuyingIntent, Contact, DiscoveredCompany, EnrichmentLevel, JobPosting,
    SearchFilter,
};
use crate::store::SharedStore;
use crate::telemetry::{PipelineEvent, SharedTelemetry};

/// Jaro-Winkler floor for treating two same-location names as one company.
pub const NAME_SIMILARITY: f64 = 0.95;

/* ----------------------------
Dedup
---------------------------- */

fn same_location(a: &DiscoveredCompany, b: &DiscoveredCompany) -> bool {
    match (a.location.as_deref(), b.location.as_deref()) {
        (Some(x), Some(y)) => x.trim().eq_ignore_ascii_case(y.trim()),
        (None, None) => true,
        _ => false,
    }
}

fn is_duplicate(a: &DiscoveredCompany, b: &DiscoveredCompany) -> bool {
    if a.key() == b.key() {
        return true;
    }
    same_location(a, b)
        && jaro_winkler(&normalize_company_name(&a.name), &normalize_company_name(&b.name))
            >= NAME_SIMILARITY
}

fn push_unique<T, F: Fn(&T, &T) -> bool>(dst: &mut Vec<T>, src: Vec<T>, same: F) {
    for item in src {
        if !dst.iter().any(|x| same(x, &item)) {
            dst.push(item);
        }
    }
}

/// Fold `other` into `into`: first-seen scalars win, gaps are filled,
/// collections are unioned.
pub fn merge_duplicate(into: &mut DiscoveredCompany, other: DiscoveredCompany) {
    if into.website.is_none() {
        into.website = other.website;
    }
    if into.location.is_none() {
        into.location = other.location;
    }
    if into.industry.is_none() {
        into.industry = other.industry;
    }
    if into.employee_count.is_none() {
        into.employee_count = other.employee_count;
    }
    if into.description.is_none() {
        into.description = other.description;
    }
    if into.funding.is_none() {
        into.funding = other.funding;
    }
    if into.external_id.is_none() && into.source == other.source {
        into.external_id = other.external_id;
    }
    push_unique(&mut into.sector_keywords, other.sector_keywords, |a, b| a.eq_ignore_ascii_case(b));
    push_unique(&mut into.technologies, other.technologies, |a, b| a.eq_ignore_ascii_case(b));
    push_unique(&mut into.job_postings, other.job_postings, |a, b| {
        a.title.eq_ignore_ascii_case(&b.title) && a.location == b.location
    });
    push_unique(&mut into.contacts, other.contacts, same_contact);
}

fn same_contact(a: &Contact, b: &Contact) -> bool {
    match (a.email.as_deref(), b.email.as_deref()) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => a.name.eq_ignore_ascii_case(&b.name),
    }
}

/// Order-preserving dedup. Returns the survivors and how many were merged away.
pub fn dedup(companies: Vec<DiscoveredCompany>) -> (Vec<DiscoveredCompany>, usize) {
    let before = companies.len();
    let mut out: Vec<DiscoveredCompany> = Vec::with_capacity(before);
    for c in companies {
        match out.iter_mut().find(|x| is_duplicate(x, &c)) {
            Some(existing) => merge_duplicate(existing, c),
            None => out.push(c),
        }
    }
    let merged = before - out.len();
    (out, merged)
}

/* ----------------------------
Technology canonicalization
---------------------------- */

const TECH_ALIASES: &[(&[&str], &str)] = &[
    (&["react", "reactjs", "react.js"], "React"),
    (&["node", "nodejs", "node.js"], "Node.js"),
    (&["aws", "amazon web services"], "AWS"),
    (&["gcp", "google cloud", "google cloud platform"], "Google Cloud"),
    (&["azure", "microsoft azure"], "Azure"),
    (&["postgres", "postgresql"], "PostgreSQL"),
    (&["k8s", "kubernetes"], "Kubernetes"),
    (&["golang", "go"], "Go"),
    (&["excel", "ms excel", "microsoft excel"], "Excel"),
    (&["solidworks", "solid works"], "SolidWorks"),
    (&["autocad", "auto cad"], "AutoCAD"),
    (&["matlab"], "MATLAB"),
    (&["ansys", "ansys fluent"], "ANSYS"),
    (&["salesforce", "salesforce crm"], "Salesforce"),
    (&["tableau", "tableau software"], "Tableau"),
    (&["python"], "Python"),
];

pub fn canonical_technology(raw: &str) -> String {
    let t = raw.trim();
    let lower = t.to_lowercase();
    TECH_ALIASES
        .iter()
        .find(|(aliases, _)| aliases.contains(&lower.as_str()))
        .map(|(_, canon)| canon.to_string())
        .unwrap_or_else(|| t.to_string())
}

pub fn canonicalize_technologies(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for t in raw.iter().filter(|t| !t.trim().is_empty()) {
        let c = canonical_technology(t);
        if !out.iter().any(|x| x.eq_ignore_ascii_case(&c)) {
            out.push(c);
        }
    }
    out
}

/* ----------------------------
Scores
---------------------------- */

/// Funding recency and size, plus hiring activity. Hiring carries more weight.
pub fn buying_intent(c: &DiscoveredCompany, now: DateTime<Utc>) -> BuyingIntent {
    let funding_score = c.funding.as_ref().map_or(0.0, |f| {
        let recency = f.latest_round_at.map_or(0.0, |at| match (now - at).num_days() {
            d if d <= 180 => 1.0,
            d if d <= 365 => 0.7,
            d if d <= 730 => 0.4,
            _ => 0.1,
        });
        let size = f.total_raised_usd.or(f.latest_round_usd).map_or(0.0, |usd| match usd {
            x if x >= 50_000_000.0 => 1.0,
            x if x >= 10_000_000.0 => 0.8,
            x if x >= 1_000_000.0 => 0.5,
            x if x > 0.0 => 0.3,
            _ => 0.0,
        });
        0.6 * recency + 0.4 * size
    });
    let hiring_score = (c.job_postings.len() as f32 / 10.0).min(1.0);
    BuyingIntent {
        funding_score,
        hiring_score,
        overall: (0.4 * funding_score + 0.6 * hiring_score).clamp(0.0, 1.0),
    }
}

const COMPLETENESS_WEIGHTS: [(&str, f32); 10] = [
    ("name", 0.10),
    ("website", 0.15),
    ("location", 0.10),
    ("industry", 0.10),
    ("employee_count", 0.10),
    ("description", 0.10),
    ("technologies", 0.10),
    ("contacts", 0.15),
    ("job_postings", 0.05),
    ("funding", 0.05),
];

/// Weighted share of populated profile fields, in [0,1].
pub fn completeness(c: &DiscoveredCompany) -> f32 {
    let present = |field: &str| -> bool {
        match field {
            "name" => !c.name.trim().is_empty(),
            "website" => c.website.is_some(),
            "location" => c.location.is_some(),
            "industry" => c.industry.as_deref().is_some_and(|s| !s.trim().is_empty()),
            "employee_count" => c.employee_count.is_some(),
            "description" => c.description.as_deref().is_some_and(|s| !s.trim().is_empty()),
            "technologies" => !c.technologies.is_empty(),
            "job_postings" => !c.job_postings.is_empty(),
            "contacts" => !c.contacts.is_empty(),
            "funding" => c.funding.is_some(),
            _ => false,
        }
    };
    COMPLETENESS_WEIGHTS
        .iter()
        .filter(|(f, _)| present(f))
        .map(|(_, w)| w)
        .sum::<f32>()
        .min(1.0)
}

pub fn enrichment_level(c: &DiscoveredCompany) -> EnrichmentLevel {
    let contacts = !c.contacts.is_empty();
    let jobs = !c.job_postings.is_empty();
    if contacts && jobs && c.completeness >= 0.8 {
        EnrichmentLevel::Full
    } else if contacts || jobs || c.completeness >= 0.5 {
        EnrichmentLevel::Partial
    } else {
        EnrichmentLevel::Basic
    }
}

fn title_excluded(title: Option<&str>, excluded: &[String]) -> bool {
    let Some(t) = title else { return false };
    let t = t.to_lowercase();
    excluded.iter().any(|x| t.contains(&x.to_lowercase()))
}

/* ----------------------------
Enricher
---------------------------- */

pub struct Enricher {
    providers: Vec<Arc<dyn DiscoveryProvider>>,
    store: Option<SharedStore>,
    clock: SharedClock,
    telemetry: SharedTelemetry,
    pacing: Duration,
    timeout_secs: u64,
}

impl Enricher {
    pub fn new(
        providers: Vec<Arc<dyn DiscoveryProvider>>,
        store: Option<SharedStore>,
        clock: SharedClock,
        telemetry: SharedTelemetry,
        pacing_ms: u64,
        timeout_secs: u64,
    ) -> Self {
        Self {
            providers,
            store,
            clock,
            telemetry,
            pacing: Duration::from_millis(pacing_ms),
            timeout_secs: timeout_secs.max(1),
        }
    }

    /// Source provider first, then the rest in configured order.
    fn ordered_for<'a>(&'a self, c: &DiscoveredCompany) -> Vec<&'a Arc<dyn DiscoveryProvider>> {
        let mut v: Vec<&Arc<dyn DiscoveryProvider>> = self
            .providers
            .iter()
            .filter(|p| p.is_configured())
            .collect();
        v.sort_by_key(|p| p.name() != c.source);
        v
    }

    async fn contacts_for(&self, c: &DiscoveredCompany, filter: &SearchFilter) -> Vec<Contact> {
        let limit = Duration::from_secs(self.timeout_secs);
        for p in self.ordered_for(c) {
            match timeout(limit, p.find_contacts(c, filter)).await {
                Ok(Ok(found)) => {
                    let kept: Vec<Contact> = found
                        .into_iter()
                        .filter(|x| !title_excluded(x.title.as_deref(), &filter.excluded_titles))
                        .collect();
                    if !kept.is_empty() {
                        return kept;
                    }
                }
                Ok(Err(e)) => self.failed(p.name(), "contacts", e.to_string()),
                Err(_) => self.failed(p.name(), "contacts", format!("timed out after {}s", self.timeout_secs)),
            }
        }
        Vec::new()
    }

    async fn jobs_for(&self, c: &DiscoveredCompany) -> Vec<JobPosting> {
        let limit = Duration::from_secs(self.timeout_secs);
        for p in self.ordered_for(c) {
            match timeout(limit, p.job_postings(c)).await {
                Ok(Ok(found)) if !found.is_empty() => return found,
                Ok(Ok(_)) => {}
                Ok(Err(e)) => self.failed(p.name(), "jobs", e.to_string()),
                Err(_) => self.failed(p.name(), "jobs", format!("timed out after {}s", self.timeout_secs)),
            }
        }
        Vec::new()
    }

    fn failed(&self, provider: &'static str, stage: &'static str, reason: String) {
        tracing::warn!(provider, stage, %reason, "enrichment call failed");
        self.telemetry.record(PipelineEvent::ProviderFailed {
            provider,
            stage,
            reason,
        });
    }

    /// Enrich one company in place: contacts, job postings (when none came
    /// with the search hit), technology names, scores and level.
    pub async fn enrich_one(&self, c: &mut DiscoveredCompany, filter: &SearchFilter) {
        if c.contacts.is_empty() {
            c.contacts = self.contacts_for(c, filter).await;
        }
        if c.job_postings.is_empty() {
            c.job_postings = self.jobs_for(c).await;
        }
        c.technologies = canonicalize_technologies(&c.technologies);
        c.buying_intent = Some(buying_intent(c, self.clock.now()));
        c.completeness = completeness(c);
        c.enrichment_level = enrichment_level(c);
    }

    pub async fn enrich_all(
        &self,
        companies: Vec<DiscoveredCompany>,
        filter: &SearchFilter,
    ) -> Vec<DiscoveredCompany> {
        let mut out = Vec::with_capacity(companies.len());
        for (i, mut c) in companies.into_iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                sleep(self.pacing).await;
            }
            self.enrich_one(&mut c, filter).await;
            if let Some(store) = &self.store {
                if let Err(e) = store.upsert_company(&c).await {
                    tracing::warn!(error = %e, company = %c.key(), "company upsert failed, continuing");
                }
            }
            out.push(c);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::FundingInfo;
    use chrono::Duration as ChronoDuration;

    fn company(name: &str, loc: Option<&str>) -> DiscoveredCompany {
        let mut c = DiscoveredCompany::new(name, "apollo");
        c.location = loc.map(str::to_string);
        c
    }

    #[test]
    fn dedup_merges_by_website_and_by_near_identical_name() {
        let mut a = company("Acme Thermal Systems", Some("Austin, TX"));
        a.website = Some("https://acme.com".into());
        a.technologies = vec!["SolidWorks".into()];
        let mut b = company("ACME Corp", None);
        b.website = Some("www.acme.com".into());
        b.technologies = vec!["ANSYS".into(), "solidworks".into()];
        b.employee_count = Some(80);
        let c = company("Acme Thermal Systems Inc.", Some("Austin, TX"));
        let d = company("Acme Thermal Systems", Some("Denver, CO"));

        let (out, merged) = dedup(vec![a, b, c, d]);
        assert_eq!(merged, 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].technologies, vec!["SolidWorks", "ANSYS"]);
        assert_eq!(out[0].employee_count, Some(80));
        assert_eq!(out[1].location.as_deref(), Some("Denver, CO"));
    }

    #[test]
    fn technologies_collapse_aliases() {
        let raw: Vec<String> = ["reactjs", "React.js", "k8s", "Rust"].iter().map(|s| s.to_string()).collect();
        assert_eq!(canonicalize_technologies(&raw), vec!["React", "Kubernetes", "Rust"]);
    }

    #[test]
    fn buying_intent_rewards_recent_funding_and_hiring() {
        let now = Utc::now();
        let mut c = company("A", None);
        assert_eq!(buying_intent(&c, now).overall, 0.0);
        c.funding = Some(FundingInfo {
            total_raised_usd: Some(60_000_000.0),
            latest_round_at: Some(now - ChronoDuration::days(30)),
            ..Default::default()
        });
        c.job_postings = (0..5)
            .map(|i| JobPosting {
                title: format!("Engineer {i}"),
                location: None,
                url: None,
                posted_at: None,
            })
            .collect();
        let bi = buying_intent(&c, now);
        assert!((bi.funding_score - 1.0).abs() < 1e-6);
        assert!((bi.hiring_score - 0.5).abs() < 1e-6);
        assert!((bi.overall - 0.7).abs() < 1e-6);
    }

    #[test]
    fn completeness_and_level_track_populated_fields() {
        let mut c = company("A", Some("Austin, TX"));
        c.completeness = completeness(&c);
        assert!((c.completeness - 0.20).abs() < 1e-6);
        assert_eq!(enrichment_level(&c), EnrichmentLevel::Basic);

        c.website = Some("a.com".into());
        c.industry = Some("engineering".into());
        c.employee_count = Some(10);
        c.description = Some("d".into());
        c.technologies = vec!["CAD".into()];
        c.contacts = vec![Contact {
            name: "Pat".into(),
            title: Some("CTO".into()),
            email: None,
            linkedin_url: None,
        }];
        c.job_postings = vec![JobPosting {
            title: "ME".into(),
            location: None,
            url: None,
            posted_at: None,
        }];
        c.completeness = completeness(&c);
        assert!((c.completeness - 0.95).abs() < 1e-6);
        assert_eq!(enrichment_level(&c), EnrichmentLevel::Full);
    }

    #[test]
    fn excluded_contact_titles_match_case_insensitively() {
        let ex = vec!["Recruiter".to_string()];
        assert!(title_excluded(Some("Senior Technical recruiter"), &ex));
        assert!(!title_excluded(Some("Engineering Manager"), &ex));
        assert!(!title_excluded(None, &ex));
    }
}
