// src/discovery/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Input to `discover`: the course as the enclosing handler knows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseContext {
    pub title: String,
    pub level: Option<String>,
    pub outcomes: Vec<String>,
    pub topics: Vec<String>,
    /// Search origin ("Austin, TX", "30.27,-97.74").
    pub location: Option<String>,
}

impl CourseContext {
    /// Deterministic per-course seed: SHA-256 of `title|level|topics` folded to u64.
    /// Varies secondary search parameters only.
    pub fn seed(&self) -> u64 {
        let mut h = Sha256::new();
        h.update(self.title.trim().to_lowercase().as_bytes());
        h.update(b"|");
        h.update(self.level.as_deref().unwrap_or_default().trim().to_lowercase().as_bytes());
        h.update(b"|");
        h.update(self.topics.join(",").to_lowercase().as_bytes());
        let digest = h.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(bytes)
    }
}

/// Short, non-reversible course identity for logs.
pub fn anon_hash(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub title: Option<String>,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub location: Option<String>,
    pub url: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundingInfo {
    pub total_raised_usd: Option<f64>,
    pub latest_round: Option<String>,
    pub latest_round_usd: Option<f64>,
    pub latest_round_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BuyingIntent {
    pub funding_score: f32,
    pub hiring_score: f32,
    pub overall: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentLevel {
    #[default]
    Basic,
    Partial,
    Full,
}

/// One organization as discovered, deduplicated and enriched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveredCompany {
    pub name: String,
    pub website: Option<String>,
    pub location: Option<String>,
    pub industry: Option<String>,
    pub sector_keywords: Vec<String>,
    pub employee_count: Option<u32>,
    pub description: Option<String>,
    pub technologies: Vec<String>,
    pub job_postings: Vec<JobPosting>,
    pub contacts: Vec<Contact>,
    pub funding: Option<FundingInfo>,
    pub buying_intent: Option<BuyingIntent>,
    /// Provider that first found the company.
    pub source: String,
    /// Provider-native id, for follow-up calls to `source`.
    pub external_id: Option<String>,
    pub enrichment_level: EnrichmentLevel,
    pub completeness: f32,
    /// Great-circle miles from the search origin, when both ends resolve.
    pub distance: Option<f64>,
}

impl DiscoveredCompany {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// Upsert key: canonical website, else `name:` + normalized name.
    pub fn key(&self) -> String {
        match self.website.as_deref().and_then(canonical_website) {
            Some(site) => site,
            None => format!("name:{}", normalize_company_name(&self.name)),
        }
    }

    /// Industry plus sector keywords, as one string for the exclusion engine.
    pub fn sector_text(&self) -> Option<String> {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(i) = self.industry.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(i);
        }
        parts.extend(self.sector_keywords.iter().map(String::as_str));
        (!parts.is_empty()).then(|| parts.join(", "))
    }

    pub fn job_titles(&self) -> Vec<String> {
        self.job_postings.iter().map(|j| j.title.clone()).collect()
    }
}

/// "https://www.Acme.com/about" → "acme.com".
pub fn canonical_website(url: &str) -> Option<String> {
    let mut s = url.trim().to_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(scheme) {
            s = rest.to_string();
        }
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }
    let host = s
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default()
        .trim_end_matches('.');
    (host.contains('.') && !host.starts_with('.')).then(|| host.to_string())
}

const LEGAL_SUFFIXES: &[&str] = &[
    "inc", "incorporated", "llc", "l.l.c", "ltd", "limited", "corp", "corporation", "co",
    "company", "plc", "gmbh", "lp", "llp", "pllc", "sa", "ag",
];

/// Lowercase, punctuation to spaces, trailing legal suffixes removed.
pub fn normalize_company_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '&' { c } else { ' ' })
        .collect();
    let mut words: Vec<&str> = cleaned.split_whitespace().collect();
    while words.len() > 1 && words.last().is_some_and(|w| LEGAL_SUFFIXES.contains(w)) {
        words.pop();
    }
    words.join(" ")
}
