// src/testing.rs
//! In-process doubles for the external seams: clock, telemetry, occupation,
//! discovery and embedding providers. Used by unit and integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::clock::Clock;
use crate::discovery::{Contact, DiscoveredCompany, DiscoveryProvider, JobPosting, SearchFilter};
use crate::error::{ProviderError, ProviderResult};
use crate::occupations::{OccupationMappingResult, OccupationProvider, StandardOccupation};
use crate::ranking::EmbeddingProvider;
use crate::skills::ExtractedSkill;
use crate::telemetry::{PipelineEvent, Telemetry};

/* ---- Clock ---- */

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance_secs(&self, secs: i64) {
        if let Ok(mut n) = self.now.lock() {
            *n += ChronoDuration::seconds(secs);
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::at(start)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|n| *n).unwrap_or_else(|_| Utc::now())
    }
}

/* ---- Telemetry ---- */

#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingTelemetry {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, pred: impl Fn(&PipelineEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl Telemetry for RecordingTelemetry {
    fn record(&self, event: PipelineEvent) {
        if let Ok(mut e) = self.events.lock() {
            e.push(event);
        }
    }
}

/* ---- Occupation providers ---- */

/// Returns a fixed occupation list for any non-empty skill set.
pub struct StaticOccupationProvider {
    pub name: &'static str,
    pub priority: f32,
    pub healthy: bool,
    pub occupations: Vec<StandardOccupation>,
    pub calls: AtomicUsize,
}

impl StaticOccupationProvider {
    pub fn new(name: &'static str, priority: f32, occupations: Vec<StandardOccupation>) -> Self {
        Self {
            name,
            priority,
            healthy: true,
            occupations,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OccupationProvider for StaticOccupationProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> f32 {
        self.priority
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    async fn map_skills_to_occupations(
        &self,
        skills: &[ExtractedSkill],
    ) -> ProviderResult<OccupationMappingResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if skills.is_empty() {
            return Ok(OccupationMappingResult::default());
        }
        Ok(OccupationMappingResult {
            occupations: self
                .occupations
                .iter()
                .cloned()
                .map(|mut o| {
                    o.provider = self.name.to_string();
                    o
                })
                .collect(),
            api_calls: 1,
            ..Default::default()
        })
    }
}

/// Healthy, but every mapping call fails with the given error.
pub struct FailingOccupationProvider {
    pub name: &'static str,
    pub error: ProviderError,
}

#[async_trait]
impl OccupationProvider for FailingOccupationProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> f32 {
        1.0
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn map_skills_to_occupations(
        &self,
        _skills: &[ExtractedSkill],
    ) -> ProviderResult<OccupationMappingResult> {
        Err(self.error.clone())
    }
}

/// Sleeps before answering; pair with a short per-call timeout.
pub struct SlowOccupationProvider {
    pub name: &'static str,
    pub delay: Duration,
}

#[async_trait]
impl OccupationProvider for SlowOccupationProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> f32 {
        0.5
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn map_skills_to_occupations(
        &self,
        _skills: &[ExtractedSkill],
    ) -> ProviderResult<OccupationMappingResult> {
        tokio::time::sleep(self.delay).await;
        Ok(OccupationMappingResult::default())
    }
}

/// Occupation record with the fields tests usually care about.
pub fn occupation(code: &str, title: &str, match_score: f32, skills: &[&str]) -> StandardOccupation {
    StandardOccupation {
        code: code.to_string(),
        title: title.to_string(),
        description: format!("{title} plan, design and analyze systems."),
        match_score,
        confidence: 0.8,
        skills: skills.iter().map(|s| s.to_string()).collect(),
        matched_skills: skills.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

/* ---- Discovery provider ---- */

/// Answers each organization search with the next scripted batch (empty once
/// the script runs out) and records every filter it saw.
pub struct ScriptedDiscoveryProvider {
    pub name: &'static str,
    pub configured: bool,
    batches: Mutex<Vec<ProviderResult<Vec<DiscoveredCompany>>>>,
    seen: Mutex<Vec<SearchFilter>>,
    pub contacts: Vec<Contact>,
    pub jobs: Vec<JobPosting>,
}

impl ScriptedDiscoveryProvider {
    pub fn new(name: &'static str, batches: Vec<ProviderResult<Vec<DiscoveredCompany>>>) -> Self {
        let mut batches = batches;
        batches.reverse();
        Self {
            name,
            configured: true,
            batches: Mutex::new(batches),
            seen: Mutex::new(Vec::new()),
            contacts: Vec::new(),
            jobs: Vec::new(),
        }
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn with_contacts(mut self, contacts: Vec<Contact>) -> Self {
        self.contacts = contacts;
        self
    }

    pub fn with_jobs(mut self, jobs: Vec<JobPosting>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn filters_seen(&self) -> Vec<SearchFilter> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DiscoveryProvider for ScriptedDiscoveryProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn search_organizations(&self, filter: &SearchFilter) -> ProviderResult<Vec<DiscoveredCompany>> {
        if let Ok(mut s) = self.seen.lock() {
            s.push(filter.clone());
        }
        let next = self.batches.lock().ok().and_then(|mut b| b.pop());
        next.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn find_contacts(
        &self,
        _company: &DiscoveredCompany,
        _filter: &SearchFilter,
    ) -> ProviderResult<Vec<Contact>> {
        Ok(self.contacts.clone())
    }

    async fn job_postings(&self, _company: &DiscoveredCompany) -> ProviderResult<Vec<JobPosting>> {
        Ok(self.jobs.clone())
    }
}

/// Company at a location with an industry and optional open roles.
pub fn company(name: &str, location: &str, industry: &str, jobs: &[&str]) -> DiscoveredCompany {
    let mut c = DiscoveredCompany::new(name, "scripted");
    c.location = Some(location.to_string());
    c.industry = Some(industry.to_string());
    c.job_postings = jobs
        .iter()
        .map(|t| JobPosting {
            title: t.to_string(),
            location: Some(location.to_string()),
            url: None,
            posted_at: None,
        })
        .collect();
    c
}

/* ---- Embeddings ---- */

/// Same similarity for every candidate.
pub struct FixedSimilarity(pub f32);

#[async_trait]
impl EmbeddingProvider for FixedSimilarity {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn batch_similarity(&self, _anchor: &str, candidates: &[String]) -> ProviderResult<Vec<f32>> {
        Ok(vec![self.0; candidates.len()])
    }
}

/// Always fails; counts attempts.
#[derive(Default)]
pub struct FailingEmbeddings {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for FailingEmbeddings {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn batch_similarity(&self, _anchor: &str, _candidates: &[String]) -> ProviderResult<Vec<f32>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Http {
            provider: "failing",
            status: 503,
        })
    }
}
