// src/store.rs
//! Company persistence. The pipeline upserts every enriched company and logs
//! one generation run per `discover` call; store failures never abort a run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::discovery::DiscoveredCompany;
use crate::domain::CourseDomainClassification;
use crate::error::{PipelineError, PipelineResult};

/// Occupation as captured in a run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupationSnapshot {
    pub code: String,
    pub title: String,
    pub consensus_score: f32,
    pub providers: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub skills_ms: u64,
    pub occupations_ms: u64,
    pub discovery_ms: u64,
    pub ranking_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    NoResults,
    Failed,
}

/// One `discover` invocation, kept for auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRun {
    /// SHA-256 prefix of course identity + start time.
    pub id: String,
    /// Anonymized course identity.
    pub course_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub skills: Vec<String>,
    pub occupations: Vec<OccupationSnapshot>,
    pub domain: Option<CourseDomainClassification>,
    pub threshold: Option<f32>,
    pub timings: StageTimings,
    pub levels_attempted: usize,
    pub result_count: usize,
    pub company_keys: Vec<String>,
    pub outcome: RunOutcome,
}

#[async_trait]
pub trait CompanyStore: Send + Sync {
    /// Insert or merge by `DiscoveredCompany::key()`. Only present, non-empty
    /// incoming fields overwrite stored ones.
    async fn upsert_company(&self, company: &DiscoveredCompany) -> PipelineResult<()>;

    async fn get(&self, key: &str) -> PipelineResult<Option<DiscoveredCompany>>;

    async fn record_generation_run(&self, run: &GenerationRun) -> PipelineResult<()>;
}

pub type SharedStore = Arc<dyn CompanyStore>;

/// Field-wise merge used by upserts: `incoming` wins where it carries data.
pub fn merge_into(stored: &mut DiscoveredCompany, incoming: &DiscoveredCompany) {
    fn take<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
        if src.is_some() {
            dst.clone_from(src);
        }
    }
    fn take_vec<T: Clone>(dst: &mut Vec<T>, src: &[T]) {
        if !src.is_empty() {
            *dst = src.to_vec();
        }
    }

    if !incoming.name.trim().is_empty() {
        stored.name.clone_from(&incoming.name);
    }
    take(&mut stored.website, &incoming.website);
    take(&mut stored.location, &incoming.location);
    take(&mut stored.industry, &incoming.industry);
    take(&mut stored.employee_count, &incoming.employee_count);
    take(&mut stored.description, &incoming.description);
    take(&mut stored.funding, &incoming.funding);
    take(&mut stored.buying_intent, &incoming.buying_intent);
    take(&mut stored.external_id, &incoming.external_id);
    take(&mut stored.distance, &incoming.distance);
    take_vec(&mut stored.sector_keywords, &incoming.sector_keywords);
    take_vec(&mut stored.technologies, &incoming.technologies);
    take_vec(&mut stored.job_postings, &incoming.job_postings);
    take_vec(&mut stored.contacts, &incoming.contacts);
    if !incoming.source.is_empty() {
        stored.source.clone_from(&incoming.source);
    }
    if incoming.enrichment_level >= stored.enrichment_level || incoming.completeness > 0.0 {
        stored.enrichment_level = incoming.enrichment_level;
        stored.completeness = incoming.completeness;
    }
}

/* ----------------------------
In-memory store
---------------------------- */

#[derive(Debug, Default)]
pub struct InMemoryStore {
    companies: Mutex<HashMap<String, DiscoveredCompany>>,
    runs: Mutex<Vec<GenerationRun>>,
}

fn lock<T>(m: &Mutex<T>) -> PipelineResult<MutexGuard<'_, T>> {
    m.lock().map_err(|_| PipelineError::Store("store lock poisoned".into()))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn company_count(&self) -> usize {
        lock(&self.companies).map(|m| m.len()).unwrap_or(0)
    }

    pub fn runs(&self) -> Vec<GenerationRun> {
        lock(&self.runs).map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompanyStore for InMemoryStore {
    async fn upsert_company(&self, company: &DiscoveredCompany) -> PipelineResult<()> {
        let key = company.key();
        let mut map = lock(&self.companies)?;
        match map.get_mut(&key) {
            Some(stored) => merge_into(stored, company),
            None => {
                map.insert(key, company.clone());
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> PipelineResult<Option<DiscoveredCompany>> {
        Ok(lock(&self.companies)?.get(key).cloned())
    }

    async fn record_generation_run(&self, run: &GenerationRun) -> PipelineResult<()> {
        lock(&self.runs)?.push(run.clone());
        Ok(())
    }
}
