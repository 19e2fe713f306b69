// src/discovery/cascade.rs
//! Progressive search relaxation.
//!
//! 1. specific: course location, full keyword set
//! 2. region, then country: same keywords, broader location
//! 3. reduced keywords: most specific half, broadest location reached
//! 4. location only: no industry keywords
//!
//! A step runs only while the accumulated (deduplicated) pool is below
//! `min_results`. Providers within a step are queried concurrently.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::discovery::enrich::dedup;
use crate::discovery::filters::{reduce_keywords, FilterPlan};
use crate::discovery::providers::DiscoveryProvider;
use crate::discovery::{DiscoveredCompany, SearchFilter};
use crate::telemetry::{PipelineEvent, SharedTelemetry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeLevel {
    Specific,
    Region,
    Country,
    ReducedKeywords,
    LocationOnly,
}

impl CascadeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Specific => "specific",
            Self::Region => "region",
            Self::Country => "country",
            Self::ReducedKeywords => "reduced_keywords",
            Self::LocationOnly => "location_only",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CascadeStep {
    pub level: CascadeLevel,
    pub filter: SearchFilter,
}

/// The ordered steps for `plan`. A step whose filter repeats the previous
/// one (no region known, location already the country, no reduction
/// possible) is omitted.
pub fn plan_steps(plan: &FilterPlan) -> Vec<CascadeStep> {
    let full = plan.industry_keywords.clone();
    let mut steps: Vec<CascadeStep> = Vec::new();
    let mut push = |level: CascadeLevel, filter: SearchFilter| {
        if steps.last().is_some_and(|prev| prev.filter == filter) {
            return;
        }
        steps.push(CascadeStep { level, filter });
    };
    let mut broadest = plan.location.clone().unwrap_or_else(|| plan.country.clone());

    push(CascadeLevel::Specific, plan.filter(&broadest, &full));
    if plan.location.is_some() {
        if let Some(region) = &plan.region {
            broadest = region.clone();
            push(CascadeLevel::Region, plan.filter(&broadest, &full));
        }
        broadest = plan.country.clone();
        push(CascadeLevel::Country, plan.filter(&broadest, &full));
    }
    push(
        CascadeLevel::ReducedKeywords,
        plan.filter(&broadest, &reduce_keywords(&full)),
    );
    push(CascadeLevel::LocationOnly, plan.filter(&broadest, &[]));
    steps
}

#[derive(Debug, Clone, Default)]
pub struct CascadeResult {
    pub companies: Vec<DiscoveredCompany>,
    pub levels_attempted: usize,
    pub raw_results: usize,
    pub duplicates_merged: usize,
    pub provider_failures: usize,
}

pub async fn run(
    providers: &[Arc<dyn DiscoveryProvider>],
    plan: &FilterPlan,
    min_results: usize,
    timeout_secs: u64,
    telemetry: &SharedTelemetry,
) -> CascadeResult {
    let mut out = CascadeResult::default();
    let limit = Duration::from_secs(timeout_secs.max(1));

    for step in plan_steps(plan) {
        if out.levels_attempted > 0 && out.companies.len() >= min_results.max(1) {
            break;
        }
        out.levels_attempted += 1;

        let calls = providers.iter().map(|p| {
            let filter = &step.filter;
            async move { (p.name(), timeout(limit, p.search_organizations(filter)).await) }
        });
        let mut found: Vec<DiscoveredCompany> = Vec::new();
        for (name, res) in join_all(calls).await {
            let reason = match res {
                Ok(Ok(list)) => {
                    found.extend(list);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {}s", limit.as_secs()),
            };
            tracing::warn!(provider = name, level = step.level.as_str(), %reason, "organization search failed");
            out.provider_failures += 1;
            telemetry.record(PipelineEvent::ProviderFailed {
                provider: name,
                stage: "search",
                reason,
            });
        }

        let step_results = found.len();
        out.raw_results += step_results;
        let mut pool = std::mem::take(&mut out.companies);
        pool.extend(found);
        let (merged, dups) = dedup(pool);
        out.companies = merged;
        out.duplicates_merged += dups;

        tracing::debug!(
            level = step.level.as_str(),
            location = step.filter.locations.first().map(String::as_str).unwrap_or_default(),
            keywords = step.filter.industry_keywords.len(),
            results = step_results,
            pool = out.companies.len(),
            "search level complete"
        );
        telemetry.record(PipelineEvent::SearchLevel {
            level: step.level.as_str(),
            location: step.filter.locations.first().cloned(),
            keywords: step.filter.industry_keywords.len(),
            results: step_results,
        });
    }
    out
}
