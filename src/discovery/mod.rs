// src/discovery/mod.rs
//! Company discovery: cascading organization search, dedup, enrichment and
//! the distance filter.

pub mod cascade;
pub mod enrich;
pub mod filters;
pub mod geo;
pub mod providers;
mod types;

use serde::Serialize;
use std::sync::Arc;

pub use cascade::{CascadeLevel, CascadeResult};
pub use enrich::{buying_intent, completeness, dedup, enrichment_level, Enricher};
pub use filters::{FilterPlan, SearchFilter};
pub use geo::{apply_radius, GeoDistance, HaversineGeo};
pub use providers::{build_providers, AdzunaProvider, ApolloProvider, DiscoveryProvider};
pub use types::{
    anon_hash, canonical_website, normalize_company_name, BuyingIntent, Contact, CourseContext,
    DiscoveredCompany, EnrichmentLevel, FundingInfo, JobPosting,
};

use crate::clock::SharedClock;
use crate::config::DiscoveryConfig;
use crate::domain::CourseDomain;
use crate::error::{PipelineError, PipelineResult};
use crate::occupations::CoordinatedOccupation;
use crate::store::SharedStore;
use crate::telemetry::{PipelineEvent, SharedTelemetry};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryStats {
    pub levels_attempted: usize,
    pub raw_results: usize,
    pub duplicates_merged: usize,
    pub beyond_radius: usize,
    pub enriched: usize,
    pub provider_failures: usize,
    pub providers_used: Vec<String>,
    pub industry_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryOutcome {
    pub companies: Vec<DiscoveredCompany>,
    pub stats: DiscoveryStats,
}

pub struct DiscoveryOrchestrator {
    providers: Vec<Arc<dyn DiscoveryProvider>>,
    enricher: Enricher,
    geo: Arc<dyn GeoDistance>,
    cfg: DiscoveryConfig,
    telemetry: SharedTelemetry,
}

impl DiscoveryOrchestrator {
    pub fn new(
        providers: Vec<Arc<dyn DiscoveryProvider>>,
        cfg: DiscoveryConfig,
        geo: Arc<dyn GeoDistance>,
        store: Option<SharedStore>,
        clock: SharedClock,
        telemetry: SharedTelemetry,
    ) -> Self {
        let enricher = Enricher::new(
            providers.clone(),
            store,
            clock,
            telemetry.clone(),
            cfg.pacing_ms,
            cfg.timeout_secs,
        );
        Self {
            providers,
            enricher,
            geo,
            cfg,
            telemetry,
        }
    }

    pub fn configured_providers(&self) -> Vec<Arc<dyn DiscoveryProvider>> {
        self.providers
            .iter()
            .filter(|p| p.is_configured())
            .cloned()
            .collect()
    }

    /// Search, dedup, enrich and distance-filter candidates for one course.
    pub async fn discover(
        &self,
        location: Option<&str>,
        occupations: &[CoordinatedOccupation],
        domain: CourseDomain,
        seed: u64,
    ) -> PipelineResult<DiscoveryOutcome> {
        let usable = self.configured_providers();
        if usable.is_empty() {
            return Err(PipelineError::Configuration(
                "no organization-search provider is configured".into(),
            ));
        }

        let plan = FilterPlan::build(location, occupations, domain, seed, &self.cfg);
        tracing::debug!(
            keywords = ?plan.industry_keywords,
            region = ?plan.region,
            employee_ranges = ?plan.template.employee_ranges,
            "discovery filter plan"
        );

        let found = cascade::run(
            &usable,
            &plan,
            self.cfg.min_results,
            self.cfg.timeout_secs,
            &self.telemetry,
        )
        .await;
        if found.companies.is_empty() {
            return Err(PipelineError::NoResults {
                levels_attempted: found.levels_attempted,
            });
        }

        let enriched = self.enricher.enrich_all(found.companies, &plan.template).await;
        let enriched_count = enriched.len();
        let (companies, beyond_radius) =
            apply_radius(enriched, plan.location.as_deref(), self.cfg.radius, self.geo.as_ref());
        if beyond_radius > 0 {
            self.telemetry.record(PipelineEvent::CandidatesDropped {
                stage: "distance",
                count: beyond_radius,
            });
        }

        Ok(DiscoveryOutcome {
            companies,
            stats: DiscoveryStats {
                levels_attempted: found.levels_attempted,
                raw_results: found.raw_results,
                duplicates_merged: found.duplicates_merged,
                beyond_radius,
                enriched: enriched_count,
                provider_failures: found.provider_failures,
                providers_used: usable.iter().map(|p| p.name().to_string()).collect(),
                industry_keywords: plan.industry_keywords,
            },
        })
    }
}
