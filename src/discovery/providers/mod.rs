// src/discovery/providers/mod.rs
//! Organization-search providers.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::DiscoveryConfig;
use crate::discovery::{Contact, DiscoveredCompany, JobPosting, SearchFilter};
use crate::error::ProviderResult;

pub mod adzuna;
pub mod apollo;

pub use adzuna::AdzunaProvider;
pub use apollo::ApolloProvider;

#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Credentials present and the provider switched on.
    fn is_configured(&self) -> bool;

    async fn search_organizations(&self, filter: &SearchFilter) -> ProviderResult<Vec<DiscoveredCompany>>;

    /// People at `company` matching `filter.contact_titles`.
    async fn find_contacts(
        &self,
        _company: &DiscoveredCompany,
        _filter: &SearchFilter,
    ) -> ProviderResult<Vec<Contact>> {
        Ok(Vec::new())
    }

    async fn job_postings(&self, _company: &DiscoveredCompany) -> ProviderResult<Vec<JobPosting>> {
        Ok(Vec::new())
    }
}

/// All built-in discovery providers, configured or not. The orchestrator
/// decides which are usable.
pub fn build_providers(cfg: &DiscoveryConfig) -> Vec<Arc<dyn DiscoveryProvider>> {
    vec![
        Arc::new(ApolloProvider::new(&cfg.apollo, cfg.timeout_secs)),
        Arc::new(AdzunaProvider::new(&cfg.adzuna, cfg.timeout_secs)),
    ]
}

/// A configured credential: non-empty and not an unresolved "ENV" placeholder.
pub(crate) fn has_secret(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty() && !s.eq_ignore_ascii_case("ENV")
}
