// src/telemetry.rs
//! Structured pipeline events. Components receive an `Arc<dyn Telemetry>` and
//! report counts, durations and decisions through it instead of printing.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    ProviderHealth {
        provider: &'static str,
        healthy: bool,
    },
    ProviderFailed {
        provider: &'static str,
        stage: &'static str,
        reason: String,
    },
    ProviderSucceeded {
        provider: &'static str,
        occupations: usize,
        cache_hits: u32,
        api_calls: u32,
        ms: u64,
    },
    DomainClassified {
        domain: &'static str,
        confidence: f32,
    },
    /// Embedding similarity unavailable; keyword similarity used instead.
    DegradedMode {
        reason: String,
    },
    CircuitOpened {
        failures: u32,
    },
    ThresholdSelected {
        pool: usize,
        threshold: f32,
    },
    SearchLevel {
        level: &'static str,
        location: Option<String>,
        keywords: usize,
        results: usize,
    },
    CandidatesDropped {
        stage: &'static str,
        count: usize,
    },
    PipelineFinished {
        companies: usize,
        ms: u64,
    },
}

pub trait Telemetry: Send + Sync {
    fn record(&self, event: PipelineEvent);
}

pub type SharedTelemetry = Arc<dyn Telemetry>;

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn record(&self, _event: PipelineEvent) {}
}

pub fn noop() -> SharedTelemetry {
    Arc::new(NoopTelemetry)
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "occupation_provider_failures_total",
            "Occupation or discovery provider calls that failed and were excluded."
        );
        describe_counter!(
            "occupation_provider_cache_hits_total",
            "Per-skill occupation lookups served from the provider cache."
        );
        describe_histogram!(
            "occupation_provider_ms",
            "Occupation provider mapping time in milliseconds."
        );
        describe_counter!(
            "ranking_degraded_total",
            "Rankings that fell back to keyword similarity."
        );
        describe_counter!(
            "embedding_circuit_open_total",
            "Times the embedding circuit breaker opened."
        );
        describe_gauge!(
            "ranking_threshold_last",
            "Adaptive threshold chosen for the last ranked pool."
        );
        describe_counter!(
            "discovery_search_level_total",
            "Cascading search levels attempted, by level."
        );
        describe_counter!(
            "discovery_dropped_total",
            "Candidates dropped, by stage."
        );
        describe_histogram!("pipeline_ms", "End-to-end discover() time in milliseconds.");
        describe_counter!("pipeline_companies_total", "Ranked companies returned.");
    });
}

/// Emits events as Prometheus-style metrics plus a tracing line.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsTelemetry;

impl MetricsTelemetry {
    pub fn new() -> Self {
        ensure_metrics_described();
        Self
    }
}

impl Telemetry for MetricsTelemetry {
    fn record(&self, event: PipelineEvent) {
        match &event {
            PipelineEvent::ProviderHealth { provider, healthy } => {
                tracing::debug!(provider, healthy, "provider health");
            }
            PipelineEvent::ProviderFailed {
                provider,
                stage,
                reason,
            } => {
                counter!("occupation_provider_failures_total", "provider" => *provider, "stage" => *stage)
                    .increment(1);
                tracing::warn!(provider, stage, %reason, "provider excluded");
            }
            PipelineEvent::ProviderSucceeded {
                provider,
                occupations,
                cache_hits,
                api_calls,
                ms,
            } => {
                counter!("occupation_provider_cache_hits_total", "provider" => *provider)
                    .increment(u64::from(*cache_hits));
                histogram!("occupation_provider_ms", "provider" => *provider).record(*ms as f64);
                tracing::info!(provider, occupations, cache_hits, api_calls, ms, "provider ok");
            }
            PipelineEvent::DomainClassified { domain, confidence } => {
                tracing::info!(domain, confidence, "course domain classified");
            }
            PipelineEvent::DegradedMode { reason } => {
                counter!("ranking_degraded_total").increment(1);
                tracing::warn!(%reason, "embedding similarity unavailable, using keyword overlap");
            }
            PipelineEvent::CircuitOpened { failures } => {
                counter!("embedding_circuit_open_total").increment(1);
                tracing::warn!(failures, "embedding circuit opened");
            }
            PipelineEvent::ThresholdSelected { pool, threshold } => {
                gauge!("ranking_threshold_last").set(f64::from(*threshold));
                tracing::info!(pool, threshold, "adaptive threshold");
            }
            PipelineEvent::SearchLevel {
                level,
                location,
                keywords,
                results,
            } => {
                counter!("discovery_search_level_total", "level" => *level).increment(1);
                tracing::info!(level, location = ?location, keywords, results, "search level");
            }
            PipelineEvent::CandidatesDropped { stage, count } => {
                counter!("discovery_dropped_total", "stage" => *stage).increment(*count as u64);
                tracing::debug!(stage, count, "candidates dropped");
            }
            PipelineEvent::PipelineFinished { companies, ms } => {
                histogram!("pipeline_ms").record(*ms as f64);
                counter!("pipeline_companies_total").increment(*companies as u64);
                tracing::info!(companies, ms, "discover finished");
            }
        }
    }
}
