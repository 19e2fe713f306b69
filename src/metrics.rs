// src/metrics.rs
use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::config::MatcherConfig;

// A process has exactly one global recorder; later callers share its handle.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and publish the
    /// static calibration gauges from `cfg`.
    pub fn init(cfg: &MatcherConfig) -> Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                PrometheusBuilder::new()
                    .install_recorder()
                    .context("prometheus: install recorder")
            })?
            .clone();

        gauge!("sponsor_match_min_results").set(cfg.discovery.min_results as f64);
        gauge!("sponsor_match_radius_miles").set(cfg.discovery.radius);
        gauge!("sponsor_match_boost_factor").set(f64::from(cfg.ranking.boost_factor));

        Ok(Self { handle })
    }

    /// `/metrics` scrape endpoint for the pipeline counters and the
    /// calibration gauges, merged into the API router by `create_router`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(scrape))
            .with_state(self.handle.clone())
    }
}

async fn scrape(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
