//! Sponsor matching service: binary entrypoint.
//! Loads config, wires providers into the pipeline and serves the Axum router.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sponsor_match::clock::system_clock;
use sponsor_match::metrics::Metrics;
use sponsor_match::telemetry::MetricsTelemetry;
use sponsor_match::{create_router, AppState, MatcherConfig, SponsorPipeline};

/// Compact logs by default; LOG_FORMAT=json for structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sponsor_match=info,warn"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        // the runtime may have installed a subscriber already
        tracing::debug!("tracing subscriber already set");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = MatcherConfig::from_toml().context("loading matcher config")?;
    let metrics = Metrics::init(&cfg)?;

    let pipeline = SponsorPipeline::from_config(
        &cfg,
        system_clock(),
        Arc::new(MetricsTelemetry::new()),
    )
    .context("wiring pipeline")?;

    tracing::info!(
        min_results = cfg.discovery.min_results,
        radius = cfg.discovery.radius,
        "sponsor matching ready"
    );

    let router = create_router(AppState::new(pipeline), Some(&metrics));
    Ok(router.into())
}
