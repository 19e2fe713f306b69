// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /discover (200 with ranked companies, 404 on no results, 503 when
//   no occupation provider is usable)
// - GET /metrics when a recorder is installed

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use sponsor_match::config::MatcherConfig;
use sponsor_match::discovery::DiscoveryProvider;
use sponsor_match::metrics::Metrics;
use sponsor_match::occupations::OccupationProvider;
use sponsor_match::testing::{
    company, occupation, FixedSimilarity, ManualClock, ScriptedDiscoveryProvider,
    StaticOccupationProvider,
};
use sponsor_match::{create_router, AppState, PipelineParts, SponsorPipeline};

const BODY_LIMIT: usize = 1024 * 1024;

fn router_with(
    occupations: Arc<dyn OccupationProvider>,
    discovery: Arc<dyn DiscoveryProvider>,
    metrics: Option<&Metrics>,
) -> Router {
    let mut cfg = MatcherConfig::default();
    cfg.discovery.pacing_ms = 0;
    let pipeline = SponsorPipeline::new(
        &cfg,
        PipelineParts {
            occupation_providers: vec![occupations],
            discovery_providers: vec![discovery],
            embeddings: Some(Arc::new(FixedSimilarity(0.6))),
            store: None,
            clock: Arc::new(ManualClock::default()),
            telemetry: sponsor_match::telemetry::noop(),
        },
    );
    create_router(AppState::new(pipeline), metrics)
}

fn healthy_occupations() -> Arc<dyn OccupationProvider> {
    Arc::new(StaticOccupationProvider::new(
        "static",
        1.0,
        vec![occupation("15-1252.00", "Software Developers", 0.9, &["Python"])],
    ))
}

fn discover_request() -> Request<Body> {
    let course = json!({
        "title": "Data Engineering with Python",
        "outcomes": ["Build data pipelines in Python and SQL"],
        "location": "Seattle, WA"
    });
    Request::builder()
        .method("POST")
        .uri("/discover")
        .header("content-type", "application/json")
        .body(Body::from(course.to_string()))
        .expect("build POST /discover")
}

async fn json_body(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_returns_ok() {
    let app = router_with(
        healthy_occupations(),
        Arc::new(ScriptedDiscoveryProvider::new("scripted", vec![])),
        None,
    );
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn discover_returns_ranked_companies() {
    let app = router_with(
        healthy_occupations(),
        Arc::new(ScriptedDiscoveryProvider::new(
            "scripted",
            vec![Ok(vec![
                company("Puget Data Works", "Seattle, WA", "computer software", &["Data Engineer"]),
                company("Rainier Analytics", "Seattle, WA", "information technology", &[]),
            ])],
        )),
        None,
    );

    let resp = app.oneshot(discover_request()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = json_body(resp).await;
    let companies = v["companies"].as_array().expect("companies array");
    assert_eq!(companies.len(), 2);
    assert_eq!(companies[0]["company"]["name"], "Puget Data Works");
    assert!(companies[0]["semantic"]["final_score"].is_number());
    assert_eq!(v["stats"]["domain"]["domain"], "computer_tech");
    assert!(v["stats"]["run_id"].is_string());
}

#[tokio::test]
async fn no_results_maps_to_404_with_generic_message() {
    let app = router_with(
        healthy_occupations(),
        Arc::new(ScriptedDiscoveryProvider::new("scripted", vec![])),
        None,
    );
    let resp = app.oneshot(discover_request()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let v = json_body(resp).await;
    assert_eq!(v["error"], "No companies found for this course.");
}

#[tokio::test]
async fn unusable_occupation_providers_map_to_503() {
    let app = router_with(
        Arc::new(StaticOccupationProvider::new("down", 1.0, vec![]).unhealthy()),
        Arc::new(ScriptedDiscoveryProvider::new("scripted", vec![])),
        None,
    );
    let resp = app.oneshot(discover_request()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let v = json_body(resp).await;
    let msg = v["error"].as_str().unwrap();
    assert!(!msg.contains("down"), "provider detail leaked: {msg}");
}

#[tokio::test]
async fn metrics_route_renders_exposition() {
    let metrics = Metrics::init(&MatcherConfig::default()).expect("recorder");
    let app = router_with(
        healthy_occupations(),
        Arc::new(ScriptedDiscoveryProvider::new("scripted", vec![])),
        Some(&metrics),
    );
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("sponsor_match_min_results"), "{text}");
}
