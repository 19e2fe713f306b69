// tests/pipeline_e2e.rs
//
// Full discover(course) runs with every external seam replaced by a double.

use std::sync::Arc;

use sponsor_match::config::MatcherConfig;
use sponsor_match::discovery::{CourseContext, DiscoveredCompany, DiscoveryProvider};
use sponsor_match::domain::CourseDomain;
use sponsor_match::error::PipelineError;
use sponsor_match::occupations::OccupationProvider;
use sponsor_match::ranking::SimilarityMethod;
use sponsor_match::store::{InMemoryStore, RunOutcome};
use sponsor_match::telemetry::PipelineEvent;
use sponsor_match::testing::{
    company, occupation, FixedSimilarity, ManualClock, RecordingTelemetry, ScriptedDiscoveryProvider,
    StaticOccupationProvider,
};
use sponsor_match::{PipelineParts, SponsorPipeline};

struct Harness {
    pipeline: SponsorPipeline,
    store: Arc<InMemoryStore>,
    telemetry: Arc<RecordingTelemetry>,
}

fn thermal_course() -> CourseContext {
    CourseContext {
        title: "Thermal Systems Engineering".into(),
        level: Some("undergraduate".into()),
        outcomes: vec!["Apply fluid dynamics principles to analyze heat transfer in HVAC systems".into()],
        topics: vec!["Heat exchangers".into()],
        location: Some("Austin, TX".into()),
    }
}

fn austin_companies() -> Vec<DiscoveredCompany> {
    vec![
        company("Bluebonnet Air", "Austin, TX", "hvac", &["HVAC Design Engineer"]),
        company("Capitol Cooling", "Austin, TX", "mechanical engineering", &[]),
        company("Pecan Street Mechanical", "Round Rock, TX", "industrial machinery", &[]),
        company("Zilker Energy", "San Antonio, TX", "renewable energy", &["Energy Analyst"]),
        company("Lone Star Mutual", "Austin, TX", "insurance", &[]),
    ]
}

fn harness(
    occupations: Arc<dyn OccupationProvider>,
    discovery: Arc<dyn DiscoveryProvider>,
) -> Harness {
    let mut cfg = MatcherConfig::default();
    cfg.discovery.pacing_ms = 0;
    let store = Arc::new(InMemoryStore::new());
    let telemetry = Arc::new(RecordingTelemetry::default());
    let pipeline = SponsorPipeline::new(
        &cfg,
        PipelineParts {
            occupation_providers: vec![occupations],
            discovery_providers: vec![discovery],
            embeddings: Some(Arc::new(FixedSimilarity(0.55))),
            store: Some(store.clone()),
            clock: Arc::new(ManualClock::default()),
            telemetry: telemetry.clone(),
        },
    );
    Harness {
        pipeline,
        store,
        telemetry,
    }
}

fn engineering_provider() -> Arc<StaticOccupationProvider> {
    Arc::new(StaticOccupationProvider::new(
        "static",
        1.0,
        vec![
            occupation("17-2141.00", "Mechanical Engineers", 0.9, &["Fluid Dynamics", "Heat Transfer"]),
            occupation("17-3027.00", "Mechanical Engineering Technologists", 0.7, &["HVAC"]),
        ],
    ))
}

#[tokio::test]
async fn thermal_course_end_to_end() {
    let h = harness(
        engineering_provider(),
        Arc::new(ScriptedDiscoveryProvider::new("scripted", vec![Ok(austin_companies())])),
    );

    let out = h.pipeline.discover(&thermal_course()).await.expect("matches");

    assert!(out.skills.iter().any(|s| s.name == "Fluid Dynamics" || s.name == "Heat Transfer"));
    assert_eq!(out.stats.domain.domain, CourseDomain::EngineeringTechnical);
    assert_eq!(out.stats.similarity_method, SimilarityMethod::Embedding);
    assert_eq!(out.stats.discovery.levels_attempted, 1);
    assert_eq!(out.stats.threshold, Some(0.35));

    // insurance is always excluded; everything else clears 0.35
    assert_eq!(out.companies.len(), 4);
    assert_eq!(out.stats.filtered, 1);
    assert!(out.companies.iter().all(|c| c.company.name != "Lone Star Mutual"));

    // hiring boost lifts the two companies with open roles to the top
    let top: Vec<&str> = out.companies.iter().take(2).map(|c| c.company.name.as_str()).collect();
    assert!(top.contains(&"Bluebonnet Air") && top.contains(&"Zilker Energy"), "got {top:?}");
    for c in &out.companies {
        let s = c.semantic.as_ref().expect("scored");
        assert!((0.0..=1.0).contains(&s.final_score));
    }

    let runs = h.store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].outcome, RunOutcome::Completed);
    assert_eq!(runs[0].id, out.stats.run_id);
    assert_eq!(runs[0].result_count, 4);
    assert_eq!(runs[0].occupations[0].code, "17-2141.00");
    assert_eq!(h.store.company_count(), 5);

    assert_eq!(
        h.telemetry
            .count(|e| matches!(e, PipelineEvent::PipelineFinished { companies: 4, .. })),
        1
    );
}

#[tokio::test]
async fn exhausted_search_is_recorded_as_no_results() {
    let h = harness(
        engineering_provider(),
        Arc::new(ScriptedDiscoveryProvider::new("scripted", vec![])),
    );

    let err = h.pipeline.discover(&thermal_course()).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoResults { .. }), "got {err:?}");
    assert_eq!(err.public_message(), "No companies found for this course.");

    let runs = h.store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].outcome, RunOutcome::NoResults);
    assert_eq!(runs[0].levels_attempted, 5);
    assert!(runs[0].domain.is_some());
}

#[tokio::test]
async fn no_occupation_provider_fails_before_discovery() {
    let discovery = Arc::new(ScriptedDiscoveryProvider::new("scripted", vec![Ok(austin_companies())]));
    let h = harness(
        Arc::new(StaticOccupationProvider::new("down", 1.0, vec![]).unhealthy()),
        discovery.clone(),
    );

    let err = h.pipeline.discover(&thermal_course()).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoOccupationProviders), "got {err:?}");
    assert!(discovery.filters_seen().is_empty());
    assert_eq!(h.store.runs()[0].outcome, RunOutcome::Failed);
}

#[tokio::test]
async fn same_course_gets_the_same_search_variation() {
    let a = Arc::new(ScriptedDiscoveryProvider::new("scripted", vec![Ok(austin_companies())]));
    let b = Arc::new(ScriptedDiscoveryProvider::new("scripted", vec![Ok(austin_companies())]));
    harness(engineering_provider(), a.clone())
        .pipeline
        .discover(&thermal_course())
        .await
        .unwrap();
    harness(engineering_provider(), b.clone())
        .pipeline
        .discover(&thermal_course())
        .await
        .unwrap();

    let (fa, fb) = (&a.filters_seen()[0], &b.filters_seen()[0]);
    assert_eq!(fa.employee_ranges, fb.employee_ranges);
    assert_eq!(fa.contact_titles, fb.contact_titles);
    assert!(fa.industry_keywords.iter().any(|k| k == "mechanical engineering"));
}
