// tests/ranking_exclusion.rs
//
// Adaptive threshold, industry exclusion and the embedding fallback path.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use sponsor_match::config::{ExclusionConfig, RankingConfig};
use sponsor_match::domain::{self, CourseDomain};
use sponsor_match::exclusion::{ExclusionContext, IndustryExclusionEngine};
use sponsor_match::occupations::CoordinatedOccupation;
use sponsor_match::ranking::{CourseProfile, EmbeddingProvider, SimilarityMethod, SimilarityRanker};
use sponsor_match::skills::{ExtractedSkill, SkillCategory};
use sponsor_match::telemetry::{PipelineEvent, SharedTelemetry};
use sponsor_match::testing::{
    company, occupation, FailingEmbeddings, FixedSimilarity, ManualClock, RecordingTelemetry,
};
use sponsor_match::DiscoveredCompany;

fn profile() -> CourseProfile {
    let occ = occupation("17-2141.00", "Mechanical Engineers", 0.9, &["Heat Transfer"]);
    CourseProfile::new(
        vec![ExtractedSkill::new("Heat Transfer", SkillCategory::Technical, 0.85, "outcome")],
        vec![CoordinatedOccupation {
            occupation: occ,
            consensus_score: 0.8,
            providers: vec!["static".into()],
            avg_match_score: 0.9,
            avg_confidence: 0.8,
        }],
    )
}

fn pool(n: usize) -> Vec<DiscoveredCompany> {
    (0..n)
        .map(|i| company(&format!("Thermal Works {i}"), "Austin, TX", "mechanical engineering", &[]))
        .collect()
}

fn ranker(embeddings: Arc<dyn EmbeddingProvider>, telemetry: SharedTelemetry) -> SimilarityRanker {
    SimilarityRanker::new(
        RankingConfig::default(),
        Arc::new(IndustryExclusionEngine::default()),
        Some(embeddings),
        Arc::new(ManualClock::default()),
        telemetry,
    )
}

#[tokio::test]
async fn adaptive_threshold_follows_pool_size() {
    let rec = Arc::new(RecordingTelemetry::default());
    let r = ranker(Arc::new(FixedSimilarity(0.55)), rec.clone());
    let ctx = ExclusionContext::new(CourseDomain::EngineeringTechnical, Some("17".into()));

    let big = r.rank(&profile(), pool(25), &ctx).await;
    assert_eq!(big.threshold, Some(0.50));
    assert_eq!(big.kept.len(), 25);
    assert_eq!(big.method, SimilarityMethod::Embedding);

    let small = r.rank(&profile(), pool(4), &ctx).await;
    assert_eq!(small.threshold, Some(0.35));
    assert_eq!(small.kept.len(), 4);

    let thresholds: Vec<f32> = rec
        .events()
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::ThresholdSelected { threshold, .. } => Some(threshold),
            _ => None,
        })
        .collect();
    assert_eq!(thresholds, vec![0.50, 0.35]);
}

#[test]
fn staffing_depends_on_course_domain() {
    let engine = IndustryExclusionEngine::new(ExclusionConfig::default());

    let business = engine.evaluate(
        Some("Staffing and Recruiting"),
        &[],
        &ExclusionContext::new(CourseDomain::BusinessManagement, Some("13".into())),
    );
    assert!(!business.should_exclude);
    assert_eq!(business.penalty, 0.0);

    let tech = engine.evaluate(
        Some("Staffing and Recruiting"),
        &[],
        &ExclusionContext::new(CourseDomain::ComputerTech, Some("15".into())),
    );
    assert!(tech.should_exclude);
    assert!((tech.penalty - 0.8).abs() < 1e-6);
}

#[test]
fn hybrid_staffing_follows_the_top_occupation() {
    let occ = |code: &str, consensus: f32, confidence: f32| CoordinatedOccupation {
        occupation: occupation(code, code, 0.8, &[]),
        consensus_score: consensus,
        providers: vec!["static".into()],
        avg_match_score: 0.8,
        avg_confidence: confidence,
    };
    // computer-led course with two weaker business occupations behind it
    let occs = vec![
        occ("15-1252.00", 0.9, 0.6),
        occ("13-1111.00", 0.5, 0.35),
        occ("13-1161.00", 0.5, 0.35),
    ];
    let ctx = ExclusionContext::new(CourseDomain::Hybrid, domain::dominant_soc_major(&occs));
    assert_eq!(ctx.dominant_soc_major.as_deref(), Some("15"));

    let engine = IndustryExclusionEngine::default();
    let dec = engine.evaluate(Some("Staffing and Recruiting"), &[], &ctx);
    assert!(dec.should_exclude, "{}", dec.reason);
    assert!(dec.penalty > 0.0);
}

#[test]
fn insurance_is_excluded_for_every_domain() {
    let engine = IndustryExclusionEngine::default();
    for d in [
        CourseDomain::BusinessManagement,
        CourseDomain::EngineeringTechnical,
        CourseDomain::ComputerTech,
        CourseDomain::HealthcareScience,
        CourseDomain::Hybrid,
        CourseDomain::Unknown,
    ] {
        let dec = engine.evaluate(Some("Insurance"), &[], &ExclusionContext::new(d, None));
        assert!(dec.should_exclude, "{d}");
        assert_eq!(dec.penalty, 1.0, "{d}");
    }
}

#[tokio::test]
async fn excluded_candidates_sink_below_threshold() {
    let r = ranker(Arc::new(FixedSimilarity(0.9)), sponsor_match::telemetry::noop());
    let ctx = ExclusionContext::new(CourseDomain::EngineeringTechnical, Some("17".into()));
    let mut candidates = pool(3);
    candidates.push(company("Lone Star Insurance", "Austin, TX", "insurance", &[]));

    let out = r.rank(&profile(), candidates, &ctx).await;
    assert_eq!(out.kept.len(), 3);
    assert_eq!(out.filtered.len(), 1);
    assert_eq!(out.filtered[0].company.name, "Lone Star Insurance");
    assert!(out.filtered[0].exclusion.should_exclude);
}

#[tokio::test]
async fn embedding_failures_fall_back_and_open_the_circuit() {
    let rec = Arc::new(RecordingTelemetry::default());
    let failing = Arc::new(FailingEmbeddings::default());
    let r = ranker(failing.clone(), rec.clone());
    let ctx = ExclusionContext::new(CourseDomain::EngineeringTechnical, None);

    for _ in 0..4 {
        let out = r.rank(&profile(), pool(2), &ctx).await;
        assert_eq!(out.method, SimilarityMethod::Keyword);
        assert!(out
            .kept
            .iter()
            .chain(out.filtered.iter())
            .all(|c| c.semantic.as_ref().is_some_and(|s| (0.0..=1.0).contains(&s.final_score))));
    }

    // default threshold is 3 failures; the fourth call is short-circuited
    assert_eq!(failing.attempts.load(Ordering::SeqCst), 3);
    assert!(r.breaker().is_open());
    assert_eq!(rec.count(|e| matches!(e, PipelineEvent::CircuitOpened { .. })), 1);
    assert_eq!(rec.count(|e| matches!(e, PipelineEvent::DegradedMode { .. })), 4);
}

#[tokio::test]
async fn empty_profile_skips_ranking() {
    let r = ranker(Arc::new(FixedSimilarity(0.1)), sponsor_match::telemetry::noop());
    let out = r
        .rank(&CourseProfile::default(), pool(3), &ExclusionContext::default())
        .await;
    assert!(out.skipped);
    assert_eq!(out.kept.len(), 3);
    assert_eq!(out.threshold, None);
}
