// tests/skills_domain.rs
//
// Course text → skills → occupations → domain, with in-process providers.
//
// Covered:
// - thermal engineering outcome surfaces technical skills
// - re-extracting the same text does not inflate confidence past the cap
// - major-group-17 occupations classify as engineering_technical
// - split votes classify as hybrid

use std::sync::Arc;

use sponsor_match::domain::{self, CourseDomain};
use sponsor_match::occupations::{OccupationCoordinator, OccupationProvider};
use sponsor_match::skills::{merge_skill_sets, normalize_skill_name, SkillCategory, SkillExtractor, MAX_CONFIDENCE};
use sponsor_match::telemetry;
use sponsor_match::testing::{occupation, StaticOccupationProvider};

fn thermal_outcomes() -> Vec<String> {
    vec!["Apply fluid dynamics principles to analyze heat transfer in HVAC systems".to_string()]
}

#[test]
fn thermal_outcome_yields_technical_skills() {
    let r = SkillExtractor::default().extract(
        &thermal_outcomes(),
        Some("Thermal Systems Engineering"),
        None,
    );

    let hit = r
        .skills
        .iter()
        .find(|s| s.name == "Fluid Dynamics" || s.name == "Heat Transfer")
        .expect("fluid dynamics or heat transfer extracted");
    assert_eq!(hit.category, SkillCategory::Technical, "got {:?}", r.skills);

    for s in &r.skills {
        assert!((0.0..=1.0).contains(&s.confidence), "{} out of range", s.name);
        assert_eq!(normalize_skill_name(&s.name), s.name, "name not normalized");
    }
}

#[test]
fn repeated_extraction_is_stable_and_capped() {
    let ex = SkillExtractor::default();
    let once = ex.extract(&thermal_outcomes(), None, None).skills;
    let twice = merge_skill_sets(once.clone(), ex.extract(&thermal_outcomes(), None, None).skills);

    let mut a: Vec<_> = once.iter().map(|s| s.name.clone()).collect();
    let mut b: Vec<_> = twice.iter().map(|s| s.name.clone()).collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
    assert!(twice.iter().all(|s| s.confidence <= MAX_CONFIDENCE + 1e-6));
}

#[tokio::test]
async fn engineering_occupations_classify_as_engineering() {
    let skills = SkillExtractor::default()
        .extract(&thermal_outcomes(), Some("Thermal Systems Engineering"), None)
        .skills;

    let provider: Arc<dyn OccupationProvider> = Arc::new(StaticOccupationProvider::new(
        "static",
        1.0,
        vec![
            occupation("17-2141.00", "Mechanical Engineers", 0.9, &["Fluid Dynamics", "Heat Transfer"]),
            occupation("17-3027.00", "Mechanical Engineering Technologists", 0.7, &["HVAC"]),
        ],
    ));
    let coordinator = OccupationCoordinator::new(vec![provider], 5, 10, telemetry::noop());
    let result = coordinator.coordinate(&skills).await.expect("coordinated");

    let c = domain::classify(&result.occupations);
    assert_eq!(c.domain, CourseDomain::EngineeringTechnical);
    assert!((c.confidence - 1.0).abs() < 1e-6);
    assert_eq!(domain::dominant_soc_major(&result.occupations).as_deref(), Some("17"));
}

#[test]
fn hybrid_only_below_sixty_percent_share() {
    let hybrid = domain::classify_codes(&[("15-1252.00", 0.55), ("13-1111.00", 0.45)]);
    assert_eq!(hybrid.domain, CourseDomain::Hybrid);
    assert_eq!(hybrid.primary, Some(CourseDomain::ComputerTech));

    let clear = domain::classify_codes(&[("15-1252.00", 0.7), ("13-1111.00", 0.3)]);
    assert_eq!(clear.domain, CourseDomain::ComputerTech);
    assert!((clear.confidence - 0.7).abs() < 1e-4);
}
