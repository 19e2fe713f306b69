// src/exclusion.rs
//! Two-tier industry exclusion.
//!
//! Hard terms (insurance, legal, gambling, ...) always exclude with
//! penalty 1.0. Soft terms (staffing, recruiting, ...) are resolved by course
//! domain; hybrid courses fall through to a job-posting heuristic. A separate
//! mild penalty applies to missing or generic industry labels.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ExclusionConfig;
use crate::domain::CourseDomain;

/// Hard-excluded sectors always carry the full penalty.
pub const HARD_PENALTY: f32 = 1.0;

/// Terms up to this length need word boundaries ("hr", "law").
const SHORT_TERM_MAX: usize = 4;

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionTier {
    None,
    Hard,
    Soft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionDecision {
    pub should_exclude: bool,
    pub penalty: f32,
    pub tier: ExclusionTier,
    pub matched_term: Option<String>,
    pub reason: String,
}

impl ExclusionDecision {
    fn pass(reason: impl Into<String>) -> Self {
        Self {
            should_exclude: false,
            penalty: 0.0,
            tier: ExclusionTier::None,
            matched_term: None,
            reason: reason.into(),
        }
    }
}

/// What the engine knows about the course.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExclusionContext {
    pub domain: Option<CourseDomain>,
    /// SOC major of the dominant occupation ("13"), for hybrid courses.
    pub dominant_soc_major: Option<String>,
}

impl ExclusionContext {
    pub fn new(domain: CourseDomain, dominant_soc_major: Option<String>) -> Self {
        Self {
            domain: Some(domain),
            dominant_soc_major,
        }
    }

    fn domain(&self) -> CourseDomain {
        self.domain.unwrap_or(CourseDomain::Unknown)
    }
}

struct Term {
    text: String,
    re: Regex,
}

fn compile_terms(terms: &[String]) -> Vec<Term> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .filter_map(|t| {
            let escaped = regex::escape(&t);
            let pat = if t.chars().count() <= SHORT_TERM_MAX {
                format!(r"\b{escaped}\b")
            } else {
                escaped
            };
            match Regex::new(&pat) {
                Ok(re) => Some(Term { text: t, re }),
                Err(e) => {
                    tracing::warn!(term = %t, error = %e, "skipping exclusion term");
                    None
                }
            }
        })
        .collect()
}

fn first_match<'a>(terms: &'a [Term], text: &str) -> Option<&'a Term> {
    terms.iter().find(|t| t.re.is_match(text))
}

pub struct IndustryExclusionEngine {
    hard: Vec<Term>,
    soft: Vec<Term>,
    legit_roles: Vec<Term>,
    recruiting_roles: Vec<Term>,
    cfg: ExclusionConfig,
}

impl Default for IndustryExclusionEngine {
    fn default() -> Self {
        Self::new(ExclusionConfig::default())
    }
}

impl IndustryExclusionEngine {
    pub fn new(cfg: ExclusionConfig) -> Self {
        Self {
            hard: compile_terms(&cfg.hard_terms),
            soft: compile_terms(&cfg.soft_terms),
            legit_roles: compile_terms(&cfg.legit_role_titles),
            recruiting_roles: compile_terms(&cfg.recruiting_role_titles),
            cfg,
        }
    }

    /// Decide for one candidate. `sector` is the declared industry text
    /// (industry plus any sector keywords); `job_titles` are its open roles.
    pub fn evaluate(
        &self,
        sector: Option<&str>,
        job_titles: &[String],
        ctx: &ExclusionContext,
    ) -> ExclusionDecision {
        let Some(sector) = sector.map(normalize_sector).filter(|s| !s.is_empty()) else {
            return ExclusionDecision::pass("no sector declared");
        };

        if let Some(term) = first_match(&self.hard, &sector) {
            return ExclusionDecision {
                should_exclude: true,
                penalty: HARD_PENALTY,
                tier: ExclusionTier::Hard,
                matched_term: Some(term.text.clone()),
                reason: format!("'{}' is an always-excluded industry", term.text),
            };
        }

        let Some(term) = first_match(&self.soft, &sector) else {
            return ExclusionDecision::pass("sector not on any exclusion list");
        };
        let matched = Some(term.text.clone());
        let soft_fail = |reason: String| ExclusionDecision {
            should_exclude: true,
            penalty: self.cfg.soft_penalty,
            tier: ExclusionTier::Soft,
            matched_term: matched.clone(),
            reason,
        };
        let soft_pass = |penalty: f32, reason: String| ExclusionDecision {
            should_exclude: false,
            penalty,
            tier: ExclusionTier::Soft,
            matched_term: matched.clone(),
            reason,
        };

        match ctx.domain() {
            CourseDomain::BusinessManagement => soft_pass(
                0.0,
                format!("'{}' is a target industry for business courses", term.text),
            ),
            CourseDomain::EngineeringTechnical
            | CourseDomain::ComputerTech
            | CourseDomain::HealthcareScience => soft_fail(format!(
                "'{}' is off-target for {} courses",
                term.text,
                ctx.domain()
            )),
            CourseDomain::Unknown => soft_fail(format!(
                "'{}' excluded while the course domain is unknown",
                term.text
            )),
            CourseDomain::Hybrid => {
                let business_led = ctx
                    .dominant_soc_major
                    .as_deref()
                    .is_some_and(|m| self.cfg.business_soc_majors.iter().any(|b| b == m));
                if business_led {
                    return soft_pass(
                        0.0,
                        format!("hybrid course led by business occupations; '{}' allowed", term.text),
                    );
                }
                let (legit, recruiting) = self.count_roles(job_titles);
                if legit >= 1 && legit >= recruiting {
                    soft_pass(
                        self.cfg.hybrid_pass_penalty,
                        format!("'{}' but {legit} project-relevant roles vs {recruiting} recruiting roles", term.text),
                    )
                } else {
                    soft_fail(format!(
                        "'{}' with {legit} project-relevant roles vs {recruiting} recruiting roles",
                        term.text
                    ))
                }
            }
        }
    }

    /// (legitimate project roles, recruiting roles). A title that matches the
    /// recruiting list counts only as recruiting.
    pub fn count_roles(&self, job_titles: &[String]) -> (usize, usize) {
        let mut legit = 0;
        let mut recruiting = 0;
        for title in job_titles {
            let t = title.to_lowercase();
            if first_match(&self.recruiting_roles, &t).is_some() {
                recruiting += 1;
            } else if first_match(&self.legit_roles, &t).is_some() {
                legit += 1;
            }
        }
        (legit, recruiting)
    }

    /// Mild ranking penalty for a missing or generic industry label.
    pub fn generic_industry_penalty(&self, industry: Option<&str>) -> f32 {
        match industry.map(normalize_sector) {
            None => self.cfg.unknown_industry_penalty,
            Some(s) if s.is_empty() => self.cfg.unknown_industry_penalty,
            Some(s) if self.cfg.generic_industries.iter().any(|g| g.eq_ignore_ascii_case(&s)) => {
                self.cfg.generic_industry_penalty
            }
            Some(_) => 0.0,
        }
    }

    /// Penalty the ranker applies: the exclusion penalty and the generic
    /// industry penalty combine by max.
    pub fn ranking_penalty(&self, decision: &ExclusionDecision, industry: Option<&str>) -> f32 {
        decision
            .penalty
            .max(self.generic_industry_penalty(industry))
            .clamp(0.0, 1.0)
    }
}

fn normalize_sector(s: &str) -> String {
    WS_RE.replace_all(s.trim(), " ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(d: CourseDomain) -> ExclusionContext {
        ExclusionContext::new(d, None)
    }

    #[test]
    fn hard_tier_ignores_configured_penalties() {
        let cfg = crate::config::MatcherConfig::from_toml_str(
            "[exclusion]\nhard_penalty = 0.5\nsoft_penalty = 0.2\n",
        )
        .unwrap();
        let e = IndustryExclusionEngine::new(cfg.exclusion);
        let dec = e.evaluate(Some("Legal Services"), &[], &ctx(CourseDomain::BusinessManagement));
        assert_eq!(dec.tier, ExclusionTier::Hard);
        assert_eq!(dec.penalty, 1.0);

        let soft = e.evaluate(Some("Staffing"), &[], &ctx(CourseDomain::ComputerTech));
        assert!((soft.penalty - 0.2).abs() < 1e-6);
    }

    #[test]
    fn insurance_is_hard_excluded_for_every_domain() {
        let e = IndustryExclusionEngine::default();
        for d in [
            CourseDomain::BusinessManagement,
            CourseDomain::EngineeringTechnical,
            CourseDomain::ComputerTech,
            CourseDomain::HealthcareScience,
            CourseDomain::Hybrid,
            CourseDomain::Unknown,
        ] {
            let r = e.evaluate(Some("Property & Casualty Insurance"), &[], &ctx(d));
            assert!(r.should_exclude);
            assert_eq!(r.penalty, 1.0);
            assert_eq!(r.tier, ExclusionTier::Hard);
        }
    }

    #[test]
    fn short_terms_need_word_boundaries() {
        let e = IndustryExclusionEngine::default();
        let r = e.evaluate(Some("Lawn & Garden Equipment"), &[], &ctx(CourseDomain::ComputerTech));
        assert!(!r.should_exclude);
        let r = e.evaluate(Some("HR Tech"), &[], &ctx(CourseDomain::ComputerTech));
        assert!(r.should_exclude);
        assert_eq!(r.matched_term.as_deref(), Some("hr"));
    }

    #[test]
    fn staffing_depends_on_domain() {
        let e = IndustryExclusionEngine::default();
        let r = e.evaluate(Some("Staffing and Recruiting"), &[], &ctx(CourseDomain::BusinessManagement));
        assert!(!r.should_exclude);
        assert_eq!(r.penalty, 0.0);
        let r = e.evaluate(Some("Staffing and Recruiting"), &[], &ctx(CourseDomain::ComputerTech));
        assert!(r.should_exclude);
        assert!((r.penalty - 0.8).abs() < 1e-6);
        let r = e.evaluate(Some("Staffing and Recruiting"), &[], &ctx(CourseDomain::Unknown));
        assert!(r.should_exclude);
    }

    #[test]
    fn hybrid_uses_job_postings() {
        let e = IndustryExclusionEngine::default();
        let hybrid = ctx(CourseDomain::Hybrid);
        let jobs: Vec<String> = vec!["Software Engineer".into(), "Technical Recruiter".into()];
        let r = e.evaluate(Some("IT outsourcing"), &jobs, &hybrid);
        assert!(!r.should_exclude);
        assert!((r.penalty - 0.3).abs() < 1e-6);

        let jobs: Vec<String> = vec!["Recruiter".into(), "Sourcing Specialist".into()];
        let r = e.evaluate(Some("IT outsourcing"), &jobs, &hybrid);
        assert!(r.should_exclude);
        assert!((r.penalty - 0.8).abs() < 1e-6);

        let business = ExclusionContext::new(CourseDomain::Hybrid, Some("13".into()));
        let r = e.evaluate(Some("IT outsourcing"), &[], &business);
        assert!(!r.should_exclude);
        assert_eq!(r.penalty, 0.0);
    }

    #[test]
    fn generic_industry_penalty_combines_by_max() {
        let e = IndustryExclusionEngine::default();
        assert!((e.generic_industry_penalty(None) - 0.15).abs() < 1e-6);
        assert!((e.generic_industry_penalty(Some("  Services ")) - 0.10).abs() < 1e-6);
        assert_eq!(e.generic_industry_penalty(Some("Aerospace")), 0.0);

        let d = e.evaluate(Some("Other"), &[], &ctx(CourseDomain::ComputerTech));
        assert!((e.ranking_penalty(&d, Some("Other")) - 0.10).abs() < 1e-6);
        let d = e.evaluate(Some("Insurance"), &[], &ctx(CourseDomain::ComputerTech));
        assert_eq!(e.ranking_penalty(&d, Some("Insurance")), 1.0);
    }
}
