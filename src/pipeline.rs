// src/pipeline.rs
//! End-to-end `discover(course)`:
//! skills → occupations → domain → cascading discovery → exclusion + ranking.
//!
//! Provider failures are absorbed by the stage that fanned out. Only
//! `NoOccupationProviders`, `NoResults` and configuration gaps reach the caller.

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;

use crate::clock::SharedClock;
use crate::config::MatcherConfig;
use crate::discovery::{
    self, anon_hash, CourseContext, DiscoveryOrchestrator, DiscoveryProvider, DiscoveryStats,
    HaversineGeo,
};
use crate::domain::{self, CourseDomainClassification};
use crate::error::{PipelineError, PipelineResult};
use crate::exclusion::{ExclusionContext, IndustryExclusionEngine};
use crate::occupations::{self, CoordinatedOccupation, OccupationCoordinator, OccupationProvider};
use crate::ranking::{
    CourseProfile, EmbeddingProvider, OpenAiEmbeddings, RankedCompany, SimilarityMethod,
    SimilarityRanker,
};
use crate::skills::{ExtractedSkill, SkillExtractor};
use crate::store::{
    GenerationRun, InMemoryStore, OccupationSnapshot, RunOutcome, SharedStore, StageTimings,
};
use crate::telemetry::{PipelineEvent, SharedTelemetry};

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub run_id: String,
    pub skills_extracted: usize,
    pub skills_inferred_from_title: bool,
    pub occupation_providers: Vec<String>,
    pub unmapped_skills: Vec<String>,
    pub domain: CourseDomainClassification,
    pub discovery: DiscoveryStats,
    pub threshold: Option<f32>,
    pub similarity_method: SimilarityMethod,
    pub ranking_skipped: bool,
    pub filtered: usize,
    pub timings: StageTimings,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub companies: Vec<RankedCompany>,
    pub skills: Vec<ExtractedSkill>,
    pub occupations: Vec<CoordinatedOccupation>,
    pub stats: PipelineStats,
}

pub struct SponsorPipeline {
    extractor: SkillExtractor,
    coordinator: OccupationCoordinator,
    ranker: SimilarityRanker,
    discovery: DiscoveryOrchestrator,
    store: Option<SharedStore>,
    clock: SharedClock,
    telemetry: SharedTelemetry,
}

/// Everything needed to assemble a pipeline; the external seams are explicit.
pub struct PipelineParts {
    pub occupation_providers: Vec<Arc<dyn OccupationProvider>>,
    pub discovery_providers: Vec<Arc<dyn DiscoveryProvider>>,
    pub embeddings: Option<Arc<dyn EmbeddingProvider>>,
    pub store: Option<SharedStore>,
    pub clock: SharedClock,
    pub telemetry: SharedTelemetry,
}

fn elapsed_ms(t: Instant) -> u64 {
    u64::try_from(t.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn run_id(course: &CourseContext, started: chrono::DateTime<chrono::Utc>) -> String {
    let mut h = Sha256::new();
    h.update(course.seed().to_be_bytes());
    h.update(started.to_rfc3339().as_bytes());
    h.finalize().iter().take(8).map(|b| format!("{b:02x}")).collect()
}

impl SponsorPipeline {
    pub fn new(cfg: &MatcherConfig, parts: PipelineParts) -> Self {
        let coordinator = OccupationCoordinator::new(
            parts.occupation_providers,
            cfg.occupations.per_call_timeout_secs,
            cfg.occupations.top_n,
            parts.telemetry.clone(),
        );
        let ranker = SimilarityRanker::new(
            cfg.ranking.clone(),
            Arc::new(IndustryExclusionEngine::new(cfg.exclusion.clone())),
            parts.embeddings,
            parts.clock.clone(),
            parts.telemetry.clone(),
        );
        let discovery = DiscoveryOrchestrator::new(
            parts.discovery_providers,
            cfg.discovery.clone(),
            Arc::new(HaversineGeo::new(&cfg.geo)),
            parts.store.clone(),
            parts.clock.clone(),
            parts.telemetry.clone(),
        );
        Self {
            extractor: SkillExtractor::default(),
            coordinator,
            ranker,
            discovery,
            store: parts.store,
            clock: parts.clock,
            telemetry: parts.telemetry,
        }
    }

    /// Production wiring: built-in providers, OpenAI-compatible embeddings
    /// when a key resolves, and the in-memory store.
    pub fn from_config(cfg: &MatcherConfig, clock: SharedClock, telemetry: SharedTelemetry) -> Result<Self> {
        let occupation_providers = occupations::build_providers(&cfg.occupations, clock.clone())?;
        let discovery_providers = discovery::build_providers(&cfg.discovery);
        let embeddings = OpenAiEmbeddings::from_config(&cfg.ranking, clock.clone())
            .map(|e| Arc::new(e) as Arc<dyn EmbeddingProvider>);
        if embeddings.is_none() {
            tracing::info!("embedding similarity disabled, keyword similarity only");
        }
        Ok(Self::new(
            cfg,
            PipelineParts {
                occupation_providers,
                discovery_providers,
                embeddings,
                store: Some(Arc::new(InMemoryStore::new())),
                clock,
                telemetry,
            },
        ))
    }

    pub async fn discover(&self, course: &CourseContext) -> PipelineResult<PipelineOutcome> {
        let t0 = Instant::now();
        let started = self.clock.now();
        let id = run_id(course, started);
        let course_hash = anon_hash(&format!("{}|{}", course.title, course.level.as_deref().unwrap_or_default()));
        let mut run = GenerationRun {
            id: id.clone(),
            course_hash: course_hash.clone(),
            started_at: started,
            finished_at: started,
            skills: Vec::new(),
            occupations: Vec::new(),
            domain: None,
            threshold: None,
            timings: StageTimings::default(),
            levels_attempted: 0,
            result_count: 0,
            company_keys: Vec::new(),
            outcome: RunOutcome::Failed,
        };
        tracing::info!(run = %id, course = %course_hash, outcomes = course.outcomes.len(), "discover started");

        // skills
        let t = Instant::now();
        let texts: Vec<String> = course.outcomes.iter().chain(course.topics.iter()).cloned().collect();
        let title = Some(course.title.as_str()).filter(|t| !t.trim().is_empty());
        let extraction = self.extractor.extract(&texts, title, course.level.as_deref());
        run.timings.skills_ms = elapsed_ms(t);
        run.skills = extraction.skills.iter().map(|s| s.name.clone()).collect();
        tracing::info!(
            skills = extraction.skills.len(),
            inferred = extraction.inferred_from_title,
            "skills extracted"
        );

        // occupations
        let t = Instant::now();
        let coordination = match self.coordinator.coordinate(&extraction.skills).await {
            Ok(c) => c,
            Err(e) => return Err(self.fail(run, e).await),
        };
        run.timings.occupations_ms = elapsed_ms(t);
        run.occupations = coordination
            .occupations
            .iter()
            .map(|o| OccupationSnapshot {
                code: o.occupation.code.clone(),
                title: o.occupation.title.clone(),
                consensus_score: o.consensus_score,
                providers: o.providers.clone(),
            })
            .collect();

        // domain
        let classification = domain::classify(&coordination.occupations);
        self.telemetry.record(PipelineEvent::DomainClassified {
            domain: classification.domain.as_str(),
            confidence: classification.confidence,
        });
        tracing::debug!(reasoning = %classification.reasoning, "domain reasoning");
        run.domain = Some(classification.clone());
        let ctx = ExclusionContext::new(
            classification.domain,
            domain::dominant_soc_major(&coordination.occupations),
        );

        // discovery
        let t = Instant::now();
        let found = match self
            .discovery
            .discover(
                course.location.as_deref(),
                &coordination.occupations,
                classification.domain,
                course.seed(),
            )
            .await
        {
            Ok(f) => f,
            Err(e) => {
                run.timings.discovery_ms = elapsed_ms(t);
                return Err(self.fail(run, e).await);
            }
        };
        run.timings.discovery_ms = elapsed_ms(t);
        run.levels_attempted = found.stats.levels_attempted;

        // ranking
        let t = Instant::now();
        let profile = CourseProfile::new(extraction.skills.clone(), coordination.occupations.clone());
        let ranked = self.ranker.rank(&profile, found.companies, &ctx).await;
        run.timings.ranking_ms = elapsed_ms(t);

        let total_ms = elapsed_ms(t0);
        run.threshold = ranked.threshold;
        run.result_count = ranked.kept.len();
        run.company_keys = ranked.kept.iter().map(|r| r.company.key()).collect();
        run.outcome = RunOutcome::Completed;
        run.finished_at = self.clock.now();
        self.record_run(&run).await;

        self.telemetry.record(PipelineEvent::PipelineFinished {
            companies: ranked.kept.len(),
            ms: total_ms,
        });
        tracing::info!(
            run = %id,
            kept = ranked.kept.len(),
            filtered = ranked.filtered.len(),
            ms = total_ms,
            "run complete"
        );

        Ok(PipelineOutcome {
            stats: PipelineStats {
                run_id: id,
                skills_extracted: extraction.skills.len(),
                skills_inferred_from_title: extraction.inferred_from_title,
                occupation_providers: coordination.providers_succeeded.clone(),
                unmapped_skills: coordination.unmapped_skills.clone(),
                domain: classification,
                discovery: found.stats,
                threshold: ranked.threshold,
                similarity_method: ranked.method,
                ranking_skipped: ranked.skipped,
                filtered: ranked.filtered.len(),
                timings: run.timings,
                total_ms,
            },
            companies: ranked.kept,
            skills: extraction.skills,
            occupations: coordination.occupations,
        })
    }

    async fn fail(&self, mut run: GenerationRun, err: PipelineError) -> PipelineError {
        run.outcome = match &err {
            PipelineError::NoResults { levels_attempted } => {
                run.levels_attempted = *levels_attempted;
                RunOutcome::NoResults
            }
            _ => RunOutcome::Failed,
        };
        run.finished_at = self.clock.now();
        tracing::warn!(run = %run.id, error = %err, "discover failed");
        self.record_run(&run).await;
        err
    }

    async fn record_run(&self, run: &GenerationRun) {
        if let Some(store) = &self.store {
            if let Err(e) = store.record_generation_run(run).await {
                tracing::warn!(run = %run.id, error = %e, "generation run not recorded");
            }
        }
    }
}
