// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod exclusion;
pub mod metrics;
pub mod occupations;
pub mod pipeline;
pub mod ranking;
pub mod skills;
pub mod store;
pub mod telemetry;

// Deterministic doubles for every external seam (providers, clock, telemetry).
pub mod testing;

mod http;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::MatcherConfig;
pub use crate::discovery::{CourseContext, DiscoveredCompany};
pub use crate::domain::{CourseDomain, CourseDomainClassification};
pub use crate::error::{PipelineError, ProviderError};
pub use crate::pipeline::{PipelineOutcome, PipelineParts, SponsorPipeline};
pub use crate::ranking::RankedCompany;
