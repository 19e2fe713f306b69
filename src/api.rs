// src/api.rs
//! Thin HTTP surface over [`SponsorPipeline`] for the enclosing request layer.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::discovery::CourseContext;
use crate::error::PipelineError;
use crate::metrics::Metrics;
use crate::pipeline::{PipelineOutcome, SponsorPipeline};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SponsorPipeline>,
}

impl AppState {
    pub fn new(pipeline: SponsorPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Router with `/health` and `/discover`; `/metrics` is merged in when a
/// recorder handle is supplied.
pub fn create_router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/discover", post(discover))
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    match metrics {
        Some(m) => router.merge(m.router()),
        None => router,
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = match &self {
            PipelineError::NoResults { .. } => StatusCode::NOT_FOUND,
            PipelineError::NoOccupationProviders | PipelineError::Configuration(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            PipelineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

async fn discover(
    State(state): State<AppState>,
    Json(course): Json<CourseContext>,
) -> Result<Json<PipelineOutcome>, PipelineError> {
    let outcome = state.pipeline.discover(&course).await?;
    Ok(Json(outcome))
}
