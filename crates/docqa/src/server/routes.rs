//! API route handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::pipeline::{IndexReport, PipelineState, PipelineStatus};
use crate::server::state::AppState;
use crate::types::{Answer, AskRequest};

/// Response for `POST /reindex`
#[derive(Debug, Serialize)]
pub struct ReindexResponse {
    /// State after the build
    pub status: PipelineState,
    /// Distinct documents now indexed
    pub indexed_documents: usize,
    /// Build details
    pub report: IndexReport,
}

/// `POST /ask`
pub async fn ask(State(state): State<AppState>, Json(request): Json<AskRequest>) -> Result<Json<Answer>> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(Error::InvalidRequest("question must not be empty".to_string()));
    }
    if request.top_k == Some(0) {
        return Err(Error::InvalidRequest("top_k must be positive".to_string()));
    }

    tracing::info!("Question received (top_k={:?})", request.top_k);
    let answer = state.pipeline().answer(question, request.top_k).await?;
    Ok(Json(answer))
}

/// `POST /reindex`
///
/// The build runs on its own task, so a client that disconnects does not
/// cancel it.
pub async fn reindex(State(state): State<AppState>) -> Result<Json<ReindexResponse>> {
    let pipeline = state.shared_pipeline();
    let report = tokio::spawn(async move { pipeline.build_index().await })
        .await
        .map_err(|e| Error::Internal(format!("index build task failed: {}", e)))??;

    Ok(Json(ReindexResponse {
        status: state.pipeline().state(),
        indexed_documents: report.indexed_documents,
        report,
    }))
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Json<PipelineStatus> {
    Json(state.pipeline().status())
}
