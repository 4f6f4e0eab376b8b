//! Ingestion and query orchestration

mod orchestrator;

pub use orchestrator::{IndexReport, Pipeline, PipelineState, PipelineStatus};
