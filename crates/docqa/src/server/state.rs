//! Application state for the HTTP server

use std::sync::Arc;

use crate::pipeline::Pipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Wrap a pipeline for sharing across handlers
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// The pipeline behind every route
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Owned handle for work that must outlive a request
    pub fn shared_pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&self.pipeline)
    }

    /// Whether `/ask` is answered from a published index
    pub fn is_ready(&self) -> bool {
        self.pipeline.is_serving()
    }
}
