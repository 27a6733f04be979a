pub mod chat;
pub mod classify;
pub mod orchestrator;
pub mod synthesis;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use chat::{ChatRequest, ChatService, NO_CONTEXT_ANSWER};
pub use classify::{lane_ranges, ClassificationOutcome, Classifier};
pub use orchestrator::Pipeline;
pub use synthesis::{detect_omissions, synthesize};

/// Sizing for the classification stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Inference calls allowed in flight at once, across all lanes.
    pub concurrency: usize,
    /// Number of index partitions of an article batch. Each lane is served
    /// by its own model handle.
    pub lanes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            lanes: 2,
        }
    }
}

pub mod prelude {
    pub use super::{ChatRequest, ChatService, ClassificationOutcome, Classifier, Pipeline, PipelineConfig};
    pub use px_core::{AnalysisResult, Error, Result};
}
