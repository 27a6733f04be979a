use std::sync::Arc;

use px_core::ResultCache;
use px_pipeline::{ChatService, Pipeline};
use px_progress::{ProgressStreamer, StreamerConfig};

pub struct AppState {
    pub pipeline: Pipeline,
    pub streamer: ProgressStreamer,
    pub chat: ChatService,
}

impl AppState {
    pub fn new(pipeline: Pipeline, chat: ChatService, streamer_config: StreamerConfig) -> Self {
        Self {
            streamer: ProgressStreamer::new(pipeline.clone(), streamer_config),
            pipeline,
            chat,
        }
    }

    pub fn store(&self) -> &Arc<dyn ResultCache> {
        self.pipeline.store()
    }
}
