//! Streams a pipeline run as progress events.

pub mod emitter;
pub mod streamer;

pub use emitter::Emitter;
pub use streamer::{EventStream, ProgressStreamer, StreamerConfig, ANALYSIS_MESSAGES};

pub mod prelude {
    pub use super::{Emitter, EventStream, ProgressStreamer, StreamerConfig};
    pub use px_core::{Phase, ProgressEvent, ProgressUpdate};
}
