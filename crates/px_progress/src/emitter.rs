use std::sync::Mutex;

use px_core::{AnalysisResult, ProgressEvent, ProgressUpdate};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Default)]
struct EmitterState {
    /// Highest percent sent so far
    last_percent: u8,
    /// Set once the terminal event went out
    finished: bool,
}

/// Sending half of a run's event channel.
///
/// Percentages never go backwards, progress after the terminal event is
/// dropped, and only the first terminal event is delivered. The channel
/// closes when the last emitter is dropped, which is the end-of-stream
/// marker for the consumer.
#[derive(Debug)]
pub struct Emitter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    state: Mutex<EmitterState>,
}

impl Emitter {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            tx,
            state: Mutex::new(EmitterState::default()),
        }
    }

    /// Creates an emitter and the receiver for its events.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Sends a progress update, raising its percent to the last one sent if
    /// needed. Returns false when the update was dropped.
    pub fn progress(&self, mut update: ProgressUpdate) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.finished {
            debug!("Dropping progress after terminal event: {}", update.message);
            return false;
        }
        update.percent = update.percent.max(state.last_percent).min(100);
        state.last_percent = update.percent;
        self.send(ProgressEvent::Progress(update))
    }

    pub fn complete(&self, result: AnalysisResult) -> bool {
        self.finish(ProgressEvent::Result { data: result })
    }

    pub fn fail(&self, detail: impl Into<String>) -> bool {
        self.finish(ProgressEvent::Error {
            detail: detail.into(),
        })
    }

    fn finish(&self, event: ProgressEvent) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.finished {
            return false;
        }
        state.finished = true;
        self.send(event)
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().map(|s| s.finished).unwrap_or(true)
    }

    pub fn last_percent(&self) -> u8 {
        self.state.lock().map(|s| s.last_percent).unwrap_or_default()
    }

    fn send(&self, event: ProgressEvent) -> bool {
        // A closed channel means the consumer went away; the run goes on.
        self.tx.send(event).is_ok()
    }
}
