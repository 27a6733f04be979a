use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use px_core::{
    AnalysisResult, Error, Phase, ProgressEvent, ProgressUpdate, Result, RetrievalProgress,
};
use px_pipeline::Pipeline;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::emitter::Emitter;

const DISCOVERY_START: u8 = 5;
const DISCOVERY_DONE: u8 = 15;
const SCRAPING_START: u8 = 15;
const SCRAPING_SPAN: usize = 45;
const SCRAPING_DONE: u8 = 60;
const ANALYSIS_START: u8 = 65;
const ANALYSIS_DONE: u8 = 95;

/// Status lines cycled through by analysis heartbeats.
pub const ANALYSIS_MESSAGES: &[&str] = &[
    "Classifying article bias...",
    "Reading between the lines...",
    "Synthesizing left-wing narrative...",
    "Synthesizing right-wing narrative...",
    "Generating comprehensive overview...",
    "Detecting omissions between narratives...",
    "Cross-referencing perspectives...",
    "Finalizing analysis...",
];

#[derive(Debug, Clone)]
pub struct StreamerConfig {
    pub heartbeat_interval: Duration,
    pub heartbeat_step: u8,
    /// Heartbeats never push the percent past this.
    pub heartbeat_ceiling: u8,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(3),
            heartbeat_step: 3,
            heartbeat_ceiling: 92,
        }
    }
}

/// Receiving half of a streamed run. Ends after the terminal event, once
/// the producing task has dropped its emitter.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl EventStream {
    pub fn new(rx: mpsc::UnboundedReceiver<ProgressEvent>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Maps `current` of `total` retrieved items onto the scraping range.
pub fn scraping_percent(current: usize, total: usize) -> u8 {
    if total == 0 {
        return SCRAPING_START;
    }
    let offset = SCRAPING_SPAN * current.min(total) / total;
    SCRAPING_START + offset as u8
}

/// Runs a pipeline on a background task and exposes its progress as events.
#[derive(Debug, Clone)]
pub struct ProgressStreamer {
    pipeline: Pipeline,
    config: StreamerConfig,
}

impl ProgressStreamer {
    pub fn new(pipeline: Pipeline, config: StreamerConfig) -> Self {
        Self { pipeline, config }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Starts a run. Dropping the returned stream stops delivery but not
    /// the run itself.
    pub fn start(&self, topic: &str) -> EventStream {
        let (emitter, rx) = Emitter::channel();
        let pipeline = self.pipeline.clone();
        let config = self.config.clone();
        let topic = topic.to_string();

        tokio::spawn(async move {
            let emitter = Arc::new(emitter);
            match run_phases(&pipeline, &config, &topic, &emitter).await {
                Ok(result) => {
                    emitter.complete(result);
                }
                Err(e) => {
                    warn!("Streamed analysis of '{}' failed: {}", topic, e);
                    emitter.fail(e.to_string());
                }
            }
        });

        EventStream::new(rx)
    }
}

async fn run_phases(
    pipeline: &Pipeline,
    config: &StreamerConfig,
    topic: &str,
    emitter: &Arc<Emitter>,
) -> Result<AnalysisResult> {
    let topic = pipeline.preflight(topic)?;

    emitter.progress(ProgressUpdate::new(Phase::Discovery, DISCOVERY_START, "Finding sources..."));
    let urls = pipeline.discover(&topic).await?;
    let total = urls.len();
    emitter.progress(ProgressUpdate::new(
        Phase::Discovery,
        DISCOVERY_DONE,
        format!("Found {} sources", total),
    ));

    emitter.progress(
        ProgressUpdate::new(Phase::Scraping, SCRAPING_START, "Ingesting data...").with_counts(0, total),
    );
    let reporter = emitter.clone();
    let on_progress: RetrievalProgress = Arc::new(move |current, total| {
        reporter.progress(
            ProgressUpdate::new(
                Phase::Scraping,
                scraping_percent(current, total),
                format!("Reading article {} of {}", current, total),
            )
            .with_counts(current, total),
        );
    });
    let articles = pipeline.retrieve(&urls, Some(on_progress)).await?;
    emitter.progress(
        ProgressUpdate::new(Phase::Scraping, SCRAPING_DONE, "Scraping complete").with_counts(total, total),
    );

    emitter.progress(ProgressUpdate::new(
        Phase::Analysis,
        ANALYSIS_START,
        "Synthesizing narratives...",
    ));
    let task = {
        let pipeline = pipeline.clone();
        let topic = topic.clone();
        tokio::spawn(async move { pipeline.analyze(&topic, &articles).await })
    };
    let result = heartbeat(task, config, emitter).await?;
    emitter.progress(ProgressUpdate::new(Phase::Analysis, ANALYSIS_DONE, "Almost done..."));

    info!("📡 Streamed analysis of '{}' finished", topic);
    Ok(result)
}

/// Emits heartbeats on a fixed ticker until the analysis task completes.
/// The ticker lives inside this future, so it stops when the task's result
/// is taken and never fires after that.
async fn heartbeat(
    mut task: JoinHandle<Result<AnalysisResult>>,
    config: &StreamerConfig,
    emitter: &Emitter,
) -> Result<AnalysisResult> {
    let period = config.heartbeat_interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut percent = emitter.last_percent();
    let mut beat = 0usize;
    loop {
        tokio::select! {
            biased;
            joined = &mut task => {
                return joined.map_err(|e| Error::External(e.into()))?;
            }
            _ = ticker.tick() => {
                if percent < config.heartbeat_ceiling {
                    percent = percent
                        .saturating_add(config.heartbeat_step)
                        .min(config.heartbeat_ceiling);
                    let message = ANALYSIS_MESSAGES[beat % ANALYSIS_MESSAGES.len()];
                    beat += 1;
                    emitter.progress(ProgressUpdate::new(Phase::Analysis, percent, message));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scraping_percent_range() {
        assert_eq!(scraping_percent(0, 10), 15);
        assert_eq!(scraping_percent(5, 10), 37);
        assert_eq!(scraping_percent(10, 10), 60);
        assert_eq!(scraping_percent(12, 10), 60);
        assert_eq!(scraping_percent(3, 0), 15);
    }
}
