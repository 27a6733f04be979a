use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use px_core::{Error, Result, Retrieval, RetrievalProgress, ScrapeRecord};
use reqwest::Client;
use serde::Serialize;

pub const DEFAULT_SCRAPER_URL: &str = "http://localhost:8080/scrape";

/// Delays before each attempt plus a per-attempt timeout. The first delay is
/// normally zero. The service may be cold-starting, so timeouts are long.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub delays: Vec<Duration>,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: [0, 5, 15, 25].into_iter().map(Duration::from_secs).collect(),
            attempt_timeout: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub endpoint: String,
    /// URLs per request. Smaller chunks give finer progress.
    pub chunk_size: usize,
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SCRAPER_URL.to_string(),
            chunk_size: 2,
            max_in_flight: 4,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    urls: &'a [String],
}

/// Client for the article scraping service.
pub struct ScraperServiceClient {
    client: Client,
    config: RetrievalConfig,
}

impl fmt::Debug for ScraperServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScraperServiceClient")
            .field("endpoint", &self.config.endpoint)
            .finish()
    }
}

impl ScraperServiceClient {
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        if config.retry.delays.is_empty() {
            return Err(Error::Config("Retry policy needs at least one attempt".to_string()));
        }
        let client = Client::builder().build()?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn attempt(&self, urls: &[String]) -> Result<Vec<ScrapeRecord>> {
        let records = self
            .client
            .post(&self.config.endpoint)
            .timeout(self.config.retry.attempt_timeout)
            .json(&ScrapeRequest { urls })
            .send()
            .await?
            .error_for_status()?
            .json::<Option<Vec<ScrapeRecord>>>()
            .await?;
        Ok(records.unwrap_or_default())
    }

    /// Fetches one chunk, retrying on the configured schedule. Returns an
    /// empty list once every attempt has failed.
    async fn fetch_chunk(&self, urls: &[String]) -> Vec<ScrapeRecord> {
        let attempts = self.config.retry.delays.len();
        for (i, delay) in self.config.retry.delays.iter().enumerate() {
            if !delay.is_zero() {
                tracing::info!("Retrying scrape in {:?} (attempt {}/{})", delay, i + 1, attempts);
                tokio::time::sleep(*delay).await;
            }
            match self.attempt(urls).await {
                Ok(records) => return records,
                Err(e) => tracing::warn!(
                    "Scrape attempt {}/{} for {} url(s) failed: {}",
                    i + 1,
                    attempts,
                    urls.len(),
                    e
                ),
            }
        }
        tracing::error!("Giving up on {} url(s) after {} attempts", urls.len(), attempts);
        Vec::new()
    }
}

#[async_trait]
impl Retrieval for ScraperServiceClient {
    fn name(&self) -> &str {
        "scraper-service"
    }

    async fn retrieve(
        &self,
        urls: &[String],
        on_progress: Option<RetrievalProgress>,
    ) -> Result<Vec<ScrapeRecord>> {
        let total = urls.len();
        let completed = AtomicUsize::new(0);
        let chunk_size = self.config.chunk_size.max(1);

        let fetches: Vec<_> = urls
            .chunks(chunk_size)
            .map(|chunk| {
                let completed = &completed;
                let on_progress = on_progress.clone();
                async move {
                    let records = self.fetch_chunk(chunk).await;
                    let done = completed.fetch_add(chunk.len(), Ordering::SeqCst) + chunk.len();
                    if let Some(report) = on_progress {
                        report(done, total);
                    }
                    records
                }
            })
            .collect();

        let chunks: Vec<Vec<ScrapeRecord>> = stream::iter(fetches)
            .buffered(self.config.max_in_flight.max(1))
            .collect()
            .await;

        let records: Vec<ScrapeRecord> = chunks.into_iter().flatten().collect();
        tracing::info!("📰 Retrieved {} record(s) for {} url(s)", records.len(), total);
        Ok(records)
    }

    async fn health(&self) -> Result<()> {
        self.client
            .get(&self.config.endpoint)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| Error::Unavailable(format!("Scraper service unreachable: {}", e)))
    }
}
