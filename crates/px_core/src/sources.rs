use std::sync::Arc;

use async_trait::async_trait;

use crate::types::ScrapeRecord;
use crate::Result;

/// Called with `(completed, total)` as retrieval items finish.
pub type RetrievalProgress = Arc<dyn Fn(usize, usize) + Send + Sync>;

#[async_trait]
pub trait Discovery: Send + Sync {
    fn name(&self) -> &str;

    fn check_credentials(&self) -> Result<()> {
        Ok(())
    }

    /// Ordered, deduplicated candidate URLs. An empty list means no sources
    /// were found and is not an error.
    async fn discover(&self, topic: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait Retrieval: Send + Sync {
    fn name(&self) -> &str;

    /// Fetches article records for the URLs. Implementations own their
    /// retry policy and return an empty list once retries are exhausted.
    async fn retrieve(
        &self,
        urls: &[String],
        on_progress: Option<RetrievalProgress>,
    ) -> Result<Vec<ScrapeRecord>>;

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}
