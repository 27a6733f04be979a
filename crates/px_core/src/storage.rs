use async_trait::async_trait;

use crate::types::{CacheEntry, TopicHistory};
use crate::Result;

/// URL-keyed store of prior classifications.
///
/// Uniqueness by URL is not enforced here: callers that write must look up
/// the URL immediately before choosing between `insert` and `update`, and
/// accept last-write-wins when two writers race.
#[async_trait]
pub trait ResultCache: Send + Sync {
    fn backend_name(&self) -> &str;

    /// Most recent row for the URL, if any.
    async fn lookup(&self, url: &str) -> Result<Option<CacheEntry>>;

    /// Adds a new row.
    async fn insert(&self, entry: &CacheEntry) -> Result<()>;

    /// Overwrites every row stored under `entry.url`.
    async fn update(&self, entry: &CacheEntry) -> Result<()>;

    /// Rows bound to a topic (case-insensitive), newest first.
    async fn entries_for_topic(&self, topic: &str, limit: usize) -> Result<Vec<CacheEntry>>;

    /// Distinct topics with their latest timestamp, newest first.
    async fn recent_topics(&self, limit: usize) -> Result<Vec<TopicHistory>>;

    async fn ping(&self) -> Result<()>;

    async fn close(&self) {}
}
