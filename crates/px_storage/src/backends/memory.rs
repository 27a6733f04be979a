use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use px_core::{CacheEntry, Result, ResultCache, TopicHistory};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Row {
    id: u64,
    entry: CacheEntry,
}

/// Rows are append-only vectors keyed by an increasing id, like a table
/// without a uniqueness constraint on `url`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Vec<Row>,
    next_id: u64,
}

impl MemoryStore {
    fn lookup(&self, url: &str) -> Option<CacheEntry> {
        self.rows
            .iter()
            .filter(|row| row.entry.url == url)
            .max_by_key(|row| row.id)
            .map(|row| row.entry.clone())
    }

    fn insert(&mut self, entry: &CacheEntry) {
        self.next_id += 1;
        self.rows.push(Row {
            id: self.next_id,
            entry: entry.clone(),
        });
    }

    fn update(&mut self, entry: &CacheEntry) -> usize {
        let mut touched = 0;
        for row in self.rows.iter_mut().filter(|row| row.entry.url == entry.url) {
            row.entry = entry.clone();
            touched += 1;
        }
        touched
    }

    fn entries_for_topic(&self, topic: &str, limit: usize) -> Vec<CacheEntry> {
        let topic = topic.to_lowercase();
        let mut entries: Vec<&Row> = self
            .rows
            .iter()
            .filter(|row| row.entry.topic.to_lowercase() == topic)
            .filter(|row| row.entry.has_summary() || row.entry.has_content())
            .collect();
        entries.sort_by(|a, b| b.entry.updated_at.cmp(&a.entry.updated_at).then(b.id.cmp(&a.id)));
        entries.into_iter().take(limit).map(|row| row.entry.clone()).collect()
    }

    fn recent_topics(&self, limit: usize) -> Vec<TopicHistory> {
        let mut latest: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for row in self.rows.iter().filter(|row| !row.entry.topic.is_empty()) {
            let slot = latest.entry(row.entry.topic.as_str()).or_insert(row.entry.updated_at);
            if row.entry.updated_at > *slot {
                *slot = row.entry.updated_at;
            }
        }
        let mut topics: Vec<TopicHistory> = latest
            .into_iter()
            .map(|(topic, last_run)| TopicHistory {
                topic: topic.to_string(),
                last_run,
            })
            .collect();
        topics.sort_by(|a, b| b.last_run.cmp(&a.last_run).then_with(|| a.topic.cmp(&b.topic)));
        topics.truncate(limit);
        topics
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, duplicates included.
    pub async fn row_count(&self) -> usize {
        self.store.read().await.rows.len()
    }
}

#[async_trait]
impl ResultCache for MemoryStorage {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn lookup(&self, url: &str) -> Result<Option<CacheEntry>> {
        Ok(self.store.read().await.lookup(url))
    }

    async fn insert(&self, entry: &CacheEntry) -> Result<()> {
        self.store.write().await.insert(entry);
        Ok(())
    }

    async fn update(&self, entry: &CacheEntry) -> Result<()> {
        let touched = self.store.write().await.update(entry);
        tracing::debug!("Updated {} cached row(s) for {}", touched, entry.url);
        Ok(())
    }

    async fn entries_for_topic(&self, topic: &str, limit: usize) -> Result<Vec<CacheEntry>> {
        Ok(self.store.read().await.entries_for_topic(topic, limit))
    }

    async fn recent_topics(&self, limit: usize) -> Result<Vec<TopicHistory>> {
        Ok(self.store.read().await.recent_topics(limit))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
