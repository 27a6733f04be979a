use std::ops::Range;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use px_core::{
    Article, Bias, CacheEntry, ClassifiedArticle, Error, InferenceModel, Result, ResultCache,
};
use px_inference::prompts::{classification_prompt, classification_shape};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Result of classifying one article. Failures are values so the stage can
/// aggregate by kind instead of relying on missing entries.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    /// Served from the result cache, no inference call made.
    Cached(ClassifiedArticle),
    /// Classified by the model during this run.
    Fresh(ClassifiedArticle),
    Failed { url: String, reason: String },
}

impl ClassificationOutcome {
    pub fn classified(&self) -> Option<&ClassifiedArticle> {
        match self {
            ClassificationOutcome::Cached(c) | ClassificationOutcome::Fresh(c) => Some(c),
            ClassificationOutcome::Failed { .. } => None,
        }
    }

    pub fn into_classified(self) -> Option<ClassifiedArticle> {
        match self {
            ClassificationOutcome::Cached(c) | ClassificationOutcome::Fresh(c) => Some(c),
            ClassificationOutcome::Failed { .. } => None,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, ClassificationOutcome::Cached(_))
    }
}

#[derive(Debug, Deserialize)]
struct ClassificationReply {
    #[serde(default)]
    bias: String,
    #[serde(default)]
    summary: String,
}

/// Splits `len` items into `lanes` contiguous, near-equal index ranges.
/// With two lanes this is the first half and the second half.
pub fn lane_ranges(len: usize, lanes: usize) -> Vec<Range<usize>> {
    let lanes = lanes.max(1);
    (0..lanes)
        .map(|k| (k * len / lanes)..((k + 1) * len / lanes))
        .collect()
}

/// Bounded-concurrency classification over a URL-keyed result cache.
pub struct Classifier {
    lanes: Vec<Arc<dyn InferenceModel>>,
    store: Arc<dyn ResultCache>,
    semaphore: Arc<Semaphore>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("lanes", &self.lanes.len())
            .field("store", &self.store.backend_name())
            .field("permits", &self.semaphore.available_permits())
            .finish()
    }
}

impl Classifier {
    pub fn new(
        lanes: Vec<Arc<dyn InferenceModel>>,
        store: Arc<dyn ResultCache>,
        concurrency: usize,
    ) -> Result<Self> {
        if lanes.is_empty() {
            return Err(Error::Config("Classification needs at least one model lane".to_string()));
        }
        Ok(Self {
            lanes,
            store,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        })
    }

    pub fn lanes(&self) -> &[Arc<dyn InferenceModel>] {
        &self.lanes
    }

    /// Classifies every article with enough content. Articles below the
    /// content threshold are skipped without an outcome. Outcomes come back
    /// in the order of the classifiable input.
    pub async fn classify(&self, topic: &str, articles: &[Article]) -> Vec<ClassificationOutcome> {
        let valid: Vec<&Article> = articles.iter().filter(|a| a.is_classifiable()).collect();
        if valid.len() < articles.len() {
            info!(
                "✂️ Skipping {} article(s) with too little content",
                articles.len() - valid.len()
            );
        }

        let mut handles = Vec::with_capacity(valid.len());
        for (lane, range) in lane_ranges(valid.len(), self.lanes.len()).into_iter().enumerate() {
            debug!("Lane {} takes articles {:?}", lane, range);
            for article in &valid[range] {
                let model = self.lanes[lane].clone();
                let store = self.store.clone();
                let semaphore = self.semaphore.clone();
                let topic = topic.to_string();
                let article = (*article).clone();
                let url = article.url.clone();

                let handle = tokio::spawn(async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            return ClassificationOutcome::Failed {
                                url: article.url,
                                reason: e.to_string(),
                            }
                        }
                    };
                    classify_one(model.as_ref(), store.as_ref(), &topic, &article).await
                });
                handles.push((url, handle));
            }
        }

        let (urls, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let outcomes: Vec<ClassificationOutcome> = join_all(handles)
            .await
            .into_iter()
            .zip(urls)
            .map(|(joined, url)| {
                joined.unwrap_or_else(|e| ClassificationOutcome::Failed {
                    url,
                    reason: format!("Classification task failed: {}", e),
                })
            })
            .collect();

        let cached = outcomes.iter().filter(|o| o.is_cached()).count();
        let failed = outcomes.iter().filter(|o| o.classified().is_none()).count();
        info!(
            "🏷️ Classified {} article(s): {} cached, {} fresh, {} failed",
            outcomes.len(),
            cached,
            outcomes.len() - cached - failed,
            failed
        );
        outcomes
    }
}

async fn classify_one(
    model: &dyn InferenceModel,
    store: &dyn ResultCache,
    topic: &str,
    article: &Article,
) -> ClassificationOutcome {
    match store.lookup(&article.url).await {
        Ok(Some(entry)) if entry.has_summary() => {
            return ClassificationOutcome::Cached(rebind(store, entry, topic, article).await);
        }
        Ok(_) => {}
        Err(e) => warn!("Cache lookup failed for {}: {}", article.url, e),
    }

    debug!("🤖 Classifying {} with {}", article.url, model.name());
    let reply = match model
        .infer_structured(&classification_prompt(&article.content), &classification_shape())
        .await
        .and_then(|value| serde_json::from_value::<ClassificationReply>(value).map_err(Error::from))
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Classification failed for {}: {}", article.url, e);
            return ClassificationOutcome::Failed {
                url: article.url.clone(),
                reason: e.to_string(),
            };
        }
    };

    let classified = ClassifiedArticle {
        url: article.url.clone(),
        bias: Bias::coerce(&reply.bias),
        summary: reply.summary.trim().to_string(),
    };
    persist(store, &CacheEntry::new(topic, article, &classified)).await;
    ClassificationOutcome::Fresh(classified)
}

/// Points a cached row at the current topic and fills in missing content.
/// The stored bias and summary are reused as-is.
async fn rebind(
    store: &dyn ResultCache,
    mut entry: CacheEntry,
    topic: &str,
    article: &Article,
) -> ClassifiedArticle {
    if entry.topic != topic {
        debug!("Rebinding {} from '{}' to '{}'", entry.url, entry.topic, topic);
        entry.topic = topic.to_string();
    }
    if !entry.has_content() {
        entry.content = Some(article.content.clone());
    }
    entry.updated_at = Utc::now();

    if let Err(e) = store.update(&entry).await {
        warn!("Failed to rebind cached result for {}: {}", entry.url, e);
    }
    entry.classified()
}

/// Writes a fresh classification. The existence check runs right before the
/// write so a concurrent worker that stored the same URL first gets
/// overwritten instead of duplicated.
async fn persist(store: &dyn ResultCache, entry: &CacheEntry) {
    let written = match store.lookup(&entry.url).await {
        Ok(Some(_)) => store.update(entry).await,
        Ok(None) => store.insert(entry).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        warn!("Failed to cache result for {}: {}", entry.url, e);
    }
}
