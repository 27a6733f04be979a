use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use px_core::{
    AnalysisResult, Article, Bias, BiasCounts, Discovery, Error, InferenceModel, Narratives,
    Result, ResultCache, Retrieval, RetrievalProgress, SourceRef,
};
use tracing::info;

use crate::classify::Classifier;
use crate::synthesis::{detect_omissions, synthesize};
use crate::PipelineConfig;

pub const TOPIC_REQUIRED: &str = "Topic is required";
pub const NO_SOURCES: &str = "No relevant sources found for this topic";
pub const NO_CONTENT: &str =
    "Could not fetch article content. The scraper may be starting up, please try again in a minute.";

/// Discovery → Retrieval → Classification → Synthesis → Omission.
///
/// Each stage is exposed on its own so a caller can observe the boundaries
/// between them; [`Pipeline::run`] chains all of them.
#[derive(Clone)]
pub struct Pipeline {
    discovery: Arc<dyn Discovery>,
    retrieval: Arc<dyn Retrieval>,
    classifier: Arc<Classifier>,
    synthesis_model: Arc<dyn InferenceModel>,
    store: Arc<dyn ResultCache>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("discovery", &self.discovery.name())
            .field("retrieval", &self.retrieval.name())
            .field("classifier", &self.classifier)
            .field("synthesis_model", &self.synthesis_model.name())
            .finish()
    }
}

fn unique_by_url(articles: impl Iterator<Item = Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles.filter(|a| seen.insert(a.url.clone())).collect()
}

impl Pipeline {
    /// `classification_models` are assigned to lanes round-robin, so one
    /// model serves every lane when only one is given.
    pub fn new(
        discovery: Arc<dyn Discovery>,
        retrieval: Arc<dyn Retrieval>,
        classification_models: Vec<Arc<dyn InferenceModel>>,
        synthesis_model: Arc<dyn InferenceModel>,
        store: Arc<dyn ResultCache>,
        config: &PipelineConfig,
    ) -> Result<Self> {
        if classification_models.is_empty() {
            return Err(Error::Config("No classification model configured".to_string()));
        }
        let lanes = (0..config.lanes.max(1))
            .map(|k| classification_models[k % classification_models.len()].clone())
            .collect();
        let classifier = Classifier::new(lanes, store.clone(), config.concurrency)?;

        Ok(Self {
            discovery,
            retrieval,
            classifier: Arc::new(classifier),
            synthesis_model,
            store,
        })
    }

    pub fn store(&self) -> &Arc<dyn ResultCache> {
        &self.store
    }

    pub fn retrieval(&self) -> &Arc<dyn Retrieval> {
        &self.retrieval
    }

    /// Rejects a blank topic and missing credentials before any stage runs.
    /// Returns the trimmed topic.
    pub fn preflight(&self, topic: &str) -> Result<String> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(Error::Validation(TOPIC_REQUIRED.to_string()));
        }
        self.discovery.check_credentials()?;
        for model in self.classifier.lanes() {
            model.check_credentials()?;
        }
        self.synthesis_model.check_credentials()?;
        Ok(topic.to_string())
    }

    pub async fn discover(&self, topic: &str) -> Result<Vec<String>> {
        let urls = self.discovery.discover(topic).await?;
        if urls.is_empty() {
            return Err(Error::NotFound(NO_SOURCES.to_string()));
        }
        info!("🔍 {} candidate sources for '{}'", urls.len(), topic);
        Ok(urls)
    }

    /// Fetches and ingests articles, keeping one article per URL in
    /// discovery order.
    pub async fn retrieve(
        &self,
        urls: &[String],
        on_progress: Option<RetrievalProgress>,
    ) -> Result<Vec<Article>> {
        let records = self.retrieval.retrieve(urls, on_progress).await?;
        let fetched = records.len();

        let rank: HashMap<&str, usize> = urls
            .iter()
            .enumerate()
            .rev()
            .map(|(i, url)| (url.as_str(), i))
            .collect();
        let mut articles = unique_by_url(records.into_iter().filter_map(Article::from_record));
        articles.sort_by_key(|a| rank.get(a.url.as_str()).copied().unwrap_or(usize::MAX));

        if articles.is_empty() {
            return Err(Error::Unavailable(NO_CONTENT.to_string()));
        }
        info!("📰 {} usable articles out of {} records", articles.len(), fetched);
        Ok(articles)
    }

    /// Classification, synthesis and omission detection over retrieved
    /// articles. Classification failures only drop the affected article;
    /// synthesis and omission failures abort.
    pub async fn analyze(&self, topic: &str, articles: &[Article]) -> Result<AnalysisResult> {
        let articles = unique_by_url(articles.iter().cloned());
        let classified: Vec<_> = self
            .classifier
            .classify(topic, &articles)
            .await
            .into_iter()
            .filter_map(|outcome| outcome.into_classified())
            .collect();

        let mut bias_counts = BiasCounts::default();
        let mut groups: HashMap<Bias, Vec<String>> = HashMap::new();
        for article in &classified {
            bias_counts.record(article.bias);
            groups.entry(article.bias).or_default().push(article.summary.clone());
        }

        let model = self.synthesis_model.as_ref();
        let empty = Vec::new();
        let left = synthesize(model, Bias::Left, topic, groups.get(&Bias::Left).unwrap_or(&empty)).await?;
        let right =
            synthesize(model, Bias::Right, topic, groups.get(&Bias::Right).unwrap_or(&empty)).await?;
        let omission_report = detect_omissions(model, topic, &left, &right).await?;

        let classified_urls: HashSet<&str> = classified.iter().map(|c| c.url.as_str()).collect();
        let sources: Vec<SourceRef> = articles
            .iter()
            .filter(|a| classified_urls.contains(a.url.as_str()))
            .map(Article::source_ref)
            .collect();

        info!(
            "✅ Analysis of '{}' done: {} left, {} center, {} right",
            topic, bias_counts.left, bias_counts.center, bias_counts.right
        );
        Ok(AnalysisResult {
            topic: topic.to_string(),
            bias_counts,
            narratives: Narratives { left, right },
            omission_report,
            sources,
        })
    }

    /// Runs every stage in order.
    pub async fn run(&self, topic: &str) -> Result<AnalysisResult> {
        let topic = self.preflight(topic)?;
        let urls = self.discover(&topic).await?;
        let articles = self.retrieve(&urls, None).await?;
        self.analyze(&topic, &articles).await
    }
}
