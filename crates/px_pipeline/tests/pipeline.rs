use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use px_core::{
    Article, Bias, CacheEntry, Error, InferenceModel, ResponseShape, Result, ResultCache,
    TopicHistory, EMPTY_NARRATIVE,
};
use px_pipeline::test_utils::{pipeline as build_pipeline, record, ScriptedModel, StaticDiscovery, StaticRetrieval};
use px_pipeline::{ClassificationOutcome, Classifier};
use px_storage::MemoryStorage;
use serde_json::{json, Value};

fn urls(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://news.example/{}", i)).collect()
}

fn article(url: &str, marker: &str) -> Article {
    Article::from_record(record(url, marker)).unwrap()
}

#[tokio::test]
async fn empty_discovery_is_not_found() {
    let retrieval = Arc::new(StaticRetrieval::default());
    let model = Arc::new(ScriptedModel::default());
    let pipeline = build_pipeline(
        Arc::new(StaticDiscovery::new(vec![])),
        retrieval.clone(),
        model.clone(),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();

    let err = pipeline.run("Example Topic").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(retrieval.calls.load(Ordering::SeqCst), 0);
    assert_eq!(model.classify_calls(), 0);
}

#[tokio::test]
async fn failed_retrieval_is_unavailable() {
    let urls = urls(10);
    let records = urls
        .iter()
        .map(|u| {
            let mut r = record(u, "LEFT");
            r.status = Some("HTTP Error: 403".to_string());
            r
        })
        .collect();
    let model = Arc::new(ScriptedModel::default());
    let pipeline = build_pipeline(
        Arc::new(StaticDiscovery::new(urls)),
        Arc::new(StaticRetrieval::new(records)),
        model.clone(),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();

    let err = pipeline.run("Example Topic").await.unwrap_err();
    assert!(matches!(err, Error::Unavailable(_)));
    assert_eq!(model.classify_calls(), 0);
}

#[tokio::test]
async fn preflight_rejects_before_any_stage() {
    let retrieval = Arc::new(StaticRetrieval::default());
    let pipeline = build_pipeline(
        Arc::new(StaticDiscovery {
            urls: urls(3),
            missing_key: true,
        }),
        retrieval.clone(),
        Arc::new(ScriptedModel::default()),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();

    assert!(matches!(pipeline.run("   ").await, Err(Error::Validation(_))));
    assert!(matches!(pipeline.run("Tariffs").await, Err(Error::Config(_))));
    assert_eq!(retrieval.calls.load(Ordering::SeqCst), 0);

    let model = Arc::new(ScriptedModel {
        missing_key: true,
        ..Default::default()
    });
    let pipeline = build_pipeline(
        Arc::new(StaticDiscovery::new(urls(3))),
        Arc::new(StaticRetrieval::default()),
        model,
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();
    assert!(matches!(pipeline.preflight("Tariffs"), Err(Error::Config(_))));
}

#[tokio::test]
async fn counts_match_sources_and_short_articles_are_excluded() {
    let urls = urls(7);
    let mut records = vec![
        record(&urls[0], "LEFT"),
        record(&urls[1], "RIGHT"),
        record(&urls[2], "CENTER"),
        record(&urls[3], "FAIL"),
        record(&urls[4], "ODD"),
        record(&urls[5], "LEFT"),
        record(&urls[6], "RIGHT"),
    ];
    records[5].content = Some("LEFT too short".to_string());
    records.push(record(&urls[0], "LEFT"));

    let model = Arc::new(ScriptedModel::default());
    let pipeline = build_pipeline(
        Arc::new(StaticDiscovery::new(urls.clone())),
        Arc::new(StaticRetrieval::new(records)),
        model.clone(),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();

    let result = pipeline.run("Tariffs").await.unwrap();

    // the short article never reaches the model, the duplicate is ingested once
    assert_eq!(model.classify_calls(), 6);
    assert_eq!(result.bias_counts.left, 1);
    assert_eq!(result.bias_counts.right, 2);
    assert_eq!(result.bias_counts.center, 2);
    assert_eq!(result.bias_counts.total(), result.sources.len());

    let source_urls: Vec<&str> = result.sources.iter().map(|s| s.url.as_str()).collect();
    assert_eq!(
        source_urls,
        vec![
            urls[0].as_str(),
            urls[1].as_str(),
            urls[2].as_str(),
            urls[4].as_str(),
            urls[6].as_str()
        ]
    );
    assert_eq!(result.sources[0].source, "news.example");
}

#[tokio::test]
async fn rerun_under_new_topic_reuses_cache() {
    let urls = urls(5);
    let markers = ["LEFT", "RIGHT", "CENTER", "LEFT", "RIGHT"];
    let records = urls.iter().zip(markers).map(|(u, m)| record(u, m)).collect();
    let store = Arc::new(MemoryStorage::new());
    let model = Arc::new(ScriptedModel::default());
    let pipeline = build_pipeline(
        Arc::new(StaticDiscovery::new(urls.clone())),
        Arc::new(StaticRetrieval::new(records)),
        model.clone(),
        store.clone(),
    )
    .unwrap();

    let first = pipeline.run("T1").await.unwrap();
    assert_eq!(model.classify_calls(), 5);
    let prompts_after_first = model.free_text_prompts().len();

    let second = pipeline.run("T2").await.unwrap();
    assert_eq!(model.classify_calls(), 5, "second run must not classify again");
    assert_eq!(first.bias_counts, second.bias_counts);
    assert_eq!(first.sources, second.sources);

    // synthesis is never cached: two narratives and one report per run
    assert_eq!(model.free_text_prompts().len(), prompts_after_first + 3);

    for url in &urls {
        let entry = store.lookup(url).await.unwrap().unwrap();
        assert_eq!(entry.topic, "T2");
    }
    assert_eq!(store.row_count().await, 5);
}

#[tokio::test]
async fn cached_rows_are_rebound_and_backfilled() {
    let store = Arc::new(MemoryStorage::new());
    let a = article("https://news.example/cached", "LEFT");
    store
        .insert(&CacheEntry {
            url: a.url.clone(),
            topic: "T1".to_string(),
            bias: Bias::Right,
            summary: "stored summary".to_string(),
            content: None,
            updated_at: Utc::now(),
        })
        .await
        .unwrap();

    let model = Arc::new(ScriptedModel::default());
    let lanes: Vec<Arc<dyn InferenceModel>> = vec![model.clone()];
    let classifier = Classifier::new(lanes, store.clone(), 5).unwrap();
    let outcomes = classifier.classify("T2", &[a.clone()]).await;

    assert_eq!(model.classify_calls(), 0);
    assert!(outcomes[0].is_cached());
    let classified = outcomes[0].classified().unwrap();
    assert_eq!(classified.bias, Bias::Right);
    assert_eq!(classified.summary, "stored summary");

    let entry = store.lookup(&a.url).await.unwrap().unwrap();
    assert_eq!(entry.topic, "T2");
    assert_eq!(entry.content.as_deref(), Some(a.content.as_str()));
}

#[tokio::test]
async fn rows_without_summary_are_reclassified_in_place() {
    let store = Arc::new(MemoryStorage::new());
    let a = article("https://news.example/partial", "LEFT");
    store
        .insert(&CacheEntry {
            url: a.url.clone(),
            topic: "T1".to_string(),
            bias: Bias::Center,
            summary: String::new(),
            content: None,
            updated_at: Utc::now(),
        })
        .await
        .unwrap();

    let model = Arc::new(ScriptedModel::default());
    let lanes: Vec<Arc<dyn InferenceModel>> = vec![model.clone()];
    let classifier = Classifier::new(lanes, store.clone(), 5).unwrap();
    let outcomes = classifier.classify("T1", &[a.clone()]).await;

    assert_eq!(model.classify_calls(), 1);
    assert!(matches!(outcomes[0], ClassificationOutcome::Fresh(_)));
    assert_eq!(store.row_count().await, 1);
    assert_eq!(store.lookup(&a.url).await.unwrap().unwrap().bias, Bias::Left);
}

#[tokio::test]
async fn empty_side_still_gets_an_omission_report() {
    let urls = urls(2);
    let records = urls.iter().map(|u| record(u, "LEFT")).collect();
    let model = Arc::new(ScriptedModel::default());
    let pipeline = build_pipeline(
        Arc::new(StaticDiscovery::new(urls)),
        Arc::new(StaticRetrieval::new(records)),
        model.clone(),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();

    let result = pipeline.run("Tariffs").await.unwrap();
    assert_eq!(result.narratives.right, EMPTY_NARRATIVE);
    assert_ne!(result.narratives.left, EMPTY_NARRATIVE);

    let prompts = model.free_text_prompts();
    assert_eq!(prompts.len(), 2, "left synthesis plus exactly one omission call");
    let omission = &prompts[1];
    assert!(omission.contains(EMPTY_NARRATIVE));
    assert!(omission.contains(&result.narratives.left));
    assert_eq!(result.omission_report, "generated text #2");
}

#[tokio::test]
async fn synthesis_failure_aborts_the_run() {
    let urls = urls(1);
    let records = urls.iter().map(|u| record(u, "RIGHT")).collect();
    let model = Arc::new(ScriptedModel {
        fail_free_text: true,
        ..Default::default()
    });
    let pipeline = build_pipeline(
        Arc::new(StaticDiscovery::new(urls)),
        Arc::new(StaticRetrieval::new(records)),
        model,
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();

    assert!(matches!(pipeline.run("Tariffs").await, Err(Error::Inference(_))));
}

#[derive(Debug, Default)]
struct BrokenStore;

#[async_trait]
impl ResultCache for BrokenStore {
    fn backend_name(&self) -> &str {
        "broken"
    }
    async fn lookup(&self, _url: &str) -> Result<Option<CacheEntry>> {
        Err(Error::Store("disk I/O error".to_string()))
    }
    async fn insert(&self, _entry: &CacheEntry) -> Result<()> {
        Err(Error::Store("disk I/O error".to_string()))
    }
    async fn update(&self, _entry: &CacheEntry) -> Result<()> {
        Err(Error::Store("disk I/O error".to_string()))
    }
    async fn entries_for_topic(&self, _topic: &str, _limit: usize) -> Result<Vec<CacheEntry>> {
        Err(Error::Store("disk I/O error".to_string()))
    }
    async fn recent_topics(&self, _limit: usize) -> Result<Vec<TopicHistory>> {
        Err(Error::Store("disk I/O error".to_string()))
    }
    async fn ping(&self) -> Result<()> {
        Err(Error::Store("disk I/O error".to_string()))
    }
}

#[tokio::test]
async fn store_failures_do_not_abort() {
    let urls = urls(3);
    let records = urls.iter().map(|u| record(u, "LEFT")).collect();
    let model = Arc::new(ScriptedModel::default());
    let pipeline = build_pipeline(
        Arc::new(StaticDiscovery::new(urls)),
        Arc::new(StaticRetrieval::new(records)),
        model.clone(),
        Arc::new(BrokenStore),
    )
    .unwrap();

    let result = pipeline.run("Tariffs").await.unwrap();
    assert_eq!(result.bias_counts.left, 3);
    assert_eq!(model.classify_calls(), 3);
}

/// Tracks how many classification calls overlap.
#[derive(Debug, Default)]
struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl InferenceModel for ConcurrencyProbe {
    fn name(&self) -> &str {
        "probe"
    }

    async fn infer(&self, _prompt: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn infer_structured(&self, _prompt: &str, _shape: &ResponseShape) -> Result<Value> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(json!({"bias": "Center", "summary": "probe"}))
    }
}

#[tokio::test]
async fn classification_respects_the_concurrency_limit() {
    let probe = Arc::new(ConcurrencyProbe::default());
    let lanes: Vec<Arc<dyn InferenceModel>> = vec![probe.clone(), probe.clone()];
    let classifier = Classifier::new(lanes, Arc::new(MemoryStorage::new()), 2).unwrap();

    let articles: Vec<Article> = urls(8).iter().map(|u| article(u, "CENTER")).collect();
    let outcomes = classifier.classify("Tariffs", &articles).await;

    assert_eq!(outcomes.iter().filter(|o| o.classified().is_some()).count(), 8);
    assert!(probe.peak.load(Ordering::SeqCst) <= 2);
    assert!(probe.peak.load(Ordering::SeqCst) >= 1);
}

/// Records which article markers reached it; overlap is counted on
/// counters shared between lanes.
#[derive(Debug)]
struct LaneRecorder {
    seen: std::sync::Mutex<Vec<String>>,
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl LaneRecorder {
    fn new(current: Arc<AtomicUsize>, peak: Arc<AtomicUsize>) -> Self {
        Self {
            seen: std::sync::Mutex::new(Vec::new()),
            current,
            peak,
        }
    }

    fn seen(&self) -> Vec<String> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort();
        seen
    }
}

#[async_trait]
impl InferenceModel for LaneRecorder {
    fn name(&self) -> &str {
        "lane-recorder"
    }

    async fn infer(&self, _prompt: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn infer_structured(&self, prompt: &str, _shape: &ResponseShape) -> Result<Value> {
        let body = prompt.rsplit("Article Text:\n").next().unwrap_or(prompt);
        let marker = body.split_whitespace().next().unwrap_or_default().to_string();
        self.seen.lock().unwrap().push(marker);

        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(json!({"bias": "Center", "summary": "lane"}))
    }
}

#[tokio::test]
async fn each_lane_classifies_its_own_contiguous_half() {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let first = Arc::new(LaneRecorder::new(current.clone(), peak.clone()));
    let second = Arc::new(LaneRecorder::new(current.clone(), peak.clone()));
    let lanes: Vec<Arc<dyn InferenceModel>> = vec![first.clone(), second.clone()];
    let classifier = Classifier::new(lanes, Arc::new(MemoryStorage::new()), 2).unwrap();

    let articles: Vec<Article> = urls(6)
        .iter()
        .enumerate()
        .map(|(i, u)| article(u, &format!("ITEM{}", i)))
        .collect();
    let outcomes = classifier.classify("Tariffs", &articles).await;

    assert_eq!(outcomes.iter().filter(|o| o.classified().is_some()).count(), 6);
    assert_eq!(first.seen(), vec!["ITEM0", "ITEM1", "ITEM2"]);
    assert_eq!(second.seen(), vec!["ITEM3", "ITEM4", "ITEM5"]);
    assert!(peak.load(Ordering::SeqCst) <= 2);
}
