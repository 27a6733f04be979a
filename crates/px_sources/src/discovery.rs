use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use px_core::{Discovery, Error, Result};
use reqwest::Client;
use serde::Deserialize;

pub const DEFAULT_SERPAPI_ENDPOINT: &str = "https://serpapi.com/search.json";

/// Outlets used to seed the two balanced queries. They only bias the search
/// toward some coverage from each side; classification decides the lean.
const LEFT_SEED_SITES: &[&str] = &[
    "cnn.com", "msnbc.com", "nytimes.com", "politico.com", "theguardian.com", "huffpost.com",
];
const RIGHT_SEED_SITES: &[&str] = &[
    "foxnews.com", "breitbart.com", "nypost.com", "dailywire.com", "washingtontimes.com",
    "nationalreview.com",
];

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    /// Links kept from each balanced query.
    pub per_query: usize,
    pub max_results: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_SERPAPI_ENDPOINT.to_string(),
            per_query: 7,
            max_results: 14,
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news_results: Vec<NewsResult>,
}

#[derive(Deserialize)]
struct NewsResult {
    link: Option<String>,
}

/// Google News discovery through SerpAPI.
pub struct SerpApiDiscovery {
    client: Client,
    config: DiscoveryConfig,
}

impl fmt::Debug for SerpApiDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerpApiDiscovery")
            .field("endpoint", &self.config.endpoint)
            .field("api_key", &self.config.api_key.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

fn site_query(topic: &str, sites: &[&str]) -> String {
    let sites = sites
        .iter()
        .map(|s| format!("site:{}", s))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("{} ({})", topic, sites)
}

/// Removes repeated URLs keeping first occurrences, then truncates.
pub fn dedup_urls(urls: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .take(cap)
        .collect()
}

impl SerpApiDiscovery {
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { client, config })
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("SERP_API_KEY is missing".to_string()))
    }

    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("engine", "google_news"),
                ("q", query),
                ("api_key", self.api_key()?),
                ("gl", "us"),
                ("hl", "en"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await?;

        Ok(response
            .news_results
            .into_iter()
            .filter_map(|r| r.link)
            .collect())
    }
}

#[async_trait]
impl Discovery for SerpApiDiscovery {
    fn name(&self) -> &str {
        "serpapi"
    }

    fn check_credentials(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }

    async fn discover(&self, topic: &str) -> Result<Vec<String>> {
        self.check_credentials()?;

        let mut collected = Vec::new();
        for query in [
            site_query(topic, LEFT_SEED_SITES),
            site_query(topic, RIGHT_SEED_SITES),
        ] {
            match self.search(&query).await {
                Ok(links) => collected.extend(links.into_iter().take(self.config.per_query)),
                Err(e) => tracing::warn!("Search failed for query '{}': {}", query, e),
            }
        }

        if collected.is_empty() {
            tracing::info!("Balanced search found nothing for '{}', trying a generic search", topic);
            match self.search(topic).await {
                Ok(links) => collected = links,
                Err(e) => tracing::warn!("Generic search failed for '{}': {}", topic, e),
            }
        }

        let urls = dedup_urls(collected, self.config.max_results);
        tracing::info!("🔍 Discovered {} sources for '{}'", urls.len(), topic);
        Ok(urls)
    }
}
