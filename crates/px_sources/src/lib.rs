pub mod discovery;
pub mod retrieval;

pub use discovery::{dedup_urls, DiscoveryConfig, SerpApiDiscovery};
pub use retrieval::{RetrievalConfig, RetryPolicy, ScraperServiceClient};

pub mod prelude {
    pub use super::discovery::{DiscoveryConfig, SerpApiDiscovery};
    pub use super::retrieval::{RetrievalConfig, RetryPolicy, ScraperServiceClient};
    pub use px_core::{Discovery, Result, Retrieval, ScrapeRecord};
}
