use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use px_core::{InferenceModel, Result, ResultCache};
use px_inference::{create_model, ModelRole};
use px_pipeline::{ChatService, Pipeline, PipelineConfig};
use px_progress::{ProgressStreamer, StreamerConfig};
use px_sources::{
    retrieval::DEFAULT_SCRAPER_URL, DiscoveryConfig, RetrievalConfig, ScraperServiceClient,
    SerpApiDiscovery,
};
use px_web::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn check_storage_with_retry(
    storage: &Arc<dyn ResultCache>,
    max_retries: u32,
    timeout: Duration,
) -> Result<()> {
    let mut last_error = None;

    for attempt in 1..=max_retries {
        match tokio::time::timeout(timeout, storage.ping()).await {
            Ok(Ok(())) => {
                info!("🏦 Storage backend ready (using {})", storage.backend_name());
                return Ok(());
            }
            Ok(Err(e)) => last_error = Some(e),
            Err(elapsed) => {
                last_error = Some(px_core::Error::Store(format!(
                    "Storage health check timed out: {}",
                    elapsed
                )))
            }
        }
        if attempt < max_retries {
            info!("Storage health check failed, retrying {}/{}...", attempt, max_retries);
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    Err(last_error.unwrap_or_else(|| {
        px_core::Error::Store("Storage health check failed after all retries".to_string())
    }))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Compare how left and right news coverage frames a topic", long_about = None)]
pub struct Cli {
    #[arg(long, default_value = "memory", help = "Result cache backend: memory (default) or sqlite")]
    storage: String,
    #[arg(long, env = "DATABASE_URL", help = "SQLite database path or sqlite:// URL")]
    database_url: Option<String>,
    #[arg(long, default_value = "groq", help = "Model provider. Available: groq (default), openai, dummy")]
    model: String,
    #[arg(long, help = "Base URL of an OpenAI-compatible API")]
    model_url: Option<String>,
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "SERP_API_KEY", hide_env_values = true)]
    serp_api_key: Option<String>,
    #[arg(long, env = "GO_SCRAPER_URL", default_value = DEFAULT_SCRAPER_URL)]
    scraper_url: String,
    #[arg(long, default_value_t = 5, help = "Classification calls in flight at once")]
    concurrency: usize,
    #[arg(long, default_value_t = 2, help = "Number of classification lanes")]
    lanes: usize,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: IpAddr,
        #[arg(long, env = "PORT", default_value_t = 8000)]
        port: u16,
    },
    /// Analyze one topic and print the result as JSON
    Analyze {
        topic: String,
        /// Print progress events as they happen
        #[arg(long)]
        stream: bool,
    },
    /// List recently analyzed topics
    History {
        #[arg(long, default_value_t = 15)]
        limit: usize,
    },
}

struct Services {
    pipeline: Pipeline,
    chat: ChatService,
}

fn build_services(cli: &Cli, storage: Arc<dyn ResultCache>) -> Result<Services> {
    let inference = px_inference::Config {
        provider: cli.model.clone(),
        api_key: cli.api_key.clone(),
        base_url: cli.model_url.clone(),
        ..px_inference::Config::default()
    };

    // one client per lane
    let lanes = (0..cli.lanes.max(1))
        .map(|_| create_model(&inference, ModelRole::Classification))
        .collect::<Result<Vec<Arc<dyn InferenceModel>>>>()?;
    let synthesis = create_model(&inference, ModelRole::Synthesis)?;
    let chat_model = create_model(&inference, ModelRole::Chat)?;
    info!(
        "🧠 Inference models initialized (classification: {}, synthesis: {}, chat: {})",
        lanes[0].name(),
        synthesis.name(),
        chat_model.name()
    );

    let discovery = SerpApiDiscovery::new(DiscoveryConfig {
        api_key: cli.serp_api_key.clone(),
        ..DiscoveryConfig::default()
    })?;
    let retrieval = ScraperServiceClient::new(RetrievalConfig {
        endpoint: cli.scraper_url.clone(),
        ..RetrievalConfig::default()
    })?;
    info!("🦗 Scraper service at {}", retrieval.endpoint());

    let config = PipelineConfig {
        concurrency: cli.concurrency,
        lanes: cli.lanes,
    };
    let pipeline = Pipeline::new(
        Arc::new(discovery),
        Arc::new(retrieval),
        lanes,
        synthesis,
        storage.clone(),
        &config,
    )?;

    Ok(Services {
        pipeline,
        chat: ChatService::new(chat_model, storage),
    })
}

async fn run(cli: Cli, storage: Arc<dyn ResultCache>) -> Result<()> {
    match &cli.command {
        Commands::Serve { host, port } => {
            let services = build_services(&cli, storage)?;
            let state = AppState::new(services.pipeline, services.chat, StreamerConfig::default());
            px_web::serve(state, SocketAddr::new(*host, *port)).await?;
        }
        Commands::Analyze { topic, stream } => {
            let services = build_services(&cli, storage)?;
            if *stream {
                let streamer = ProgressStreamer::new(services.pipeline, StreamerConfig::default());
                let mut events = streamer.start(topic);
                while let Some(event) = events.next().await {
                    print!("{}", event.to_sse_frame()?);
                }
            } else {
                let result = services.pipeline.run(topic).await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
        Commands::History { limit } => {
            for item in storage.recent_topics(*limit).await? {
                println!("{}\t{}", item.last_run.to_rfc3339(), item.topic);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let storage = px_storage::create_storage(cli.storage.as_str(), cli.database_url.as_deref()).await?;
    info!("💾 Checking storage connection...");
    check_storage_with_retry(&storage, 3, Duration::from_secs(10)).await?;

    let outcome = run(cli, storage.clone()).await;
    storage.close().await;
    outcome
}
