mod config;
mod document;
mod errors;
mod llm_client;
mod routes;
mod scoring;
mod sections;
mod state;
mod storage;
mod tailoring;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::{
    AnthropicProvider, CompletionProvider, OpenAiProvider, PromptCache, ProviderChain, ProviderKind,
};
use crate::routes::build_router;
use crate::sections::SectionDetector;
use crate::state::AppState;
use crate::storage::S3DocumentStore;
use crate::tailoring::client::TailoringClient;
use crate::tailoring::telemetry::TrainingSink;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM providers in fallback order
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.llm_timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;
    let providers: Vec<Arc<dyn CompletionProvider>> = config
        .enabled_providers()
        .into_iter()
        .map(|kind| -> Arc<dyn CompletionProvider> {
            let settings = config.provider(kind).clone();
            match kind {
                ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(
                    http.clone(),
                    settings,
                    config.llm_max_retries,
                )),
                ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
                    http.clone(),
                    settings,
                    config.llm_max_retries,
                )),
            }
        })
        .collect();
    let chain = ProviderChain::new(providers).context("No LLM provider configured")?;
    info!("LLM providers initialized (order: {:?})", chain.kinds());

    // Initialize prompt cache (optional)
    let cache = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Prompt cache enabled (ttl {}s)", config.prompt_cache_ttl_secs);
            Some(PromptCache::new(client, config.prompt_cache_ttl_secs))
        }
        None => None,
    };

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let store = Arc::new(S3DocumentStore::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize training-data capture (optional)
    let telemetry = config.training_data_dir.as_ref().map(|dir| {
        info!("Training data capture enabled: {}", dir.display());
        Arc::new(TrainingSink::new(dir.clone()))
    });

    // Build app state
    let state = AppState {
        client: TailoringClient::new(chain, cache, config.completion),
        detector: Arc::new(SectionDetector::new()),
        store,
        telemetry,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "tailor-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
