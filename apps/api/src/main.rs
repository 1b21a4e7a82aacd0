mod config;
mod db;
mod errors;
mod generation;
mod llm_client;
mod models;
mod question_set;
mod routes;
mod session;
mod state;
mod stores;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, GenerationBackend};
use crate::db::{create_pool, run_migrations};
use crate::generation::channel::GenerationChannel;
use crate::generation::llm_channel::LlmGenerationChannel;
use crate::generation::ws_channel::WsGenerationChannel;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::session::SessionRegistry;
use crate::state::AppState;
use crate::stores::postgres::PgStores;
use crate::stores::s3::S3SectionStore;
use crate::stores::Stores;

const SESSION_SWEEP_EVERY: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing or malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    let pg = Arc::new(PgStores::new(db));
    let stores = Stores {
        question_sets: pg.clone(),
        sections: Arc::new(S3SectionStore::new(s3, config.s3_bucket.clone())),
        instructions: pg.clone(),
        assessments: pg.clone(),
        candidates: pg.clone(),
        positions: pg,
    };

    // Initialize generation transport
    let generator: Arc<dyn GenerationChannel> = match &config.generation {
        GenerationBackend::WebSocket { url } => {
            info!("Generation via WebSocket service at {url}");
            Arc::new(WsGenerationChannel::new(url.clone()))
        }
        GenerationBackend::Llm { api_key } => {
            let llm = LlmClient::new(api_key.clone())?;
            info!("Generation via LLM client (model: {})", llm_client::MODEL);
            Arc::new(LlmGenerationChannel::new(llm))
        }
    };

    info!(
        "Engine settings: reveal {:?}/char, library batch {}, fan-out {}, session idle {:?}",
        config.settings.reveal_cadence,
        config.settings.library_batch_size,
        config.settings.fanout_concurrency,
        config.settings.session_idle
    );

    // Abandoned drafts are closed in the background
    let sessions = Arc::new(SessionRegistry::default());
    sessions
        .clone()
        .spawn_sweeper(config.settings.session_idle, SESSION_SWEEP_EVERY);

    // Build app state
    let state = AppState {
        stores,
        generator,
        sessions,
        settings: config.settings,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the recruiter dashboard host

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
        "interview-api-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
