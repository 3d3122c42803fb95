use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sift::core::config::{load_config, Config};
use sift::core::llm::LlmClient;
use sift::core::store::RecordStore;
use sift::core::sync::SyncRunner;
use sift::core::youtube::YoutubeClient;

mod routes;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<SyncRunner<YoutubeClient, LlmClient>>,
    pub store: RecordStore,
    pub config: Arc<Config>,
    pub auth_key: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "podium=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("SIFT_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

    // Create a dummy config if not exists for first run ease
    if !std::path::Path::new(&config_path).exists() {
        let dummy_config = r#"
[server]
port = 8899
auth_key = "my-secret-key-123"

[store]
path = "data/sift"

[youtube]
api_key = ""
playlist_id = ""
comments_page_limit = 0

[llm]
api_url = "http://localhost:11434/v1"
model = "llama3"

[sync]
# interval_min = 360
"#;
        std::fs::write(&config_path, dummy_config)?;
    }

    let config = load_config(&config_path)?;
    if let Err(e) = config.validate() {
        // Keep serving so the trigger endpoint can report the problem, but
        // no run will start until the config is fixed.
        tracing::warn!("config incomplete, sync runs disabled: {}", e);
    }

    let store = RecordStore::open(&config.store.path)?;
    let source = Arc::new(YoutubeClient::new(config.youtube.clone()));
    let model = Arc::new(LlmClient::new(config.llm.clone()));
    let runner = Arc::new(SyncRunner::new(
        source,
        model,
        store.clone(),
        config.sync.clone(),
    ));

    if let Some(minutes) = config.sync.interval_min {
        let scheduled = runner.clone();
        let scheduled_config = config.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(minutes.max(1) * 60));
            loop {
                interval.tick().await;
                if let Err(e) = scheduled_config.validate() {
                    tracing::warn!("skipping scheduled sync: {}", e);
                    continue;
                }
                match scheduled.run().await {
                    Ok(stats) => tracing::info!(
                        "scheduled sync done: fetched={} scored={} featured={} ranked={}",
                        stats.fetched,
                        stats.scored,
                        stats.featured,
                        stats.ranked
                    ),
                    Err(e) => tracing::error!("scheduled sync failed: {:#}", e),
                }
            }
        });
    }

    let state = AppState {
        runner,
        store,
        auth_key: config.server.auth_key.clone(),
        config: Arc::new(config.clone()),
    };

    let app = Router::new()
        .route(
            "/api/sync/comments",
            get(routes::sync::run_sync).post(routes::sync::run_sync),
        )
        .route("/api/comments/hide", post(routes::moderation::hide_comment))
        .route("/api/community/featured", get(routes::community::featured))
        .route(
            "/api/community/leaderboard",
            get(routes::community::leaderboard),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
