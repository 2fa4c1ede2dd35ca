use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use transcoder::app;
use transcoder::config::settings::{AppConfig, StoreBackend};
use transcoder::infrastructure::db::pool;
use transcoder::infrastructure::storage::StorageService;
use transcoder::infrastructure::transcoder::{FfmpegEngine, FfmpegSettings};
use transcoder::modules::jobs::repository::{JobRepository, MemoryJobRepository, PgJobRepository};
use transcoder::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting server...");

    let config = AppConfig::new().context("invalid configuration")?;

    let jobs: Arc<dyn JobRepository> = match config.job_store {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres job store")?;
            let db = pool::connect_to_db(url).await.context("failed to connect to PostgreSQL")?;
            pool::run_migrations(&db).await.context("failed to migrate the job store")?;
            Arc::new(PgJobRepository::new(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory job store; job records will not survive a restart");
            Arc::new(MemoryJobRepository::new())
        }
    };

    let storage = StorageService::new(
        config.s3_endpoint.as_deref(),
        &config.s3_region,
        &config.s3_bucket,
        &config.s3_access_key,
        &config.s3_secret_key,
    );
    let engine = FfmpegEngine::new(FfmpegSettings::from_config(&config));

    for dir in [&config.upload_dir, &config.output_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let port = config.server_port;
    let state = AppState::new(config, jobs, Arc::new(storage), Arc::new(engine));
    let app = app::create_app(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
