use anyhow::Result;
use photo_upload::{
    config::AppConfig,
    routes::routes::routes,
    server::{bind, shutdown_signal},
    services::build_store,
    state::AppState,
};
use tokio::fs;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!("Starting photo-upload with config: {:?}", cfg);

    if !fs::try_exists(&cfg.public_dir).await.unwrap_or(false) {
        tracing::warn!(
            "Static directory {} does not exist; only the API will be served",
            cfg.public_dir.display()
        );
    }

    // --- Select storage backend ---
    let store = build_store(&cfg).await?;
    tracing::info!("Storage backend: {}", store.store.backend());
    let app = routes(AppState::new(store, cfg.clone()));

    // --- Start server ---
    let listener = bind(&cfg.host, cfg.port).await?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    tracing::info!("Health check: {}/api/upload/health", cfg.public_base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
