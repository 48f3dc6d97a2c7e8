use anyhow::Result;
use photo_upload::{
    config::{IngestConfig, IngestTarget},
    ingest::{IngestState, router, sink},
    server::{bind, shutdown_signal},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = IngestConfig::from_env_and_args()?;
    match &cfg.target {
        IngestTarget::S3(s3) => tracing::info!("Ingesting into s3://{}", s3.bucket),
        IngestTarget::Directory(dir) => tracing::info!("Ingesting into {}", dir.display()),
    }

    let sink = sink::from_target(&cfg.target).await;
    let app = router(IngestState::new(cfg.secret.as_str(), sink));

    let listener = bind(&cfg.host, cfg.port).await?;
    tracing::info!("Ingest listening on http://{}/upload", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
