use anyhow::Result;
use photo_upload::{capture::CaptureClient, config::CaptureConfig, server::shutdown_signal};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = CaptureConfig::from_env_and_args()?;
    let client = Arc::new(CaptureClient::new(cfg)?);

    let stop = CancellationToken::new();
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_stop.cancel();
    });

    client.run(stop).await;
    Ok(())
}
