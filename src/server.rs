//! Process plumbing shared by the HTTP binaries.

use anyhow::Result;
use std::io::ErrorKind;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};

/// Bind `host:port`, retrying on loopback when a wildcard bind is refused.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{}:{}", host, port);
    match TcpListener::bind(&addr).await {
        Ok(listener) => Ok(listener),
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied && matches!(host, "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", port);
            warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr, err, fallback_addr
            );
            Ok(TcpListener::bind(&fallback_addr).await?)
        }
        Err(err) => Err(err.into()),
    }
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("SIGTERM handler unavailable: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_an_ephemeral_port() {
        let listener = bind("127.0.0.1", 0).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
