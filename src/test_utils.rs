//! Shared fixtures for in-crate tests.

use crate::{
    config::{AppConfig, Args},
    services::build_store,
    state::AppState,
};
use tempfile::TempDir;

/// App state backed by a fresh mock store under a temp directory.
///
/// Keep the returned `TempDir` alive for as long as the state is used.
pub async fn mock_state() -> (TempDir, AppState) {
    let dir = TempDir::new().expect("create temp dir");
    let args = Args {
        mock: true,
        mock_storage_dir: Some(dir.path().join("mock-storage")),
        public_dir: Some(dir.path().join("public")),
        ..Args::default()
    };
    let config = AppConfig::resolve(args, |_| None).expect("mock config resolves");
    let selected = build_store(&config).await.expect("mock store builds");
    (dir, AppState::new(selected, config))
}
