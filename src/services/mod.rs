//! Storage backends behind the [`photo_store::PhotoStore`] facade.

pub mod mock_store;
pub mod photo_store;
pub mod s3_store;

use crate::config::AppConfig;
use anyhow::{Context, Result};
use mock_store::MockPhotoStore;
use photo_store::PhotoStore;
use s3_store::S3PhotoStore;
use std::sync::Arc;

/// The backend chosen at startup.
///
/// `mock` is set only when the filesystem backend is active; the mock-only
/// routes use it directly.
#[derive(Clone)]
pub struct SelectedStore {
    pub store: Arc<dyn PhotoStore>,
    pub mock: Option<Arc<MockPhotoStore>>,
}

/// Build the one backend this process will use, based on `config.use_mock`.
pub async fn build_store(config: &AppConfig) -> Result<SelectedStore> {
    if config.use_mock {
        let mock = Arc::new(
            MockPhotoStore::new(
                &config.mock_storage_dir,
                config.public_base_url.clone(),
                config.policy.clone(),
            )
            .await
            .with_context(|| {
                format!(
                    "preparing mock storage at {}",
                    config.mock_storage_dir.display()
                )
            })?,
        );
        tracing::info!("[CONFIG] Using MOCK S3 service");
        return Ok(SelectedStore {
            store: mock.clone(),
            mock: Some(mock),
        });
    }

    let settings = config
        .s3
        .clone()
        .context("S3 settings missing while mock mode is off")?;
    let client = s3_store::connect(&settings).await;
    tracing::info!("[CONFIG] Using REAL S3 service");
    Ok(SelectedStore {
        store: Arc::new(S3PhotoStore::new(client, settings, config.policy.clone())),
        mock: None,
    })
}
