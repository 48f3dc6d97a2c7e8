use crate::{
    config::AppConfig,
    services::{SelectedStore, mock_store::MockPhotoStore, photo_store::PhotoStore},
};
use std::sync::Arc;

/// Shared handler state. Everything in here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PhotoStore>,
    /// Set only in mock mode; backs the local presigned-upload endpoint.
    pub mock: Option<Arc<MockPhotoStore>>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(selected: SelectedStore, config: AppConfig) -> Self {
        Self {
            store: selected.store,
            mock: selected.mock,
            config: Arc::new(config),
        }
    }
}
