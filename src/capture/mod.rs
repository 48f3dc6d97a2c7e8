//! Camera polling client.
//!
//! Every tick fetches one frame from the camera, refreshes the preview file and
//! relays the same bytes to the ingest endpoint. There is no retry or dedup; a
//! failed tick is simply logged and the next one starts fresh.

use crate::config::CaptureConfig;
use bytes::Bytes;
use reqwest::{StatusCode, header};
use std::{ffi::OsString, path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::{
    fs,
    task::JoinSet,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("camera request failed: {0}")]
    Camera(#[source] reqwest::Error),
    #[error("camera responded with {0}")]
    CameraStatus(StatusCode),
    #[error("Invalid image data received")]
    EmptyFrame,
    #[error("upload request failed: {0}")]
    Upload(#[source] reqwest::Error),
    #[error("upload rejected with {status}: {body}")]
    UploadStatus { status: StatusCode, body: String },
    #[error("writing preview {path}: {source}")]
    Preview {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct CaptureClient {
    http: reqwest::Client,
    config: CaptureConfig,
}

impl CaptureClient {
    pub fn new(config: CaptureConfig) -> Result<Self, CaptureError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(CaptureError::Client)?;
        Ok(Self { http, config })
    }

    /// Poll until `stop` fires.
    ///
    /// Attempts already in flight when the token is cancelled are awaited
    /// before returning, but they no longer touch the preview.
    pub async fn run(self: Arc<Self>, stop: CancellationToken) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut attempts = JoinSet::new();

        info!(
            camera = %self.config.camera_url,
            upload = %self.config.upload_url,
            interval = ?self.config.interval,
            "capture started"
        );

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            while let Some(done) = attempts.try_join_next() {
                if let Err(err) = done {
                    warn!("capture attempt panicked: {}", err);
                }
            }

            let client = Arc::clone(&self);
            let stop = stop.clone();
            attempts.spawn(async move { client.attempt(&stop).await });
        }

        info!(pending = attempts.len(), "capture stopped");
        while let Some(done) = attempts.join_next().await {
            if let Err(err) = done {
                warn!("capture attempt panicked: {}", err);
            }
        }
    }

    async fn attempt(&self, stop: &CancellationToken) {
        match self.capture_once(stop).await {
            Ok(size) => info!("Photo uploaded ({} bytes)", size),
            Err(err) => warn!("Capture failed: {}", err),
        }
    }

    /// One fetch, one preview refresh, one upload. Returns the frame size.
    ///
    /// A failed preview write is logged and does not hold back the upload.
    pub async fn capture_once(&self, stop: &CancellationToken) -> Result<usize, CaptureError> {
        let frame = self.fetch_frame().await?;

        if stop.is_cancelled() {
            debug!("stopped; skipping preview refresh");
        } else if let Err(err) = self.show_preview(&frame).await {
            warn!("{}", err);
        }

        self.upload_frame(frame.clone()).await?;
        Ok(frame.len())
    }

    async fn fetch_frame(&self) -> Result<Bytes, CaptureError> {
        let response = self
            .http
            .get(&self.config.camera_url)
            .send()
            .await
            .map_err(CaptureError::Camera)?;
        if !response.status().is_success() {
            return Err(CaptureError::CameraStatus(response.status()));
        }
        let frame = response.bytes().await.map_err(CaptureError::Camera)?;
        if frame.is_empty() {
            return Err(CaptureError::EmptyFrame);
        }
        Ok(frame)
    }

    async fn show_preview(&self, frame: &Bytes) -> Result<(), CaptureError> {
        let path = &self.config.preview_path;
        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let preview_err = |source| CaptureError::Preview {
            path: path.clone(),
            source,
        };
        fs::write(&tmp, frame).await.map_err(preview_err)?;
        fs::rename(&tmp, path).await.map_err(preview_err)?;

        debug!(path = %path.display(), size = frame.len(), "preview refreshed");
        Ok(())
    }

    async fn upload_frame(&self, frame: Bytes) -> Result<(), CaptureError> {
        let response = self
            .http
            .post(&self.config.upload_url)
            .header(header::CONTENT_TYPE, "image/jpeg")
            .bearer_auth(&self.config.token)
            .body(frame)
            .send()
            .await
            .map_err(CaptureError::Upload)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(CaptureError::UploadStatus { status, body })
    }
}
