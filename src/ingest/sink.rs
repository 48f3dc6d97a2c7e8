//! Write targets for the ingest function.

use crate::config::{IngestTarget, S3Settings};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{Client, error::DisplayErrorContext, primitives::ByteStream};
use bytes::Bytes;
use std::{path::PathBuf, sync::Arc};
use tokio::fs;

/// Somewhere to drop an object by key.
#[async_trait]
pub trait ObjectSink: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;
}

pub struct S3Sink {
    client: Client,
    bucket: String,
}

impl S3Sink {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectSink for S3Sink {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| anyhow::anyhow!("{}", DisplayErrorContext(&err)))
            .with_context(|| format!("putting {} into bucket {}", key, self.bucket))?;
        Ok(())
    }
}

/// Writes `root/<key>`, creating intermediate directories.
pub struct DirSink {
    root: PathBuf,
}

impl DirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectSink for DirSink {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<()> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&path, &body)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

/// Build the sink named by the configuration.
pub async fn from_target(target: &IngestTarget) -> Arc<dyn ObjectSink> {
    match target {
        IngestTarget::Directory(dir) => Arc::new(DirSink::new(dir.clone())),
        IngestTarget::S3(settings) => Arc::new(s3_sink(settings).await),
    }
}

async fn s3_sink(settings: &S3Settings) -> S3Sink {
    let client = crate::services::s3_store::connect(settings).await;
    S3Sink::new(client, settings.bucket.clone())
}
