//! src/services/s3_store.rs
//!
//! S3-backed photo store. Every operation is one SDK call against the
//! configured bucket; presigned URLs are minted locally by the SDK signer.

use crate::{
    config::S3Settings,
    models::photo::{DeleteOutcome, PhotoFile, PresignedUpload, StoredObject, UploadResult},
    services::photo_store::{
        PhotoStore, StoreError, StoreResult, UploadPolicy, generate_photo_name, photo_key,
    },
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client, config::Builder as S3ConfigBuilder, error::DisplayErrorContext,
    presigning::PresigningConfig, primitives::ByteStream, types::ObjectCannedAcl,
};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Build an S3 client from the default credential chain plus our overrides.
pub async fn connect(settings: &S3Settings) -> Client {
    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(settings.region.clone()))
        .load()
        .await;

    let mut builder = S3ConfigBuilder::from(&aws_config);
    // MinIO / LocalStack
    if let Some(endpoint_url) = &settings.endpoint_url {
        builder = builder.endpoint_url(endpoint_url);
    }
    if settings.force_path_style {
        builder = builder.force_path_style(true);
    }

    info!(
        bucket = %settings.bucket,
        region = %settings.region,
        "S3 client initialized"
    );
    Client::from_conf(builder.build())
}

pub struct S3PhotoStore {
    client: Client,
    settings: S3Settings,
    policy: UploadPolicy,
}

impl S3PhotoStore {
    pub fn new(client: Client, settings: S3Settings, policy: UploadPolicy) -> Self {
        Self {
            client,
            settings,
            policy,
        }
    }

    /// Public URL of an object. Virtual-hosted AWS style unless a custom
    /// endpoint is configured, in which case path style is used.
    pub fn object_url(&self, key: &str) -> String {
        match &self.settings.endpoint_url {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.settings.bucket,
                key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.settings.bucket, self.settings.region, key
            ),
        }
    }

    fn acl(&self) -> Option<ObjectCannedAcl> {
        self.settings
            .public_read
            .then_some(ObjectCannedAcl::PublicRead)
    }
}

#[async_trait]
impl PhotoStore for S3PhotoStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self, file), fields(name = %file.original_name, size = file.size()))]
    async fn upload_photo(&self, file: PhotoFile) -> UploadResult {
        if let Err(err) = self.policy.check(&file) {
            debug!("rejected upload: {}", err);
            return UploadResult::failed(err.to_string());
        }

        let key = photo_key(&generate_photo_name(&file.original_name));
        let sent = self
            .client
            .put_object()
            .bucket(&self.settings.bucket)
            .key(&key)
            .body(ByteStream::from(file.bytes))
            .content_type(&file.mime_type)
            .set_acl(self.acl())
            .send()
            .await;

        match sent {
            Ok(_) => {
                info!(key = %key, "photo uploaded to S3");
                let url = self.object_url(&key);
                UploadResult::stored(key, url)
            }
            Err(err) => {
                let message = DisplayErrorContext(&err).to_string();
                error!("S3 upload error: {}", message);
                UploadResult::failed(message)
            }
        }
    }

    async fn list_photos(&self, prefix: &str, max_keys: usize) -> StoreResult<Vec<StoredObject>> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.settings.bucket)
            .prefix(prefix)
            .max_keys(i32::try_from(max_keys).unwrap_or(i32::MAX))
            .send()
            .await
            .map_err(|err| {
                let message = DisplayErrorContext(&err).to_string();
                error!("Error listing photos: {}", message);
                StoreError::Backend(message)
            })?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|item| {
                let key = item.key()?;
                key.starts_with(prefix).then(|| StoredObject {
                    key: key.to_string(),
                    url: self.object_url(key),
                    last_modified: item
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                    size: item.size().and_then(|s| u64::try_from(s).ok()),
                })
            })
            .take(max_keys)
            .collect();

        Ok(objects)
    }

    #[instrument(skip(self))]
    async fn delete_photo(&self, key: &str) -> DeleteOutcome {
        let sent = self
            .client
            .delete_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .send()
            .await;

        match sent {
            Ok(_) => {
                debug!(key = %key, "photo deleted from S3");
                DeleteOutcome::deleted()
            }
            Err(err) => {
                let message = DisplayErrorContext(&err).to_string();
                error!("Error deleting photo: {}", message);
                DeleteOutcome::failed(message)
            }
        }
    }

    async fn presigned_upload_url(
        &self,
        file_name: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StoreResult<PresignedUpload> {
        self.policy.check_content_type(content_type)?;

        let key = photo_key(&generate_photo_name(file_name));
        let presigning = PresigningConfig::expires_in(expires_in).map_err(|err| {
            debug!("rejected presign expiry: {}", err);
            StoreError::InvalidExpiry
        })?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.settings.bucket)
            .key(&key)
            .content_type(content_type)
            .set_acl(self.acl())
            .presigned(presigning)
            .await
            .map_err(|err| {
                let message = DisplayErrorContext(&err).to_string();
                error!("Error generating pre-signed URL: {}", message);
                StoreError::Backend(message)
            })?;

        Ok(PresignedUpload {
            url: presigned.uri().to_string(),
            key,
        })
    }
}
