//! src/services/photo_store.rs
//!
//! The storage facade every backend implements. Handlers only ever see an
//! `Arc<dyn PhotoStore>`; which backend sits behind it is decided once at
//! startup by [`crate::services::build_store`].

use crate::models::photo::{DeleteOutcome, PhotoFile, PresignedUpload, StoredObject, UploadResult};
use async_trait::async_trait;
use futures::future::join_all;
use std::{io, path::Path, time::Duration};
use thiserror::Error;
use uuid::Uuid;

/// Every generated key lives under this prefix.
pub const PHOTO_PREFIX: &str = "photos/";
pub const DEFAULT_MAX_KEYS: usize = 100;
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(3600);
/// Longest lifetime S3 accepts for a presigned URL (7 days).
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(604_800);

pub const DEFAULT_ALLOWED_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];
pub const DEFAULT_MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

const MAX_EXTENSION_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid file type. Allowed types: {allowed}")]
    InvalidContentType { content_type: String, allowed: String },
    #[error("File too large. Maximum size is {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("invalid photo key `{0}`")]
    InvalidKey(String),
    #[error("File not found")]
    NotFound,
    #[error("invalid expiresIn")]
    InvalidExpiry,
    #[error("Upload URL is not valid")]
    UnknownUpload,
    #[error("Upload URL has expired")]
    UploadExpired,
    #[error("Content-Type does not match the signed upload")]
    ContentTypeMismatch,
    #[error("Photo `{0}` already exists")]
    AlreadyExists(String),
    #[error("{0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// MIME allowlist and byte ceiling applied to every upload.
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    pub allowed_mime_types: Vec<String>,
    pub max_file_size: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl UploadPolicy {
    pub fn check_content_type(&self, content_type: &str) -> StoreResult<()> {
        if self
            .allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(content_type))
        {
            Ok(())
        } else {
            Err(StoreError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: self.allowed_mime_types.join(", "),
            })
        }
    }

    pub fn check_size(&self, size: usize) -> StoreResult<()> {
        if size > self.max_file_size {
            return Err(StoreError::TooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Both checks, content type first.
    pub fn check(&self, file: &PhotoFile) -> StoreResult<()> {
        self.check_content_type(&file.mime_type)?;
        self.check_size(file.size())
    }
}

/// Uniform interface over the filesystem mock and the S3 backend.
///
/// Upload and delete report failure as values so one bad file never aborts a
/// batch; listing and presigning return `Err` and are mapped to a response one
/// layer up.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;

    async fn upload_photo(&self, file: PhotoFile) -> UploadResult;

    /// Uploads every file concurrently and returns results in input order.
    async fn upload_multiple_photos(&self, files: Vec<PhotoFile>) -> Vec<UploadResult> {
        join_all(files.into_iter().map(|file| self.upload_photo(file))).await
    }

    async fn list_photos(&self, prefix: &str, max_keys: usize) -> StoreResult<Vec<StoredObject>>;

    async fn delete_photo(&self, key: &str) -> DeleteOutcome;

    async fn presigned_upload_url(
        &self,
        file_name: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StoreResult<PresignedUpload>;
}

/// Generate a collision-resistant file name that keeps the client's extension.
///
/// `holiday.JPG` becomes `<uuid-v4>.JPG`; names without a usable extension get
/// the bare UUID.
pub fn generate_photo_name(original_name: &str) -> String {
    let id = Uuid::new_v4();
    match extension_of(original_name) {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}

/// Full object key for a generated file name.
pub fn photo_key(file_name: &str) -> String {
    format!("{PHOTO_PREFIX}{file_name}")
}

/// Reject presign lifetimes outside `1s..=7 days`.
pub fn check_presign_expiry(expires_in: Duration) -> StoreResult<()> {
    if expires_in.is_zero() || expires_in > MAX_PRESIGN_EXPIRY {
        return Err(StoreError::InvalidExpiry);
    }
    Ok(())
}

fn extension_of(name: &str) -> Option<&str> {
    let ext = Path::new(name).extension()?.to_str()?;
    let usable = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    usable.then_some(ext)
}
