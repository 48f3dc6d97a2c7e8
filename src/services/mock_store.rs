//! src/services/mock_store.rs
//!
//! Filesystem stand-in for the S3 backend, used for local development.
//! Payloads sit flat in `base_path/<generated-name>` and are served back by
//! the API server under `/mock-storage/`. Keys still look like S3 keys
//! (`photos/<generated-name>`) so clients cannot tell the two apart.

use crate::{
    models::photo::{DeleteOutcome, PhotoFile, PresignedUpload, StoredObject, UploadResult},
    services::photo_store::{
        PHOTO_PREFIX, PhotoStore, StoreError, StoreResult, UploadPolicy, generate_photo_name,
        photo_key,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const TMP_PREFIX: &str = ".tmp-";

/// A direct-upload slot handed out by the presigner and not yet used.
#[derive(Debug, Clone)]
struct PendingUpload {
    content_type: String,
    expires_at: i64,
}

#[derive(Debug)]
pub struct MockPhotoStore {
    /// Directory holding the payloads.
    base_path: PathBuf,

    /// Origin the API server is reachable at, e.g. `http://localhost:3000`.
    public_base_url: String,

    policy: UploadPolicy,

    /// Keys minted by `presigned_upload_url`, consumed by the first PUT.
    pending: Mutex<HashMap<String, PendingUpload>>,
}

impl MockPhotoStore {
    /// Create the store, making sure `base_path` exists.
    pub async fn new(
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
        policy: UploadPolicy,
    ) -> StoreResult<Self> {
        let base_path = base_path.into();
        if !fs::try_exists(&base_path).await? {
            fs::create_dir_all(&base_path).await?;
            info!("Created mock storage directory at {}", base_path.display());
        }

        Ok(Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            policy,
            pending: Mutex::new(HashMap::new()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn url_for(&self, file_name: &str) -> String {
        format!("{}/mock-storage/{}", self.public_base_url, file_name)
    }

    /// Map a `photos/<name>` key to the bare file name on disk.
    ///
    /// Only single-component names are accepted, so a key can never reach
    /// outside `base_path`.
    fn file_name_for_key<'a>(&self, key: &'a str) -> StoreResult<&'a str> {
        let name = key
            .strip_prefix(PHOTO_PREFIX)
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        let unsafe_name = name.is_empty()
            || name.starts_with('.')
            || name.contains('/')
            || name.bytes().any(|b| b.is_ascii_control() || b == b'\\');
        if unsafe_name {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(name)
    }

    /// Write to a temp file next to the target and move it into place, so a
    /// concurrent listing never sees a half-written photo. The move is a hard
    /// link, which fails instead of replacing an existing photo.
    async fn write_payload(&self, file_name: &str, bytes: &[u8]) -> StoreResult<PathBuf> {
        let file_path = self.base_path.join(file_name);
        let tmp_path = self.base_path.join(format!("{TMP_PREFIX}{}", Uuid::new_v4()));

        let result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::hard_link(&tmp_path, &file_path).await
        }
        .await;
        let _ = fs::remove_file(&tmp_path).await;

        match result {
            Ok(()) => Ok(file_path),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(photo_key(file_name)))
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    /// Take the pending slot for `key`. A slot is usable once, expired or not.
    fn claim_pending(&self, key: &str) -> StoreResult<PendingUpload> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| StoreError::Backend("pending upload table poisoned".into()))?;
        let now = Utc::now().timestamp();
        let slot = pending.remove(key);
        pending.retain(|_, other| other.expires_at >= now);

        let slot = slot.ok_or(StoreError::UnknownUpload)?;
        if now > slot.expires_at {
            return Err(StoreError::UploadExpired);
        }
        Ok(slot)
    }

    /// Accept bytes sent to a URL minted by [`PhotoStore::presigned_upload_url`].
    ///
    /// This is the local stand-in for a client PUTting straight to S3. Only a
    /// key minted by the presigner is accepted, once, before its expiry, and
    /// with the content type it was signed for. `content_type` is what the
    /// client sent, if anything.
    pub async fn accept_direct_upload(
        &self,
        key: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> StoreResult<StoredObject> {
        let file_name = self.file_name_for_key(key)?;
        let slot = self.claim_pending(key)?;
        if content_type.is_some_and(|sent| !sent.eq_ignore_ascii_case(&slot.content_type)) {
            return Err(StoreError::ContentTypeMismatch);
        }
        self.policy.check_size(bytes.len())?;

        let path = self.write_payload(file_name, bytes).await?;
        info!("[MOCK S3] Direct upload stored: {}", path.display());

        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(file_name),
            last_modified: Some(Utc::now()),
            size: Some(bytes.len() as u64),
        })
    }
}

#[async_trait]
impl PhotoStore for MockPhotoStore {
    fn backend(&self) -> &'static str {
        "mock"
    }

    #[instrument(skip(self, file), fields(name = %file.original_name, size = file.size()))]
    async fn upload_photo(&self, file: PhotoFile) -> UploadResult {
        if let Err(err) = self.policy.check(&file) {
            debug!("rejected upload: {}", err);
            return UploadResult::failed(err.to_string());
        }

        let file_name = generate_photo_name(&file.original_name);
        match self.write_payload(&file_name, &file.bytes).await {
            Ok(path) => {
                info!("[MOCK S3] File uploaded: {}", path.display());
                UploadResult::stored(photo_key(&file_name), self.url_for(&file_name))
            }
            Err(err) => {
                warn!("[MOCK S3] Upload error: {}", err);
                UploadResult::failed(err.to_string())
            }
        }
    }

    async fn list_photos(&self, prefix: &str, max_keys: usize) -> StoreResult<Vec<StoredObject>> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut found = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let key = photo_key(&name);
            if !key.starts_with(prefix) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                // raced with a delete
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };

            found.push(StoredObject {
                url: self.url_for(&name),
                key,
                last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                size: Some(metadata.len()),
            });
        }

        found.sort_by(|a, b| a.key.cmp(&b.key));
        found.truncate(max_keys);
        Ok(found)
    }

    #[instrument(skip(self))]
    async fn delete_photo(&self, key: &str) -> DeleteOutcome {
        let file_name = match self.file_name_for_key(key) {
            Ok(name) => name,
            Err(err) => return DeleteOutcome::failed(err.to_string()),
        };
        let file_path = self.base_path.join(file_name);

        match fs::remove_file(&file_path).await {
            Ok(()) => {
                info!("[MOCK S3] File deleted: {}", file_path.display());
                DeleteOutcome::deleted()
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                DeleteOutcome::failed(StoreError::NotFound.to_string())
            }
            Err(err) => {
                warn!("[MOCK S3] Error deleting photo: {}", err);
                DeleteOutcome::failed(err.to_string())
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
        let expires_at = i64::try_from(expires_in.as_secs())
            .ok()
            .and_then(|secs| Utc::now().timestamp().checked_add(secs))
            .ok_or(StoreError::InvalidExpiry)?;
        let url = Url::parse_with_params(
            &format!("{}/api/upload/mock-upload", self.public_base_url),
            &[
                ("key", key.as_str()),
                ("contentType", content_type),
                ("expires", &expires_at.to_string()),
            ],
        )
        .map_err(|err| StoreError::Backend(format!("building mock upload url: {err}")))?;

        self.pending
            .lock()
            .map_err(|_| StoreError::Backend("pending upload table poisoned".into()))?
            .insert(
                key.clone(),
                PendingUpload {
                    content_type: content_type.to_string(),
                    expires_at,
                },
            );

        info!("[MOCK S3] Pre-signed URL generated for: {}", key);
        Ok(PresignedUpload {
            url: url.to_string(),
            key,
        })
    }
}
