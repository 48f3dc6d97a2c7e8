//! Multipart upload extractors.
//!
//! These run before a handler body does: they pull file fields out of the
//! multipart stream, enforce the MIME allowlist and the per-file byte ceiling,
//! and hand the surviving bytes on in memory. Nothing touches disk here.

use crate::{
    errors::AppError,
    models::photo::PhotoFile,
    services::photo_store::{StoreError, UploadPolicy},
    state::AppState,
};
use axum::extract::{
    FromRequest, Request,
    multipart::{Multipart, MultipartError},
};
use bytes::BytesMut;

/// Form field carrying the file for `POST /single`.
pub const SINGLE_FIELD: &str = "photo";
/// Form field carrying the files for `POST /multiple`.
pub const BATCH_FIELD: &str = "photos";
pub const MAX_FILES_PER_REQUEST: usize = 10;

/// Request-body ceiling for the upload routes: a full batch plus form overhead.
pub fn upload_body_limit(policy: &UploadPolicy) -> usize {
    policy
        .max_file_size
        .saturating_mul(MAX_FILES_PER_REQUEST)
        .saturating_add(64 * 1024)
}

/// The `photo` file of a multipart request, if one was sent.
pub struct SinglePhoto(pub Option<PhotoFile>);

/// Every `photos` file of a multipart request, at most [`MAX_FILES_PER_REQUEST`].
pub struct PhotoBatch(pub Vec<PhotoFile>);

impl FromRequest<AppState> for SinglePhoto {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let files = read_photo_fields(req, state, SINGLE_FIELD, 1).await?;
        Ok(Self(files.into_iter().next()))
    }
}

impl FromRequest<AppState> for PhotoBatch {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let files = read_photo_fields(req, state, BATCH_FIELD, MAX_FILES_PER_REQUEST).await?;
        Ok(Self(files))
    }
}

/// Collect the file parts named `field_name`.
///
/// A request that is not multipart at all yields no files, leaving the
/// handler to report what is missing.
async fn read_photo_fields(
    req: Request,
    state: &AppState,
    field_name: &str,
    max_files: usize,
) -> Result<Vec<PhotoFile>, AppError> {
    let Ok(mut multipart) = Multipart::from_request(req, state).await else {
        return Ok(Vec::new());
    };
    let policy = &state.config.policy;
    let mut files = Vec::new();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(field_name) || field.file_name().is_none() {
            continue;
        }
        if files.len() == max_files {
            return Err(AppError::bad_request(format!(
                "Too many files. At most {max_files} allowed per request"
            )));
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        policy.check_content_type(&mime_type)?;

        let mut buf = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            let size = buf.len() + chunk.len();
            if size > policy.max_file_size {
                return Err(StoreError::TooLarge {
                    size,
                    max: policy.max_file_size,
                }
                .into());
            }
            buf.extend_from_slice(&chunk);
        }

        tracing::debug!(
            name = %original_name,
            mime = %mime_type,
            size = buf.len(),
            "accepted upload field"
        );
        files.push(PhotoFile::new(buf.freeze(), mime_type, original_name));
    }

    Ok(files)
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}
