//! HTTP handlers for photo operations.
//! Each handler calls exactly one storage operation and wraps the outcome in
//! the `{success, message?, data?, error?}` envelope.

use crate::{
    errors::{ApiResponse, AppError},
    middleware::upload::{PhotoBatch, SinglePhoto},
    models::photo::{StoredObject, UploadResult},
    services::photo_store::{
        DEFAULT_MAX_KEYS, DEFAULT_PRESIGN_EXPIRY, PHOTO_PREFIX, check_presign_expiry,
    },
    state::AppState,
};
use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on `maxKeys`, matching what S3 will return in one page.
const MAX_LIST_KEYS: usize = 1000;

/// Query params accepted by `GET /photos`.
#[derive(Debug, Deserialize)]
pub struct ListPhotosQuery {
    pub prefix: Option<String>,
    #[serde(rename = "maxKeys")]
    pub max_keys: Option<usize>,
}

/// Body of `POST /presigned`. Fields are optional so a missing one can be
/// reported in the envelope instead of as a bare deserialization error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedRequest {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub expires_in: Option<u64>,
}

/// Query string of a mock presigned URL. Its `contentType` and `expires`
/// params are informational; the store keeps the signed values.
#[derive(Debug, Deserialize)]
pub struct MockUploadQuery {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct UploadedPhoto {
    pub key: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FailedPhoto {
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchUploadData {
    pub successful: Vec<UploadedPhoto>,
    pub failed: Vec<FailedPhoto>,
}

/// `POST /api/upload/single`: one photo in field `photo`.
pub async fn upload_single(
    State(state): State<AppState>,
    SinglePhoto(photo): SinglePhoto,
) -> Result<Response, AppError> {
    let photo = photo.ok_or_else(|| AppError::bad_request("No file uploaded"))?;

    let result = state.store.upload_photo(photo).await;
    if !result.success {
        return Err(AppError::internal(
            result.error.unwrap_or_else(|| "Upload failed".into()),
        ));
    }

    Ok(ApiResponse::ok(UploadedPhoto {
        key: result.key,
        url: result.url,
    })
    .with_message("Photo uploaded successfully")
    .into_response())
}

/// `POST /api/upload/multiple`: up to ten photos in field `photos`.
///
/// Always 200 once files were received; per-file failures are listed in
/// `data.failed`.
pub async fn upload_multiple(
    State(state): State<AppState>,
    PhotoBatch(photos): PhotoBatch,
) -> Result<Response, AppError> {
    if photos.is_empty() {
        return Err(AppError::bad_request("No files uploaded"));
    }

    let results = state.store.upload_multiple_photos(photos).await;
    let (successful, failed): (Vec<UploadResult>, Vec<UploadResult>) =
        results.into_iter().partition(|r| r.success);

    let message = format!("{} photos uploaded successfully", successful.len());
    let data = BatchUploadData {
        successful: successful
            .into_iter()
            .map(|r| UploadedPhoto {
                key: r.key,
                url: r.url,
            })
            .collect(),
        failed: failed
            .into_iter()
            .map(|r| FailedPhoto { error: r.error })
            .collect(),
    };

    Ok(ApiResponse::ok(data).with_message(message).into_response())
}

/// `GET /api/upload/photos?prefix=&maxKeys=`
pub async fn list_photos(
    State(state): State<AppState>,
    query: Result<Query<ListPhotosQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(q) = query.map_err(|err| AppError::bad_request(err.body_text()))?;
    let prefix = q.prefix.unwrap_or_else(|| PHOTO_PREFIX.into());
    let max_keys = q.max_keys.unwrap_or(DEFAULT_MAX_KEYS).min(MAX_LIST_KEYS);

    let photos: Vec<StoredObject> = state.store.list_photos(&prefix, max_keys).await?;
    Ok(ApiResponse::ok(photos).into_response())
}

/// `DELETE /api/upload/photos/{*key}`: key may contain slashes.
pub async fn delete_photo(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let outcome = state.store.delete_photo(&key).await;
    if !outcome.success {
        return Err(AppError::internal(
            outcome.error.unwrap_or_else(|| "Delete failed".into()),
        ));
    }
    Ok(ApiResponse::message("Photo deleted successfully").into_response())
}

/// `POST /api/upload/presigned`: mint a direct-upload URL.
pub async fn presigned_upload(
    State(state): State<AppState>,
    body: Result<Json<PresignedRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = body.map_err(|err| AppError::bad_request(err.body_text()))?;
    let (Some(file_name), Some(content_type)) = (
        req.file_name.filter(|s| !s.is_empty()),
        req.content_type.filter(|s| !s.is_empty()),
    ) else {
        return Err(AppError::bad_request(
            "fileName and contentType are required",
        ));
    };
    let expires_in = req
        .expires_in
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_PRESIGN_EXPIRY);
    check_presign_expiry(expires_in)?;

    let presigned = state
        .store
        .presigned_upload_url(&file_name, &content_type, expires_in)
        .await?;
    Ok(ApiResponse::ok(presigned).into_response())
}

/// `PUT /api/upload/mock-upload?key=&contentType=&expires=`
///
/// Local counterpart of an S3 presigned PUT. Only routed in mock mode.
pub async fn mock_upload(
    State(state): State<AppState>,
    query: Result<Query<MockUploadQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let mock = state
        .mock
        .as_ref()
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Mock storage is not enabled"))?;
    let Query(q) = query.map_err(|err| AppError::bad_request(err.body_text()))?;
    let sent_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let stored = mock.accept_direct_upload(&q.key, sent_type, &body).await?;
    Ok(ApiResponse::ok(stored)
        .with_message("Photo uploaded successfully")
        .into_response())
}
