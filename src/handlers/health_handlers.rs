//! Health & discovery handlers.
//!
//! - GET /api/upload/health -> liveness with a timestamp
//! - GET /api               -> directory of the upload endpoints

use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Value, json};

/// `GET /api/upload/health`
///
/// Cheap liveness check; never touches the storage backend.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            success: true,
            message: "Upload service is running".into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }),
    )
}

/// `GET /api`
pub async fn api_index() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Photo Upload API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /api/upload/health",
            "uploadSingle": "POST /api/upload/single",
            "uploadMultiple": "POST /api/upload/multiple",
            "listPhotos": "GET /api/upload/photos",
            "deletePhoto": "DELETE /api/upload/photos/:key",
            "presignedUrl": "POST /api/upload/presigned",
        },
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    success: bool,
    message: String,
    timestamp: String,
}
