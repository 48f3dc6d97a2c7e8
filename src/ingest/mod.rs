//! Standalone ingest function.
//!
//! Accepts one frame per request from the capture client and drops it into
//! an object sink under a timestamp-derived key. It shares no code path with
//! the photo store: no MIME allowlist, no size policy beyond the body limit.

pub mod sink;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use sink::ObjectSink;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

/// Stand-in for the platform's request size cap.
pub const INGEST_BODY_LIMIT: usize = 10 * 1024 * 1024;
const FRAME_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Missing image data")]
    MissingImage,
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("{0}")]
    Sink(String),
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        match self {
            IngestError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            IngestError::MissingImage | IngestError::InvalidBody(_) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            IngestError::Sink(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message })),
            )
                .into_response(),
        }
    }
}

#[derive(Clone)]
pub struct IngestState {
    secret: Arc<str>,
    sink: Arc<dyn ObjectSink>,
}

impl IngestState {
    pub fn new(secret: impl Into<Arc<str>>, sink: Arc<dyn ObjectSink>) -> Self {
        Self {
            secret: secret.into(),
            sink,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IngestBody {
    image: Option<String>,
}

pub fn router(state: IngestState) -> Router {
    Router::new()
        .route("/upload", post(ingest))
        .layer(DefaultBodyLimit::max(INGEST_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /upload`
///
/// Body is either `{"image": "<base64>"}` or raw `image/*` bytes.
pub async fn ingest(
    State(state): State<IngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, IngestError> {
    authorize(&headers, &state.secret)?;
    let image = decode_image(&headers, body)?;

    let key = frame_key(Utc::now());
    let size = image.len();
    state
        .sink
        .put(&key, image, FRAME_CONTENT_TYPE)
        .await
        .map_err(|err| {
            warn!("ingest write failed: {:#}", err);
            IngestError::Sink(format!("{:#}", err))
        })?;

    info!(key = %key, size, "frame ingested");
    Ok(Json(json!({ "success": true, "key": key })))
}

fn authorize(headers: &HeaderMap, secret: &str) -> Result<(), IngestError> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .map(|v| v.as_bytes())
        .unwrap_or_default();
    let expected = format!("Bearer {secret}");
    if constant_time_eq(presented, expected.as_bytes()) {
        Ok(())
    } else {
        Err(IngestError::Unauthorized)
    }
}

fn decode_image(headers: &HeaderMap, body: Bytes) -> Result<Bytes, IngestError> {
    let raw_image = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("image/"));
    if raw_image {
        return if body.is_empty() {
            Err(IngestError::MissingImage)
        } else {
            Ok(body)
        };
    }

    // an absent body counts as `{}`
    let parsed: IngestBody = if body.is_empty() {
        IngestBody { image: None }
    } else {
        serde_json::from_slice(&body).map_err(|err| IngestError::InvalidBody(err.to_string()))?
    };
    let encoded = parsed
        .image
        .filter(|s| !s.is_empty())
        .ok_or(IngestError::MissingImage)?;
    general_purpose::STANDARD
        .decode(encoded.trim())
        .map(Bytes::from)
        .map_err(|err| IngestError::InvalidBody(format!("image is not valid base64: {err}")))
}

/// `photos/<unix-millis>-<8 hex>.jpg`; the suffix keeps two frames landing in
/// the same millisecond apart.
pub fn frame_key(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("photos/{}-{}.jpg", at.timestamp_millis(), &suffix[..8])
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::sink::DirSink;
    use axum::http::HeaderValue;
    use axum_test::TestServer;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const SECRET: &str = "6f569874-e494-4840-bafa-e6db0f7922c2";

    fn server() -> (TempDir, TestServer) {
        let dir = TempDir::new().unwrap();
        let state = IngestState::new(SECRET, Arc::new(DirSink::new(dir.path())));
        (dir, TestServer::new(router(state)).unwrap())
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }

    fn stored_frames(dir: &TempDir) -> Vec<std::path::PathBuf> {
        let photos = dir.path().join("photos");
        match std::fs::read_dir(photos) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn wrong_or_missing_token_is_unauthorized_and_stores_nothing() {
        let (dir, server) = server();
        let body = json!({ "image": general_purpose::STANDARD.encode(b"frame") });

        let response = server
            .post("/upload")
            .add_header(header::AUTHORIZATION, bearer("nope"))
            .json(&body)
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.text(), "Unauthorized");

        let response = server.post("/upload").json(&body).await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        assert!(stored_frames(&dir).is_empty());
    }

    #[tokio::test]
    async fn base64_json_body_is_decoded_and_stored() {
        let (dir, server) = server();
        let response = server
            .post("/upload")
            .add_header(header::AUTHORIZATION, bearer(SECRET))
            .json(&json!({ "image": general_purpose::STANDARD.encode(b"jpeg-frame") }))
            .await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["success"], json!(true));
        let key = body["key"].as_str().unwrap();
        assert!(key.starts_with("photos/") && key.ends_with(".jpg"));

        let written = std::fs::read(dir.path().join(key)).unwrap();
        assert_eq!(written, b"jpeg-frame");
    }

    #[tokio::test]
    async fn raw_image_body_is_stored_as_is() {
        let (dir, server) = server();
        let response = server
            .post("/upload")
            .add_header(header::AUTHORIZATION, bearer(SECRET))
            .content_type("image/jpeg")
            .bytes(Bytes::from_static(&[0xFF, 0xD8, 0xFF]))
            .await;
        response.assert_status_ok();

        let frames = stored_frames(&dir);
        assert_eq!(frames.len(), 1);
        assert_eq!(std::fs::read(&frames[0]).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn missing_or_malformed_image_is_bad_request() {
        let (dir, server) = server();
        for body in [json!({}), json!({ "image": "" }), json!({ "image": "%%%" })] {
            let response = server
                .post("/upload")
                .add_header(header::AUTHORIZATION, bearer(SECRET))
                .json(&body)
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
        }

        let response = server
            .post("/upload")
            .add_header(header::AUTHORIZATION, bearer(SECRET))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), "Missing image data");

        assert!(stored_frames(&dir).is_empty());
    }

    #[test]
    fn frame_keys_are_timestamped_and_distinct() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let a = frame_key(at);
        let b = frame_key(at);
        assert!(a.starts_with("photos/1700000000123-"));
        assert!(a.ends_with(".jpg"));
        assert_ne!(a, b);
    }

    #[test]
    fn constant_time_eq_matches_plain_equality() {
        assert!(constant_time_eq(b"Bearer abc", b"Bearer abc"));
        assert!(!constant_time_eq(b"Bearer abc", b"Bearer abd"));
        assert!(!constant_time_eq(b"Bearer abc", b"Bearer abcd"));
        assert!(!constant_time_eq(b"", b"Bearer abc"));
    }
}
