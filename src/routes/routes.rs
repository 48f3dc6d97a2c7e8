//! Defines routes for the photo upload API.
//!
//! ## Structure
//! - **Upload endpoints** (nested under `/api/upload`)
//!   - `GET    /health`        — liveness
//!   - `POST   /single`        — upload one photo (field `photo`)
//!   - `POST   /multiple`      — upload up to ten photos (field `photos`)
//!   - `GET    /photos`        — list photos (supports prefix, maxKeys)
//!   - `DELETE /photos/{*key}` — delete a photo
//!   - `POST   /presigned`     — mint a direct-upload URL
//!   - `PUT    /mock-upload`   — mock mode only, target of mock presigned URLs
//!
//! - **Other**
//!   - `GET /api`              — endpoint directory
//!   - `/mock-storage/*`       — mock mode only, stored payloads
//!   - everything else         — static tester page from the public directory
//!
//! The wildcard `*key` allows keys like `photos/abc.jpg`.

use crate::{
    errors::AppError,
    handlers::{
        health_handlers::{api_index, health},
        photo_handlers::{
            delete_photo, list_photos, mock_upload, presigned_upload, upload_multiple,
            upload_single,
        },
    },
    middleware::upload::upload_body_limit,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use std::any::Any;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Build the complete application router with its state attached.
///
/// Mock-only routes are mounted when `state.mock` is set, so the router shape
/// follows the backend chosen at startup.
pub fn routes(state: AppState) -> Router {
    let body_limit = upload_body_limit(&state.config.policy);

    let mut upload = Router::new()
        .route("/health", get(health))
        .route("/single", post(upload_single))
        .route("/multiple", post(upload_multiple))
        .route("/photos", get(list_photos))
        .route("/photos/{*key}", delete(delete_photo))
        .route("/presigned", post(presigned_upload));
    if state.mock.is_some() {
        upload = upload.route("/mock-upload", put(mock_upload));
    }

    let mut app = Router::new()
        .route("/api", get(api_index))
        .nest("/api/upload", upload.layer(DefaultBodyLimit::max(body_limit)));
    if let Some(mock) = &state.mock {
        app = app.nest_service("/mock-storage", ServeDir::new(mock.base_path()));
    }

    let cors = cors_layer(&state.config.allowed_origins);
    app.fallback_service(ServeDir::new(&state.config.public_dir))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `*` anywhere in the list allows every origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AnyOrigin);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin `{}`", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// Turn a handler panic into the usual 500 envelope.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Internal server error".to_string()
    };
    AppError::internal(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_state;
    use axum::http::{StatusCode, header};
    use axum_test::{
        TestServer,
        multipart::{MultipartForm, Part},
    };
    use reqwest::Url;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    async fn server() -> (TempDir, TestServer) {
        let (dir, state) = mock_state().await;
        (dir, TestServer::new(routes(state)).unwrap())
    }

    fn jpeg(name: &str) -> Part {
        Part::bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00])
            .file_name(name)
            .mime_type("image/jpeg")
    }

    #[tokio::test]
    async fn health_reports_running_with_timestamp() {
        let (_dir, server) = server().await;
        let response = server.get("/api/upload/health").await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("Upload service is running"));
        let ts = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[tokio::test]
    async fn api_index_lists_endpoints() {
        let (_dir, server) = server().await;
        let body = server.get("/api").await.json::<Value>();
        assert_eq!(body["endpoints"]["presignedUrl"], json!("POST /api/upload/presigned"));
    }

    #[tokio::test]
    async fn single_upload_then_listed_and_served() {
        let (_dir, server) = server().await;
        let response = server
            .post("/api/upload/single")
            .multipart(MultipartForm::new().add_part("photo", jpeg("cat.jpg")))
            .await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("Photo uploaded successfully"));
        let key = body["data"]["key"].as_str().unwrap().to_string();
        assert!(key.starts_with("photos/") && key.ends_with(".jpg"));

        let listed = server.get("/api/upload/photos").await.json::<Value>();
        assert_eq!(listed["data"][0]["key"], json!(key));
        assert_eq!(listed["data"][0]["size"], json!(5));

        let name = key.strip_prefix("photos/").unwrap();
        let served = server.get(&format!("/mock-storage/{name}")).await;
        served.assert_status_ok();
        assert_eq!(served.as_bytes().to_vec(), vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00]);
    }

    #[tokio::test]
    async fn single_upload_without_file_is_bad_request() {
        let (_dir, server) = server().await;
        let response = server
            .post("/api/upload/single")
            .multipart(MultipartForm::new().add_text("caption", "no photo"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>(),
            json!({ "success": false, "error": "No file uploaded" })
        );
    }

    #[tokio::test]
    async fn three_uploads_then_list_two() {
        let (_dir, server) = server().await;
        let form = MultipartForm::new()
            .add_part("photos", jpeg("a.jpg"))
            .add_part("photos", jpeg("b.jpg"))
            .add_part("photos", jpeg("c.jpg"));
        let response = server.post("/api/upload/multiple").multipart(form).await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("3 photos uploaded successfully"));
        assert_eq!(body["data"]["successful"].as_array().unwrap().len(), 3);
        assert_eq!(body["data"]["failed"].as_array().unwrap().len(), 0);

        let listed = server
            .get("/api/upload/photos")
            .add_query_param("maxKeys", 2)
            .await
            .json::<Value>();
        assert_eq!(listed["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn multiple_without_files_is_bad_request() {
        let (_dir, server) = server().await;
        let response = server
            .post("/api/upload/multiple")
            .multipart(MultipartForm::new().add_text("x", "y"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], json!("No files uploaded"));
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let (_dir, server) = server().await;
        server
            .post("/api/upload/single")
            .multipart(MultipartForm::new().add_part("photo", jpeg("a.jpg")))
            .await
            .assert_status_ok();

        let listed = server
            .get("/api/upload/photos")
            .add_query_param("prefix", "thumbnails/")
            .await
            .json::<Value>();
        assert_eq!(listed, json!({ "success": true, "data": [] }));
    }

    #[tokio::test]
    async fn list_with_malformed_max_keys_is_bad_request() {
        let (_dir, server) = server().await;
        let response = server
            .get("/api/upload/photos")
            .add_query_param("maxKeys", "lots")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["success"], json!(false));
    }

    #[tokio::test]
    async fn delete_uploaded_photo_then_missing_is_server_error() {
        let (_dir, server) = server().await;
        let key = server
            .post("/api/upload/single")
            .multipart(MultipartForm::new().add_part("photo", jpeg("a.jpg")))
            .await
            .json::<Value>()["data"]["key"]
            .as_str()
            .unwrap()
            .to_string();

        let encoded = key.replace('/', "%2F");
        let response = server.delete(&format!("/api/upload/photos/{encoded}")).await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>(),
            json!({ "success": true, "message": "Photo deleted successfully" })
        );

        let response = server.delete(&format!("/api/upload/photos/{key}")).await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.json::<Value>(),
            json!({ "success": false, "error": "File not found" })
        );
    }

    #[tokio::test]
    async fn presigned_requires_name_and_type() {
        let (_dir, server) = server().await;
        let response = server
            .post("/api/upload/presigned")
            .json(&json!({ "fileName": "a.png" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["error"],
            json!("fileName and contentType are required")
        );

        let response = server
            .post("/api/upload/presigned")
            .json(&json!({ "fileName": "a.exe", "contentType": "application/x-msdownload" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn presigned_mock_flow_round_trips() {
        let (_dir, server) = server().await;
        let response = server
            .post("/api/upload/presigned")
            .json(&json!({ "fileName": "a.png", "contentType": "image/png", "expiresIn": 60 }))
            .await;
        response.assert_status_ok();
        let data = response.json::<Value>()["data"].clone();
        let key = data["key"].as_str().unwrap().to_string();
        assert!(key.ends_with(".png"));

        let url = Url::parse(data["url"].as_str().unwrap()).unwrap();
        let put_signed = |body: Vec<u8>| {
            let mut put = server.put(url.path());
            for (name, value) in url.query_pairs() {
                put = put.add_query_param(&name, value.as_ref());
            }
            put.content_type("image/png").bytes(body.into())
        };

        let put = put_signed(vec![0x89, 0x50, 0x4E, 0x47]).await;
        put.assert_status_ok();
        assert_eq!(put.json::<Value>()["data"]["key"], json!(key));

        // the signed URL is spent after one upload
        let replay = put_signed(vec![0x00]).await;
        replay.assert_status(StatusCode::FORBIDDEN);

        let listed = server.get("/api/upload/photos").await.json::<Value>();
        assert_eq!(listed["data"][0]["key"], json!(key));
        assert_eq!(listed["data"][0]["size"], json!(4));
    }

    #[tokio::test]
    async fn mock_upload_without_a_signed_key_is_forbidden() {
        let (_dir, server) = server().await;
        let response = server
            .put("/api/upload/mock-upload")
            .add_query_param("key", "photos/chosen.png")
            .add_query_param("contentType", "image/png")
            .add_query_param("expires", 99_999_999_999i64)
            .content_type("image/png")
            .bytes(vec![1, 2, 3].into())
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(
            response.json::<Value>()["error"],
            json!("Upload URL is not valid")
        );

        let listed = server.get("/api/upload/photos").await.json::<Value>();
        assert_eq!(listed["data"], json!([]));
    }

    #[tokio::test]
    async fn mock_upload_cannot_overwrite_an_uploaded_photo() {
        let (_dir, server) = server().await;
        let uploaded = server
            .post("/api/upload/single")
            .multipart(MultipartForm::new().add_part("photo", jpeg("a.jpg")))
            .await
            .json::<Value>();
        let key = uploaded["data"]["key"].as_str().unwrap().to_string();

        let response = server
            .put("/api/upload/mock-upload")
            .add_query_param("key", &key)
            .content_type("image/jpeg")
            .bytes(vec![1, 2].into())
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let listed = server.get("/api/upload/photos").await.json::<Value>();
        assert_eq!(listed["data"][0]["size"], json!(5));
    }

    #[tokio::test]
    async fn presigned_rejects_expiry_out_of_range() {
        let (_dir, server) = server().await;
        for expires_in in [json!(0), json!(604_801), json!(9_223_372_036_854_775_807u64)] {
            let response = server
                .post("/api/upload/presigned")
                .json(&json!({
                    "fileName": "a.png",
                    "contentType": "image/png",
                    "expiresIn": expires_in,
                }))
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(
                response.json::<Value>(),
                json!({ "success": false, "error": "invalid expiresIn" })
            );
        }

        let response = server
            .post("/api/upload/presigned")
            .json(&json!({ "fileName": "a.png", "contentType": "image/png", "expiresIn": 604_800 }))
            .await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn cors_preflight_is_answered() {
        let (_dir, server) = server().await;
        let response = server
            .method(axum::http::Method::OPTIONS, "/api/upload/single")
            .add_header(header::ORIGIN, HeaderValue::from_static("http://example.test"))
            .add_header(
                header::ACCESS_CONTROL_REQUEST_METHOD,
                HeaderValue::from_static("POST"),
            )
            .await;
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            HeaderValue::from_static("*")
        );
    }

    #[test]
    fn panics_render_as_failure_envelope() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
