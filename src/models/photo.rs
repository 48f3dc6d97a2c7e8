//! Represents photos as they move through the upload pipeline.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A photo held in memory between the upload extractor and the store.
///
/// Nothing here has been written anywhere yet; the store decides the key.
#[derive(Clone, Debug)]
pub struct PhotoFile {
    /// Raw payload as received.
    pub bytes: Bytes,

    /// Content type declared by the client (e.g. "image/jpeg").
    pub mime_type: String,

    /// Filename the client sent; only its extension is kept.
    pub original_name: String,
}

impl PhotoFile {
    pub fn new(
        bytes: impl Into<Bytes>,
        mime_type: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            original_name: original_name.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// A stored photo as reported by a listing.
///
/// `url` is derived from the key and the active backend; it is never stored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    /// Path-like identifier, always `photos/<generated-name>` for uploads.
    pub key: String,

    /// Publicly resolvable location of the payload.
    pub url: String,

    /// When the payload was last written, if the backend reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    /// Size in bytes, if the backend reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Outcome of a single upload attempt. Failures are values, not errors.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UploadResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    pub fn stored(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            success: true,
            key: Some(key.into()),
            url: Some(url.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Outcome of a delete. `error` is only set when `success` is false.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DeleteOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeleteOutcome {
    pub fn deleted() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// A time-limited URL a client can PUT bytes to, plus the key it will land on.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PresignedUpload {
    pub url: String,
    pub key: String,
}
