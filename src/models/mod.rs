//! Core data models for the photo upload pipeline.
//!
//! These are plain values passed between the upload extractors, the storage
//! backends and the HTTP layer, and serialize as the JSON the API returns.

pub mod photo;
