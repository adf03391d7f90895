//! Durable artifact storage.

mod gcs;

pub use gcs::{GcsStore, GcsStoreBuilder};

use crate::error::Result;
use crate::video::types::ProviderKind;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Largest artifact accepted for download or upload (100 MiB).
pub const MAX_ARTIFACT_BYTES: u64 = 100 * 1024 * 1024;

/// Host serving public objects.
const PUBLIC_HOST: &str = "https://storage.googleapis.com";

/// Content type and custom metadata attached to a stored object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// MIME type of the payload.
    pub content_type: String,
    /// Free-form key/value pairs.
    pub custom: BTreeMap<String, String>,
}

impl ObjectMetadata {
    /// Creates metadata with the given content type.
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            custom: BTreeMap::new(),
        }
    }

    /// Adds a custom metadata entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }
}

/// Object storage for input images and generated videos.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `data` under `key` and returns its public URL.
    ///
    /// Fails with `PayloadTooLarge` above [`MAX_ARTIFACT_BYTES`] and with
    /// `Storage` when the backend rejects the write.
    async fn put(&self, data: Vec<u8>, key: &str, metadata: ObjectMetadata) -> Result<String>;
}

/// Public URL of `key` in `bucket`.
pub fn public_url(bucket: &str, key: &str) -> String {
    format!("{PUBLIC_HOST}/{bucket}/{key}")
}

/// Object key for a generated video: `videos/<tag><job id>.mp4`.
pub fn video_key(provider: ProviderKind, job_id: &str) -> String {
    format!("videos/{}{}.mp4", provider.key_tag(), job_id)
}

/// Object key for an uploaded input image: `images/<timestamp>-<filename>`.
pub fn image_key(timestamp_ms: i64, filename: &str) -> String {
    format!("images/{}-{}", timestamp_ms, sanitize_filename(filename))
}

/// Keeps the final path component and replaces characters unsafe in object names.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        cleaned
    }
}
