//! Google Cloud Storage artifact store.

use crate::error::{sanitize_error_message, ClipForgeError, Result};
use crate::storage::{public_url, ArtifactStore, ObjectMetadata, MAX_ARTIFACT_BYTES};
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_API_BASE: &str = "https://storage.googleapis.com";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Builder for [`GcsStore`].
#[derive(Debug, Clone)]
pub struct GcsStoreBuilder {
    bucket: Option<String>,
    project_id: Option<String>,
    credentials_path: Option<PathBuf>,
    api_base: String,
}

impl Default for GcsStoreBuilder {
    fn default() -> Self {
        Self {
            bucket: None,
            project_id: None,
            credentials_path: None,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl GcsStoreBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bucket. Falls back to `GCS_BUCKET` env var.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Sets the project id. Falls back to `GCS_PROJECT_ID` env var.
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Sets the service-account JSON path. Falls back to `GCS_CREDENTIALS` env var.
    pub fn credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Overrides the JSON API host (used against emulators).
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builds the store, loading and validating the service-account key.
    pub fn build(self) -> Result<GcsStore> {
        let bucket = required(self.bucket, "GCS_BUCKET")?;
        let project_id = required(self.project_id, "GCS_PROJECT_ID")?;
        let credentials_path = self
            .credentials_path
            .or_else(|| std::env::var("GCS_CREDENTIALS").ok().map(PathBuf::from))
            .ok_or_else(|| ClipForgeError::Configuration("GCS_CREDENTIALS not set".into()))?;

        let raw = std::fs::read_to_string(&credentials_path).map_err(|e| {
            ClipForgeError::Configuration(format!(
                "cannot read credentials {}: {}",
                credentials_path.display(),
                e
            ))
        })?;
        let credentials: ServiceAccountKey = serde_json::from_str(&raw).map_err(|e| {
            ClipForgeError::Configuration(format!("invalid service-account JSON: {}", e))
        })?;
        let signing_key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| ClipForgeError::Configuration(format!("invalid private key: {}", e)))?;

        if let Some(key_project) = credentials.project_id.as_deref() {
            if key_project != project_id {
                tracing::warn!(
                    configured = %project_id,
                    credentials = %key_project,
                    "service account belongs to a different project"
                );
            }
        }

        Ok(GcsStore {
            client: reqwest::Client::new(),
            bucket,
            project_id,
            credentials,
            signing_key,
            api_base: self.api_base,
        })
    }
}

fn required(value: Option<String>, var: &str) -> Result<String> {
    value
        .or_else(|| std::env::var(var).ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ClipForgeError::Configuration(format!("{var} not set")))
}

/// Stores artifacts in a Google Cloud Storage bucket.
///
/// Each write mints a short-lived OAuth token from the service account and
/// uses a multipart upload so content type and custom metadata land with
/// the object.
pub struct GcsStore {
    client: reqwest::Client,
    bucket: String,
    project_id: String,
    credentials: ServiceAccountKey,
    signing_key: EncodingKey,
    api_base: String,
}

impl GcsStore {
    /// Creates a new [`GcsStoreBuilder`].
    pub fn builder() -> GcsStoreBuilder {
        GcsStoreBuilder::new()
    }

    /// Bucket objects are written to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Project the bucket belongs to.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn sign_assertion(&self) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ClipForgeError::Storage(format!("system clock error: {}", e)))?
            .as_secs();

        let claims = TokenClaims {
            iss: self.credentials.client_email.clone(),
            scope: STORAGE_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| ClipForgeError::Storage(format!("JWT signing failed: {}", e)))
    }

    async fn access_token(&self) -> Result<String> {
        let assertion = self.sign_assertion()?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| ClipForgeError::Storage(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClipForgeError::Storage(format!(
                "token exchange HTTP {}: {}",
                status.as_u16(),
                sanitize_error_message(&text)
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClipForgeError::Storage(format!("malformed token response: {}", e)))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl ArtifactStore for GcsStore {
    async fn put(&self, data: Vec<u8>, key: &str, metadata: ObjectMetadata) -> Result<String> {
        let size = data.len() as u64;
        if size > MAX_ARTIFACT_BYTES {
            return Err(ClipForgeError::PayloadTooLarge {
                size,
                limit: MAX_ARTIFACT_BYTES,
            });
        }

        let token = self.access_token().await?;
        let boundary = multipart_boundary();
        let body = multipart_related(&boundary, key, &metadata, &data)?;
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=multipart",
            self.api_base, self.bucket
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| ClipForgeError::Storage(format!("upload of {} failed: {}", key, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClipForgeError::Storage(format!(
                "upload of {} rejected, HTTP {}: {}",
                key,
                status.as_u16(),
                sanitize_error_message(&text)
            )));
        }

        tracing::debug!(bucket = %self.bucket, key = %key, size, "stored artifact");
        Ok(public_url(&self.bucket, key))
    }
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("clipforge-{:x}", nanos)
}

/// Builds a `multipart/related` body: JSON resource first, then the media.
fn multipart_related(
    boundary: &str,
    key: &str,
    metadata: &ObjectMetadata,
    data: &[u8],
) -> Result<Vec<u8>> {
    let resource = ObjectResource {
        name: key,
        content_type: &metadata.content_type,
        metadata: &metadata.custom,
    };
    let resource_json = serde_json::to_string(&resource)?;

    let mut body = Vec::with_capacity(data.len() + resource_json.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{resource_json}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: {}\r\n\r\n", metadata.content_type).as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Ok(body)
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
    #[serde(default)]
    project_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource<'a> {
    name: &'a str,
    content_type: &'a str,
    #[serde(skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    metadata: &'a std::collections::BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub(crate) const TEST_KEY_PEM: &str =
        include_str!("../../tests/fixtures/test_service_account.pem");

    pub(crate) fn credentials_file(token_uri: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        let json = serde_json::json!({
            "type": "service_account",
            "project_id": "clipforge-test",
            "client_email": "uploader@clipforge-test.iam.gserviceaccount.com",
            "private_key": TEST_KEY_PEM,
            "token_uri": token_uri,
        });
        write!(file, "{}", json).unwrap();
        file
    }

    fn store(file: &NamedTempFile) -> GcsStore {
        GcsStoreBuilder::new()
            .bucket("clips")
            .project_id("clipforge-test")
            .credentials_path(file.path())
            .api_base("http://127.0.0.1:1")
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_loads_credentials() {
        let file = credentials_file("https://oauth2.example/token");
        let store = store(&file);
        assert_eq!(store.bucket(), "clips");
        assert_eq!(store.project_id(), "clipforge-test");
        assert_eq!(store.credentials.token_uri, "https://oauth2.example/token");
    }

    #[test]
    fn test_build_missing_credentials_file() {
        let result = GcsStoreBuilder::new()
            .bucket("clips")
            .project_id("p")
            .credentials_path("/nonexistent/key.json")
            .build();
        assert!(matches!(result, Err(ClipForgeError::Configuration(_))));
    }

    #[test]
    fn test_build_rejects_bad_private_key() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"client_email": "a@b", "private_key": "not a key"}}"#
        )
        .unwrap();
        let result = GcsStoreBuilder::new()
            .bucket("clips")
            .project_id("p")
            .credentials_path(file.path())
            .build();
        assert!(matches!(result, Err(ClipForgeError::Configuration(_))));
    }

    #[test]
    fn test_token_uri_defaults() {
        let key: ServiceAccountKey =
            serde_json::from_str(r#"{"client_email": "a@b", "private_key": "k"}"#).unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_sign_assertion_is_jwt() {
        let file = credentials_file("https://oauth2.example/token");
        let jwt = store(&file).sign_assertion().unwrap();
        assert_eq!(jwt.split('.').count(), 3);
    }

    #[test]
    fn test_multipart_layout() {
        let meta = ObjectMetadata::new("video/mp4").with("provider", "kie");
        let body = multipart_related("b0", "videos/x.mp4", &meta, b"DATA").unwrap();
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with("--b0\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n"));
        assert!(text.contains(r#""name":"videos/x.mp4""#));
        assert!(text.contains(r#""contentType":"video/mp4""#));
        assert!(text.contains(r#""metadata":{"provider":"kie"}"#));
        assert!(text.contains("--b0\r\nContent-Type: video/mp4\r\n\r\nDATA\r\n--b0--\r\n"));
    }

    #[tokio::test]
    async fn test_put_rejects_oversized_before_network() {
        let file = credentials_file("http://127.0.0.1:1/token");
        let store = store(&file);
        let data = vec![0u8; (MAX_ARTIFACT_BYTES + 1) as usize];

        let err = store
            .put(data, "videos/big.mp4", ObjectMetadata::new("video/mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClipForgeError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_put_token_failure_is_storage_error() {
        let file = credentials_file("http://127.0.0.1:1/token");
        let err = store(&file)
            .put(b"x".to_vec(), "images/1-a.png", ObjectMetadata::new("image/png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClipForgeError::Storage(_)));
    }
}
