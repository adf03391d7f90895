//! Sora video generation provider.

use crate::error::{sanitize_error_message, ClipForgeError, Result};
use crate::video::poller::PollSettings;
use crate::video::provider::ProviderClient;
use crate::video::providers::download_capped;
use crate::video::types::{JobStatus, ModelInfo, ProviderKind};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for a single submit or status call.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Sora model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SoraModel {
    /// Sora 2 (default).
    #[default]
    Sora2,
    /// Sora 2 Pro.
    Sora2Pro,
}

impl SoraModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sora2 => "sora-2",
            Self::Sora2Pro => "sora-2-pro",
        }
    }
}

impl std::str::FromStr for SoraModel {
    type Err = ClipForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sora-2" => Ok(Self::Sora2),
            "sora-2-pro" => Ok(Self::Sora2Pro),
            other => Err(ClipForgeError::Configuration(format!(
                "unsupported Sora model: {other}"
            ))),
        }
    }
}

/// Builder for [`SoraProvider`].
#[derive(Debug, Clone)]
pub struct SoraProviderBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: SoraModel,
    poll_interval: Duration,
    timeout: Duration,
    request_timeout: Duration,
}

impl Default for SoraProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: SoraModel::default(),
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600), // slower backend
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SoraProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `SORA_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API base URL. Falls back to `SORA_BASE_URL`, then the public endpoint.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model variant.
    pub fn model(mut self, model: SoraModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the polling interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the maximum time to wait for generation.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the timeout for each individual API call.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<SoraProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("SORA_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ClipForgeError::Configuration("SORA_API_KEY not set and no API key provided".into())
            })?;

        let base_url = self
            .base_url
            .or_else(|| std::env::var("SORA_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(SoraProvider {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model: self.model,
            poll_interval: self.poll_interval,
            timeout: self.timeout,
            request_timeout: self.request_timeout,
        })
    }
}

/// Sora video generation provider.
///
/// Text-to-video only: reference images are not forwarded. A finished job may
/// list several outputs; when it lists none the content endpoint of the job
/// is used as the single result.
#[derive(Debug)]
pub struct SoraProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: SoraModel,
    poll_interval: Duration,
    timeout: Duration,
    request_timeout: Duration,
}

impl SoraProvider {
    /// Creates a new [`SoraProviderBuilder`].
    pub fn builder() -> SoraProviderBuilder {
        SoraProviderBuilder::new()
    }

    fn content_url(&self, job_id: &str) -> String {
        format!("{}/v1/videos/{}/content", self.base_url, job_id)
    }

    /// True when `url` has the scheme, host and port of the configured API.
    ///
    /// Only such URLs are sent the API key.
    fn is_api_origin(&self, url: &str) -> bool {
        let (Ok(target), Ok(base)) = (Url::parse(url), Url::parse(&self.base_url)) else {
            return false;
        };
        target.scheme() == base.scheme()
            && target.host_str() == base.host_str()
            && target.port_or_known_default() == base.port_or_known_default()
    }

    fn classify(&self, job: SoraJob) -> JobStatus {
        match job.status.as_str() {
            "completed" => JobStatus::Completed {
                result_refs: job.output.unwrap_or_else(|| vec![self.content_url(&job.id)]),
            },
            "failed" => JobStatus::Failed {
                reason: job
                    .error
                    .and_then(|e| e.message)
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Sora video generation failed".into()),
            },
            "queued" | "in_progress" | "processing" => JobStatus::Pending,
            other => JobStatus::Unknown {
                code: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl ProviderClient for SoraProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Sora
    }

    async fn submit(&self, prompt: &str, image_refs: &[String]) -> Result<String> {
        if !image_refs.is_empty() {
            tracing::debug!(count = image_refs.len(), "Sora ignores reference images");
        }

        let url = format!("{}/v1/videos", self.base_url);
        let body = SoraCreateRequest {
            model: self.model.as_str().to_string(),
            prompt: prompt.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClipForgeError::submission("sora", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClipForgeError::submission(
                "sora",
                format!("HTTP {}: {}", status.as_u16(), sanitize_error_message(&text)),
            ));
        }

        let job: SoraJob = response
            .json()
            .await
            .map_err(|e| ClipForgeError::submission("sora", format!("malformed response: {e}")))?;

        job_id_from(job)
    }

    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus> {
        let url = format!("{}/v1/videos/{}", self.base_url, job_id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClipForgeError::TransientPoll(format!(
                "Sora status HTTP {}: {}",
                status.as_u16(),
                sanitize_error_message(&text)
            )));
        }

        let job: SoraJob = response.json().await?;
        if let Some(progress) = job.progress {
            tracing::debug!(job_id = %job_id, status = %job.status, progress, "Sora job progress");
        }

        Ok(self.classify(job))
    }

    async fn download(&self, url: &str, limit: u64) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        if self.is_api_origin(url) {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }
        download_capped(request, limit).await
    }

    fn poll_settings(&self) -> PollSettings {
        PollSettings::new(self.timeout, self.poll_interval)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo::unknown()
    }

    fn accepts_image_refs(&self) -> bool {
        false
    }
}

fn job_id_from(job: SoraJob) -> Result<String> {
    if job.status == "failed" {
        let reason = job
            .error
            .and_then(|e| e.message)
            .unwrap_or_else(|| "job rejected".into());
        return Err(ClipForgeError::submission("sora", sanitize_error_message(&reason)));
    }
    if job.id.trim().is_empty() {
        return Err(ClipForgeError::submission("sora", "No id in response"));
    }
    Ok(job.id)
}

// Request types
#[derive(Debug, Serialize)]
struct SoraCreateRequest {
    model: String,
    prompt: String,
}

// Response types
#[derive(Debug, Deserialize)]
struct SoraJob {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    output: Option<Vec<String>>,
    #[serde(default)]
    error: Option<SoraJobError>,
}

#[derive(Debug, Deserialize)]
struct SoraJobError {
    #[serde(default)]
    message: Option<String>,
}
