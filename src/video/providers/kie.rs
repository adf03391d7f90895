//! Veo video generation through the Kie.ai task API.

use crate::error::{sanitize_error_message, ClipForgeError, Result};
use crate::video::poller::PollSettings;
use crate::video::provider::ProviderClient;
use crate::video::providers::download_capped;
use crate::video::types::{JobStatus, ModelInfo, ProviderKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for a single submit or status call.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_BASE_URL: &str = "https://api.kie.ai";

/// API-level success code inside the response envelope.
const KIE_OK: i64 = 200;

/// Veo clips produced through Kie are fixed-length.
const CLIP_DURATION_SECS: &str = "8";

/// Kie video model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KieModel {
    /// Veo 3 quality tier.
    Veo3,
    /// Veo 3 fast tier (default).
    #[default]
    Veo3Fast,
}

impl KieModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Veo3 => "veo3",
            Self::Veo3Fast => "veo3_fast",
        }
    }
}

impl std::str::FromStr for KieModel {
    type Err = ClipForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "veo3" => Ok(Self::Veo3),
            "veo3_fast" => Ok(Self::Veo3Fast),
            other => Err(ClipForgeError::Configuration(format!(
                "unsupported Kie model: {other}"
            ))),
        }
    }
}

/// Builder for [`KieProvider`].
#[derive(Debug, Clone)]
pub struct KieProviderBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: KieModel,
    aspect_ratio: String,
    poll_interval: Duration,
    timeout: Duration,
    request_timeout: Duration,
}

impl Default for KieProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: KieModel::default(),
            aspect_ratio: "16:9".into(),
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300), // 5 minutes
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl KieProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `KIE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API base URL. Falls back to `KIE_BASE_URL`, then the public endpoint.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model variant.
    pub fn model(mut self, model: KieModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the aspect ratio (`16:9` or `9:16`).
    pub fn aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = ratio.into();
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
    pub fn build(self) -> Result<KieProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("KIE_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ClipForgeError::Configuration("KIE_API_KEY not set and no API key provided".into())
            })?;

        let base_url = self
            .base_url
            .or_else(|| std::env::var("KIE_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(KieProvider {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model: self.model,
            aspect_ratio: self.aspect_ratio,
            poll_interval: self.poll_interval,
            timeout: self.timeout,
            request_timeout: self.request_timeout,
        })
    }
}

/// Veo video generation via Kie.ai.
///
/// Jobs are created with `POST /api/v1/veo/generate` and tracked with
/// `GET /api/v1/veo/record-info`. A finished job always carries exactly one
/// result URL.
#[derive(Debug)]
pub struct KieProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: KieModel,
    aspect_ratio: String,
    poll_interval: Duration,
    timeout: Duration,
    request_timeout: Duration,
}

impl KieProvider {
    /// Creates a new [`KieProviderBuilder`].
    pub fn builder() -> KieProviderBuilder {
        KieProviderBuilder::new()
    }

    fn frame_size(&self) -> &'static str {
        match self.aspect_ratio.as_str() {
            "9:16" => "720x1280",
            _ => "1280x720",
        }
    }
}

#[async_trait]
impl ProviderClient for KieProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kie
    }

    async fn submit(&self, prompt: &str, image_refs: &[String]) -> Result<String> {
        let url = format!("{}/api/v1/veo/generate", self.base_url);
        let body = KieGenerateRequest {
            prompt: prompt.to_string(),
            model: self.model.as_str().to_string(),
            aspect_ratio: self.aspect_ratio.clone(),
            image_urls: image_refs.to_vec(),
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
            .map_err(|e| ClipForgeError::submission("kie", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClipForgeError::submission(
                "kie",
                format!("HTTP {}: {}", status.as_u16(), sanitize_error_message(&text)),
            ));
        }

        let envelope: KieEnvelope<KieTaskData> = response
            .json()
            .await
            .map_err(|e| ClipForgeError::submission("kie", format!("malformed response: {e}")))?;

        task_id_from(envelope)
    }

    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus> {
        let url = format!("{}/api/v1/veo/record-info", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("taskId", job_id)])
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClipForgeError::TransientPoll(format!(
                "Kie status HTTP {}: {}",
                status.as_u16(),
                sanitize_error_message(&text)
            )));
        }

        let envelope: KieEnvelope<KieRecordInfo> = response.json().await?;
        if envelope.code != KIE_OK {
            return Err(ClipForgeError::TransientPoll(format!(
                "Kie status code {}: {}",
                envelope.code,
                sanitize_error_message(&envelope.msg)
            )));
        }

        let record = envelope.data.ok_or_else(|| {
            ClipForgeError::UnexpectedResponse("No data in Kie status response".into())
        })?;

        Ok(classify(record))
    }

    async fn download(&self, url: &str, limit: u64) -> Result<Vec<u8>> {
        download_capped(self.client.get(url), limit).await
    }

    fn poll_settings(&self) -> PollSettings {
        PollSettings::new(self.timeout, self.poll_interval)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model: self.model.as_str().to_string(),
            size: self.frame_size().to_string(),
            duration_seconds: CLIP_DURATION_SECS.to_string(),
        }
    }
}

fn task_id_from(envelope: KieEnvelope<KieTaskData>) -> Result<String> {
    if envelope.code != KIE_OK {
        return Err(ClipForgeError::submission(
            "kie",
            format!("code {}: {}", envelope.code, sanitize_error_message(&envelope.msg)),
        ));
    }

    envelope
        .data
        .map(|d| d.task_id)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ClipForgeError::submission("kie", "No taskId in response"))
}

/// Maps `successFlag` onto [`JobStatus`]: 0 pending, 1 success, 2/3 failure.
fn classify(record: KieRecordInfo) -> JobStatus {
    match record.success_flag {
        0 => JobStatus::Pending,
        1 => JobStatus::Completed {
            result_refs: record
                .response
                .map(|r| r.result_urls)
                .unwrap_or_default(),
        },
        2 | 3 => JobStatus::Failed {
            reason: record
                .error_message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("Kie task failed (successFlag={})", record.success_flag)),
        },
        other => JobStatus::Unknown {
            code: other.to_string(),
        },
    }
}

// Request types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KieGenerateRequest {
    prompt: String,
    model: String,
    aspect_ratio: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    image_urls: Vec<String>,
}

// Response types
#[derive(Debug, Deserialize)]
struct KieEnvelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KieTaskData {
    task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KieRecordInfo {
    success_flag: i64,
    #[serde(default)]
    response: Option<KieRecordResponse>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KieRecordResponse {
    #[serde(default)]
    result_urls: Vec<String>,
}
