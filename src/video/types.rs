//! Core types for video generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Literal reported for metadata a provider does not expose.
pub const UNKNOWN: &str = "unknown";

/// Video provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Veo via the Kie.ai task API.
    Kie,
    /// Sora video API.
    Sora,
}

impl ProviderKind {
    /// All supported providers.
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Kie, ProviderKind::Sora];

    /// Short identifier used in logs, routes and metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kie => "kie",
            Self::Sora => "sora",
        }
    }

    /// Prefix prepended to the job id when naming the stored video.
    pub fn key_tag(&self) -> &'static str {
        match self {
            Self::Kie => "",
            Self::Sora => "sora-",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kie" => Ok(Self::Kie),
            "sora" => Ok(Self::Sora),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// A job accepted by a provider. Lives for one request.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    /// Provider that owns the job.
    pub provider: ProviderKind,
    /// Provider-issued identifier.
    pub job_id: String,
    /// Prompt the job was created with.
    pub prompt: String,
    /// Public URL of the uploaded reference image, if any.
    pub input_image_ref: Option<String>,
    /// When the provider accepted the job.
    pub submitted_at: DateTime<Utc>,
}

/// Classified status of a remote job, produced by each poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Still queued or running.
    Pending,
    /// Finished; result URLs in provider order.
    Completed {
        /// Result references, possibly empty if the provider misbehaves.
        result_refs: Vec<String>,
    },
    /// Provider-declared terminal failure.
    Failed {
        /// Provider-reported reason.
        reason: String,
    },
    /// A status code outside the known vocabulary.
    Unknown {
        /// The raw code as reported.
        code: String,
    },
}

impl JobStatus {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Descriptive metadata reported alongside a generated video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name.
    pub model: String,
    /// Frame size, e.g. `1280x720`.
    pub size: String,
    /// Clip duration in seconds.
    pub duration_seconds: String,
}

impl ModelInfo {
    /// Metadata for providers that do not expose any.
    pub fn unknown() -> Self {
        Self {
            model: UNKNOWN.into(),
            size: UNKNOWN.into(),
            duration_seconds: UNKNOWN.into(),
        }
    }
}

/// Terminal status of a [`GenerationResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// The only status a result can carry.
    Completed,
}

/// Descriptor of a stored video, returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// Provider job id.
    pub video_id: String,
    /// Always `completed`.
    pub status: ResultStatus,
    /// Submission time of the job.
    pub created_at: DateTime<Utc>,
    /// Public URL of the stored video.
    pub download_url: String,
    /// Model name or `unknown`.
    pub model: String,
    /// Frame size or `unknown`.
    pub size: String,
    /// Duration in seconds or `unknown`.
    pub duration_seconds: String,
}

impl GenerationResult {
    pub(crate) fn completed(job: &GenerationJob, download_url: String, info: ModelInfo) -> Self {
        Self {
            video_id: job.job_id.clone(),
            status: ResultStatus::Completed,
            created_at: job.submitted_at,
            download_url,
            model: info.model,
            size: info.size,
            duration_seconds: info.duration_seconds,
        }
    }
}

/// A reference image supplied with the prompt.
#[derive(Debug, Clone)]
pub struct InputImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Original filename as uploaded.
    pub filename: String,
    /// MIME type, if the client sent one.
    pub content_type: Option<String>,
}

impl InputImage {
    /// Creates an input image from raw bytes and its original name.
    pub fn new(data: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            data,
            filename: filename.into(),
            content_type: None,
        }
    }

    /// Sets the MIME type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A request to generate a video.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The text prompt describing the desired video.
    pub prompt: String,
    /// Optional reference image.
    pub image: Option<InputImage>,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    /// Attaches a reference image.
    pub fn with_image(mut self, image: InputImage) -> Self {
        self.image = Some(image);
        self
    }
}
