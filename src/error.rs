//! Error types for video generation.

use std::time::Duration;

/// Maximum number of characters of a provider body kept in an error message.
const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Errors that can occur while generating and storing a video.
#[derive(Debug, thiserror::Error)]
pub enum ClipForgeError {
    /// The provider rejected job creation or returned no job identifier.
    #[error("submission rejected by {provider}: {message}")]
    Submission {
        /// Provider tag (`kie`, `sora`).
        provider: String,
        /// Provider-reported reason.
        message: String,
    },

    /// A status check failed in a recoverable way (transport or decode).
    #[error("transient poll failure: {0}")]
    TransientPoll(String),

    /// The poll deadline elapsed without a terminal status.
    #[error("job {job_id} did not finish within {waited:?}")]
    Timeout {
        /// Provider-issued job identifier.
        job_id: String,
        /// The deadline that elapsed.
        waited: Duration,
    },

    /// The provider declared the job failed.
    #[error("video generation failed: {0}")]
    GenerationFailed(String),

    /// Artifact exceeds the size limit.
    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Observed size (may be a lower bound when the download was cut short).
        size: u64,
        /// Configured maximum.
        limit: u64,
    },

    /// Fetching the finished artifact from the provider failed.
    #[error("download failed: {status} - {message}")]
    Download {
        /// HTTP status returned by the artifact host.
        status: u16,
        /// Short description.
        message: String,
    },

    /// The artifact store rejected a read or write.
    #[error("storage error: {0}")]
    Storage(String),

    /// Required configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A provider answered with something we could not interpret.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error (e.g., reading credentials).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The two error classes exposed to HTTP callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutwardError {
    /// The job did not finish in time.
    Timeout,
    /// Any other failure.
    Internal,
}

impl ClipForgeError {
    pub(crate) fn submission(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Submission {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Returns true if a status check that failed with this error may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientPoll(_) | Self::Network(_) | Self::Json(_) | Self::UnexpectedResponse(_)
        )
    }

    /// Collapses the internal taxonomy into what an HTTP caller gets to see.
    pub fn outward(&self) -> OutwardError {
        match self {
            Self::Timeout { .. } => OutwardError::Timeout,
            _ => OutwardError::Internal,
        }
    }
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, ClipForgeError>;

/// Prepares a provider response body for inclusion in an error or log line.
///
/// Collapses whitespace, masks anything that looks like a credential and
/// truncates to a bounded length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut out = Vec::new();
    let mut mask_next = false;
    for word in text.split_whitespace() {
        if mask_next {
            out.push("[REDACTED]");
            mask_next = false;
            continue;
        }
        if word.eq_ignore_ascii_case("bearer") {
            mask_next = true;
            out.push(word);
            continue;
        }
        let bare = word.trim_matches(|c: char| c == '"' || c == '\'' || c == ',');
        if bare.starts_with("sk-") || bare.starts_with("ya29.") {
            out.push("[REDACTED]");
        } else {
            out.push(word);
        }
    }
    let joined = out.join(" ");

    if joined.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        let truncated: String = joined.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        format!("{truncated}...")
    } else {
        joined
    }
}
