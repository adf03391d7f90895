//! Provider client trait.

use crate::error::Result;
use crate::video::poller::PollSettings;
use crate::video::types::{JobStatus, ModelInfo, ProviderKind};
use async_trait::async_trait;

/// A remote video-generation API.
///
/// Implementations are stateless apart from read-only configuration and are
/// shared across concurrent requests.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Returns the kind of this provider.
    fn kind(&self) -> ProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            ProviderKind::Kie => "Veo (Kie.ai)",
            ProviderKind::Sora => "Sora",
        }
    }

    /// Creates a remote job and returns its identifier.
    ///
    /// Fails with `Submission` when the provider rejects the job or the
    /// response carries no identifier.
    async fn submit(&self, prompt: &str, image_refs: &[String]) -> Result<String>;

    /// Fetches and classifies the job's current status.
    ///
    /// Unknown status codes come back as [`JobStatus::Unknown`]; only
    /// transport or decode failures are errors.
    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus>;

    /// Downloads a finished artifact, failing once it exceeds `limit` bytes.
    async fn download(&self, url: &str, limit: u64) -> Result<Vec<u8>>;

    /// Deadline and interval to use when polling this provider.
    fn poll_settings(&self) -> PollSettings;

    /// Model metadata reported with every result.
    fn model_info(&self) -> ModelInfo;

    /// Whether `submit` makes use of reference image URLs.
    fn accepts_image_refs(&self) -> bool {
        true
    }

    /// Picks the canonical result from a completed job's references.
    fn select_result<'a>(&self, result_refs: &'a [String]) -> Option<&'a str> {
        result_refs
            .iter()
            .map(|r| r.trim())
            .find(|r| !r.is_empty())
    }
}
