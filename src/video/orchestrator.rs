//! End-to-end generation: upload input, submit, poll, fetch, store.

use crate::config::AppConfig;
use crate::error::{ClipForgeError, Result};
use crate::storage::{
    image_key, video_key, ArtifactStore, GcsStore, ObjectMetadata, MAX_ARTIFACT_BYTES,
};
use crate::video::poller::poll_until_terminal;
use crate::video::provider::ProviderClient;
use crate::video::providers::{KieProvider, SoraProvider};
use crate::video::types::{
    GenerationJob, GenerationRequest, GenerationResult, InputImage, JobStatus, ProviderKind,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

/// Prompt text kept in object metadata.
const MAX_PROMPT_METADATA_CHARS: usize = 256;

/// Coordinates one provider job from prompt to stored video.
///
/// Cheap to share: every collaborator sits behind an `Arc` and holds only
/// read-only configuration, so concurrent `generate` calls need no locking.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn ArtifactStore>,
    kie: Arc<dyn ProviderClient>,
    sora: Arc<dyn ProviderClient>,
}

impl Orchestrator {
    /// Creates an orchestrator from explicit collaborators.
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        kie: Arc<dyn ProviderClient>,
        sora: Arc<dyn ProviderClient>,
    ) -> Self {
        Self { store, kie, sora }
    }

    /// Wires the production providers and store from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let kie = KieProvider::builder()
            .api_key(config.kie.api_key.clone())
            .base_url(config.kie.base_url.clone())
            .model(config.kie.model)
            .build()?;

        let sora = SoraProvider::builder()
            .api_key(config.sora.api_key.clone())
            .base_url(config.sora.base_url.clone())
            .model(config.sora.model)
            .build()?;

        let store = GcsStore::builder()
            .bucket(config.storage.bucket.clone())
            .project_id(config.storage.project_id.clone())
            .credentials_path(config.storage.credentials_path.clone())
            .build()?;

        Ok(Self::new(Arc::new(store), Arc::new(kie), Arc::new(sora)))
    }

    /// Returns the client for `kind`.
    pub fn provider(&self, kind: ProviderKind) -> &dyn ProviderClient {
        match kind {
            ProviderKind::Kie => self.kie.as_ref(),
            ProviderKind::Sora => self.sora.as_ref(),
        }
    }

    /// Generates a video with the Kie (Veo) provider.
    pub async fn generate_with_kie(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.generate(ProviderKind::Kie, request).await
    }

    /// Generates a video with the Sora provider.
    pub async fn generate_with_sora(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        self.generate(ProviderKind::Sora, request).await
    }

    /// Runs the full workflow against the provider of `kind`.
    ///
    /// Every call creates a new remote job; retrying a failed call creates
    /// a duplicate job and, on success, a duplicate stored video.
    pub async fn generate(
        &self,
        kind: ProviderKind,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        let start = Instant::now();
        let provider = self.provider(kind);

        if request.prompt.trim().is_empty() {
            return Err(ClipForgeError::InvalidRequest("prompt must not be empty".into()));
        }

        let input_image_ref = match &request.image {
            Some(image) => Some(self.upload_input(kind, image).await?),
            None => None,
        };

        let image_refs: Vec<String> = if provider.accepts_image_refs() {
            input_image_ref.iter().cloned().collect()
        } else {
            Vec::new()
        };

        let job_id = provider.submit(&request.prompt, &image_refs).await?;
        let job = GenerationJob {
            provider: kind,
            job_id,
            prompt: request.prompt.clone(),
            input_image_ref,
            submitted_at: Utc::now(),
        };
        tracing::info!(provider = %kind, job_id = %job.job_id, "submitted video generation job");

        let status = poll_until_terminal(
            &job.job_id,
            |id: String| async move { provider.fetch_status(&id).await },
            provider.poll_settings(),
        )
        .await?;

        let result_refs = match status {
            JobStatus::Completed { result_refs } => result_refs,
            JobStatus::Failed { reason } => {
                tracing::warn!(provider = %kind, job_id = %job.job_id, reason = %reason, "provider reported failure");
                return Err(ClipForgeError::GenerationFailed(reason));
            }
            other => {
                return Err(ClipForgeError::UnexpectedResponse(format!(
                    "poller returned non-terminal status {other:?}"
                )))
            }
        };

        let source_url = provider.select_result(&result_refs).ok_or_else(|| {
            ClipForgeError::GenerationFailed(format!(
                "{} job {} completed without a result URL",
                kind, job.job_id
            ))
        })?;
        if result_refs.len() > 1 {
            tracing::debug!(count = result_refs.len(), "multiple results, using the first");
        }

        let download_url = self.store_video(provider, &job, source_url).await?;

        tracing::info!(
            provider = %kind,
            job_id = %job.job_id,
            elapsed_secs = start.elapsed().as_secs(),
            url = %download_url,
            "video generation complete"
        );

        Ok(GenerationResult::completed(&job, download_url, provider.model_info()))
    }

    async fn upload_input(&self, kind: ProviderKind, image: &InputImage) -> Result<String> {
        let size = image.data.len() as u64;
        if size > MAX_ARTIFACT_BYTES {
            return Err(ClipForgeError::PayloadTooLarge {
                size,
                limit: MAX_ARTIFACT_BYTES,
            });
        }

        let key = image_key(Utc::now().timestamp_millis(), &image.filename);
        let metadata = ObjectMetadata::new(
            image
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".into()),
        )
        .with("originalName", image.filename.clone())
        .with("provider", kind.as_str());

        let url = self.store.put(image.data.clone(), &key, metadata).await?;
        tracing::debug!(key = %key, size, "uploaded input image");
        Ok(url)
    }

    async fn store_video(
        &self,
        provider: &dyn ProviderClient,
        job: &GenerationJob,
        source_url: &str,
    ) -> Result<String> {
        let data = provider.download(source_url, MAX_ARTIFACT_BYTES).await?;

        let size = data.len() as u64;
        if size > MAX_ARTIFACT_BYTES {
            return Err(ClipForgeError::PayloadTooLarge {
                size,
                limit: MAX_ARTIFACT_BYTES,
            });
        }

        let key = video_key(job.provider, &job.job_id);
        let metadata = ObjectMetadata::new("video/mp4")
            .with("provider", job.provider.as_str())
            .with("jobId", job.job_id.clone())
            .with(
                "prompt",
                job.prompt
                    .chars()
                    .take(MAX_PROMPT_METADATA_CHARS)
                    .collect::<String>(),
            );

        self.store.put(data, &key, metadata).await
    }
}
