//! In-memory fakes shared by unit tests.

use crate::error::{ClipForgeError, Result};
use crate::storage::{public_url, ArtifactStore, ObjectMetadata, MAX_ARTIFACT_BYTES};
use crate::video::poller::PollSettings;
use crate::video::provider::ProviderClient;
use crate::video::types::{JobStatus, ModelInfo, ProviderKind};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) const TEST_BUCKET: &str = "test-bucket";

/// One scripted answer to `fetch_status`.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Status(JobStatus),
    TransientError,
}

/// A provider whose answers are fixed up front.
///
/// Once the status script runs out the last step repeats.
pub(crate) struct ScriptedProvider {
    kind: ProviderKind,
    job_id: String,
    reject_submit: bool,
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    artifact_len: usize,
    accepts_image_refs: bool,
    settings: PollSettings,
    pub submits: Mutex<Vec<(String, Vec<String>)>>,
    pub status_calls: AtomicUsize,
    pub downloads: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(kind: ProviderKind, job_id: &str) -> Self {
        Self {
            kind,
            job_id: job_id.to_string(),
            reject_submit: false,
            steps: Mutex::new(VecDeque::new()),
            last: Mutex::new(Step::Status(JobStatus::Pending)),
            artifact_len: 16,
            accepts_image_refs: true,
            settings: PollSettings::new(Duration::from_secs(5), Duration::from_secs(1)),
            submits: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_steps(self, steps: Vec<Step>) -> Self {
        *self.steps.lock().unwrap() = steps.into();
        self
    }

    pub fn completing_with(self, refs: &[&str]) -> Self {
        self.with_steps(vec![
            Step::Status(JobStatus::Pending),
            Step::Status(JobStatus::Completed {
                result_refs: refs.iter().map(|r| r.to_string()).collect(),
            }),
        ])
    }

    pub fn rejecting_submit(mut self) -> Self {
        self.reject_submit = true;
        self
    }

    pub fn with_artifact_len(mut self, len: usize) -> Self {
        self.artifact_len = len;
        self
    }

    pub fn without_image_refs(mut self) -> Self {
        self.accepts_image_refs = false;
        self
    }

    pub fn with_poll_settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn submit(&self, prompt: &str, image_refs: &[String]) -> Result<String> {
        self.submits
            .lock()
            .unwrap()
            .push((prompt.to_string(), image_refs.to_vec()));
        if self.reject_submit {
            return Err(ClipForgeError::submission(self.kind.as_str(), "rejected"));
        }
        Ok(self.job_id.clone())
    }

    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus> {
        assert_eq!(job_id, self.job_id, "polled a job that was never submitted");
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        let step = match self.steps.lock().unwrap().pop_front() {
            Some(step) => {
                *self.last.lock().unwrap() = step.clone();
                step
            }
            None => self.last.lock().unwrap().clone(),
        };

        match step {
            Step::Status(status) => Ok(status),
            Step::TransientError => Err(ClipForgeError::TransientPoll("connection reset".into())),
        }
    }

    async fn download(&self, url: &str, _limit: u64) -> Result<Vec<u8>> {
        self.downloads.lock().unwrap().push(url.to_string());
        Ok(vec![0u8; self.artifact_len])
    }

    fn poll_settings(&self) -> PollSettings {
        self.settings
    }

    fn model_info(&self) -> ModelInfo {
        match self.kind {
            ProviderKind::Kie => ModelInfo {
                model: "veo3_fast".into(),
                size: "1280x720".into(),
                duration_seconds: "8".into(),
            },
            ProviderKind::Sora => ModelInfo::unknown(),
        }
    }

    fn accepts_image_refs(&self) -> bool {
        self.accepts_image_refs
    }
}

/// A stored object as seen by [`MemoryStore`].
#[derive(Debug, Clone)]
pub(crate) struct StoredObject {
    pub key: String,
    pub len: usize,
    pub metadata: ObjectMetadata,
}

/// Records puts in memory; can be told to fail.
#[derive(Default)]
pub(crate) struct MemoryStore {
    fail: bool,
    pub objects: Mutex<Vec<StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|o| o.key.clone())
            .collect()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put(&self, data: Vec<u8>, key: &str, metadata: ObjectMetadata) -> Result<String> {
        if data.len() as u64 > MAX_ARTIFACT_BYTES {
            return Err(ClipForgeError::PayloadTooLarge {
                size: data.len() as u64,
                limit: MAX_ARTIFACT_BYTES,
            });
        }
        if self.fail {
            return Err(ClipForgeError::Storage("bucket unavailable".into()));
        }
        self.objects.lock().unwrap().push(StoredObject {
            key: key.to_string(),
            len: data.len(),
            metadata,
        });
        Ok(public_url(TEST_BUCKET, key))
    }
}

/// Serves `router` on an ephemeral local port and returns its base URL.
#[cfg(feature = "server")]
pub(crate) async fn spawn_fake_api(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
