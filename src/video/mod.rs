//! Video generation: provider clients, polling and the orchestrator.

pub(crate) mod orchestrator;
pub mod poller;
pub(crate) mod provider;
pub mod providers;
pub(crate) mod types;

pub use orchestrator::Orchestrator;
pub use poller::{poll_until_terminal, PollSettings};
pub use provider::ProviderClient;
pub use types::{
    GenerationJob, GenerationRequest, GenerationResult, InputImage, JobStatus, ModelInfo,
    ProviderKind, ResultStatus,
};
