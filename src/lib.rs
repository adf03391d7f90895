#![warn(missing_docs)]
//! ClipForge - prompt-to-video generation backed by object storage.
//!
//! A prompt (and optionally a reference image) is submitted to one of two
//! asynchronous video providers, the job is polled until it finishes, and the
//! resulting video is copied into a bucket with a stable public URL.
//!
//! # Quick Start
//!
//! ```no_run
//! use clipforge::{AppConfig, GenerationRequest, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> clipforge::Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let orchestrator = Orchestrator::from_config(&config)?;
//!     let request = GenerationRequest::new("A paper boat drifting down a rainy street");
//!     let result = orchestrator.generate_with_kie(&request).await?;
//!     println!("{}", result.download_url);
//!     Ok(())
//! }
//! ```
//!
//! # Providers
//! - `kie`: Veo via Kie.ai (accepts reference images)
//! - `sora`: Sora (OpenAI-compatible video API, prompt only)
//!
//! # Features
//! - `server`: axum HTTP endpoint ([`server::router`])
//! - `cli`: `clipforge` binary (enables `server`)

mod error;

pub mod config;
pub mod storage;
pub mod video;

#[cfg(feature = "server")]
pub mod server;

#[cfg(test)]
mod testing;

// Re-export error types at crate root
pub use error::{ClipForgeError, OutwardError, Result};

pub use config::AppConfig;
pub use storage::{ArtifactStore, GcsStore, GcsStoreBuilder, ObjectMetadata};
pub use video::providers::{
    KieModel, KieProvider, KieProviderBuilder, SoraModel, SoraProvider, SoraProviderBuilder,
};
pub use video::{
    GenerationJob, GenerationRequest, GenerationResult, InputImage, JobStatus, ModelInfo,
    Orchestrator, PollSettings, ProviderClient, ProviderKind,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{ClipForgeError, Result};
    pub use crate::video::{
        GenerationRequest, GenerationResult, Orchestrator, ProviderClient, ProviderKind,
    };
}
