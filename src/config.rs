//! Process configuration, loaded once at startup.

use crate::error::{ClipForgeError, Result};
use crate::video::providers::{KieModel, SoraModel};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_KIE_BASE_URL: &str = "https://api.kie.ai";
const DEFAULT_SORA_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Kie provider settings.
#[derive(Debug, Clone)]
pub struct KieSettings {
    /// API key (`KIE_API_KEY`).
    pub api_key: String,
    /// API base URL (`KIE_BASE_URL`).
    pub base_url: String,
    /// Model (`KIE_MODEL`).
    pub model: KieModel,
}

/// Sora provider settings.
#[derive(Debug, Clone)]
pub struct SoraSettings {
    /// API key (`SORA_API_KEY`).
    pub api_key: String,
    /// API base URL (`SORA_BASE_URL`).
    pub base_url: String,
    /// Model (`SORA_MODEL`).
    pub model: SoraModel,
}

/// Artifact store settings.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Bucket name (`GCS_BUCKET`).
    pub bucket: String,
    /// Project id (`GCS_PROJECT_ID`).
    pub project_id: String,
    /// Service-account JSON path (`GCS_CREDENTIALS`).
    pub credentials_path: PathBuf,
}

/// Immutable configuration shared by the server and the orchestrator.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Kie provider.
    pub kie: KieSettings,
    /// Sora provider.
    pub sora: SoraSettings,
    /// Artifact store.
    pub storage: StorageSettings,
    /// HTTP listen address (`BIND_ADDR`).
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => {
                return Err(ClipForgeError::Configuration(format!(
                    "failed to read .env: {e}"
                )))
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from a key/value map.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Builds the configuration from an arbitrary lookup.
    ///
    /// All missing required variables are reported together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut missing = Vec::new();
        let mut required = |key: &'static str| {
            get(key).unwrap_or_else(|| {
                missing.push(key);
                String::new()
            })
        };

        let kie_api_key = required("KIE_API_KEY");
        let sora_api_key = required("SORA_API_KEY");
        let bucket = required("GCS_BUCKET");
        let project_id = required("GCS_PROJECT_ID");
        let credentials_path = required("GCS_CREDENTIALS");

        if !missing.is_empty() {
            return Err(ClipForgeError::Configuration(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let kie_model = match get("KIE_MODEL") {
            Some(m) => m.parse()?,
            None => KieModel::default(),
        };
        let sora_model = match get("SORA_MODEL") {
            Some(m) => m.parse()?,
            None => SoraModel::default(),
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ClipForgeError::Configuration(format!("invalid BIND_ADDR: {e}")))?;

        Ok(Self {
            kie: KieSettings {
                api_key: kie_api_key,
                base_url: get("KIE_BASE_URL").unwrap_or_else(|| DEFAULT_KIE_BASE_URL.into()),
                model: kie_model,
            },
            sora: SoraSettings {
                api_key: sora_api_key,
                base_url: get("SORA_BASE_URL").unwrap_or_else(|| DEFAULT_SORA_BASE_URL.into()),
                model: sora_model,
            },
            storage: StorageSettings {
                bucket,
                project_id,
                credentials_path: PathBuf::from(credentials_path),
            },
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        [
            ("KIE_API_KEY", "kie-key"),
            ("SORA_API_KEY", "sora-key"),
            ("GCS_BUCKET", "clips"),
            ("GCS_PROJECT_ID", "proj"),
            ("GCS_CREDENTIALS", "/secrets/sa.json"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_map(&base_vars()).unwrap();
        assert_eq!(config.kie.base_url, "https://api.kie.ai");
        assert_eq!(config.kie.model, KieModel::Veo3Fast);
        assert_eq!(config.sora.base_url, "https://api.openai.com");
        assert_eq!(config.sora.model, SoraModel::Sora2);
        assert_eq!(config.storage.bucket, "clips");
        assert_eq!(config.storage.credentials_path, PathBuf::from("/secrets/sa.json"));
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn test_overrides() {
        let mut vars = base_vars();
        vars.insert("KIE_MODEL".into(), "veo3".into());
        vars.insert("SORA_MODEL".into(), "sora-2-pro".into());
        vars.insert("SORA_BASE_URL".into(), "http://sora.internal".into());
        vars.insert("BIND_ADDR".into(), "127.0.0.1:9000".into());

        let config = AppConfig::from_map(&vars).unwrap();
        assert_eq!(config.kie.model, KieModel::Veo3);
        assert_eq!(config.sora.model, SoraModel::Sora2Pro);
        assert_eq!(config.sora.base_url, "http://sora.internal");
        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn test_missing_values_reported_together() {
        let mut vars = base_vars();
        vars.remove("KIE_API_KEY");
        vars.insert("GCS_BUCKET".into(), "   ".into());

        let err = AppConfig::from_map(&vars).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ClipForgeError::Configuration(_)));
        assert!(msg.contains("KIE_API_KEY"));
        assert!(msg.contains("GCS_BUCKET"));
        assert!(!msg.contains("SORA_API_KEY"));
    }

    #[test]
    fn test_invalid_model() {
        let mut vars = base_vars();
        vars.insert("KIE_MODEL".into(), "veo1".into());
        assert!(matches!(
            AppConfig::from_map(&vars),
            Err(ClipForgeError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_bind_addr() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDR".into(), "localhost".into());
        assert!(AppConfig::from_map(&vars).is_err());
    }
}
