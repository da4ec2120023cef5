//! User-editable processing configuration.
//!
//! One JSON document per process, persisted under the app data directory.
//! The `version` field identifies the config schema and survives every
//! partial update.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::CoreError;
use crate::paths;

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an intelligent assistant. \
Enrich the following transcription. Format it as a structured note, summary, \
or action list depending on the content. Be concise and professional.";

const DEFAULT_LANGUAGE: &str = "en";
const CONFIG_VERSION: &str = "1.0.0";

const CONFIG_FILE: &str = "config.json";

/// Processing configuration: enrichment model and prompt, transcription
/// language hint, and the schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub model: String,
    pub system_prompt: String,
    pub language: String,
    pub version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            version: CONFIG_VERSION.to_string(),
        }
    }
}

/// Partial update for [`Config`]. A `version` sent by the caller is accepted
/// on the wire but never applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub language: Option<String>,
    pub version: Option<String>,
}

/// Persisted configuration with merge-patch updates and reset-to-default.
pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CONFIG_FILE),
            write_lock: Mutex::new(()),
        }
    }

    /// Current configuration.
    ///
    /// Initializes and persists the built-in default when no config exists
    /// yet. An unreadable file degrades to the in-memory default without
    /// overwriting whatever is on disk.
    pub async fn get(&self) -> Result<Config, CoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(config) => Ok(config),
                Err(err) => {
                    warn!("unreadable config at {}: {err}; using defaults", self.path.display());
                    Ok(Config::default())
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let config = Config::default();
                self.persist(&config).await?;
                Ok(config)
            }
            Err(err) => Err(CoreError::persistence(format!(
                "reading {}: {err}",
                self.path.display()
            ))),
        }
    }

    /// Merge `patch` over the current configuration. `version` is always
    /// preserved from the current value, regardless of what the patch says.
    pub async fn update(&self, patch: ConfigPatch) -> Result<Config, CoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.get().await?;
        let next = Config {
            model: patch.model.unwrap_or(current.model),
            system_prompt: patch.system_prompt.unwrap_or(current.system_prompt),
            language: patch.language.unwrap_or(current.language),
            version: current.version,
        };
        self.persist(&next).await?;
        Ok(next)
    }

    /// Overwrite the persisted configuration with the built-in default.
    pub async fn reset_to_default(&self) -> Result<Config, CoreError> {
        let _guard = self.write_lock.lock().await;
        let config = Config::default();
        self.persist(&config).await?;
        Ok(config)
    }

    async fn persist(&self, config: &Config) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            paths::ensure_dir(parent)?;
        }
        let json = serde_json::to_vec_pretty(config)
            .map_err(|e| CoreError::persistence(format!("encoding config: {e}")))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| CoreError::persistence(format!("writing {}: {e}", self.path.display())))
    }
}
