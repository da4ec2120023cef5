//! Error taxonomy shared across the crate.

use std::fmt;

use thiserror::Error;

/// Which half of the external provider call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStage {
    Transcription,
    Enrichment,
}

impl fmt::Display for ProviderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderStage::Transcription => write!(f, "transcription"),
            ProviderStage::Enrichment => write!(f, "enrichment"),
        }
    }
}

/// Failures surfaced by the core components.
///
/// `ResourceUnavailable` covers microphone acquisition and capture
/// finalization; `Provider` carries the stage that failed so callers can
/// distinguish a bad upload from a bad completion.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("audio capture unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("{stage} stage failed: {message}")]
    Provider {
        stage: ProviderStage,
        message: String,
    },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("no history entry with id '{0}'")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn provider(stage: ProviderStage, message: impl fmt::Display) -> Self {
        CoreError::Provider {
            stage,
            message: message.to_string(),
        }
    }

    pub fn persistence(message: impl fmt::Display) -> Self {
        CoreError::Persistence(message.to_string())
    }
}
