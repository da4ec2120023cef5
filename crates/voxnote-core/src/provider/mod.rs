//! External transcription and enrichment providers.

mod groq;

pub use groq::{API_KEY_ENV_VAR, GroqProvider};

use std::path::Path;

use async_trait::async_trait;

use crate::error::CoreError;

/// The opaque two-stage remote dependency: speech-to-text, then LLM
/// enrichment of the transcript.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Transcribe the audio file at `path`.
    async fn transcribe(
        &self,
        path: &Path,
        mime_type: &str,
        language: Option<&str>,
    ) -> Result<String, CoreError>;

    /// Rewrite `transcript` according to `prompt` using `model`.
    async fn enrich(&self, transcript: &str, prompt: &str, model: &str)
    -> Result<String, CoreError>;
}
