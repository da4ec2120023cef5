//! Groq provider, speaking the OpenAI-compatible API.
//!
//! Both stages use the standard formats: multipart form upload with `model`
//! and `file` fields for transcription, chat completions for enrichment,
//! `Bearer` authorization for both.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::SpeechProvider;
use crate::error::{CoreError, ProviderStage};
use crate::http::get_http_client;

const TRANSCRIPTION_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
const CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Speech-to-text model used for the transcription stage.
const TRANSCRIPTION_MODEL: &str = "whisper-large-v3";

/// Environment variable holding the API credential.
pub const API_KEY_ENV_VAR: &str = "GROQ_API_KEY";

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

pub struct GroqProvider {
    api_key: Option<String>,
}

impl GroqProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
        }
    }

    /// Read the API credential from the environment. A missing key is not
    /// fatal: provider calls fail until one is configured.
    pub fn from_env() -> Self {
        let api_key = std::env::var(API_KEY_ENV_VAR).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("{API_KEY_ENV_VAR} is not set; provider calls will fail until it is");
        }
        Self { api_key }
    }

    fn key(&self, stage: ProviderStage) -> Result<&str, CoreError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| CoreError::provider(stage, format!("{API_KEY_ENV_VAR} is not configured")))
    }
}

#[async_trait]
impl SpeechProvider for GroqProvider {
    async fn transcribe(
        &self,
        path: &Path,
        mime_type: &str,
        language: Option<&str>,
    ) -> Result<String, CoreError> {
        let stage = ProviderStage::Transcription;
        let api_key = self.key(stage)?;
        let client = get_http_client().map_err(|e| CoreError::provider(stage, e))?;

        let audio = tokio::fs::read(path)
            .await
            .map_err(|e| CoreError::provider(stage, format!("failed to read spooled audio: {e}")))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(filename)
            .mime_str(mime_type)
            .map_err(|e| CoreError::provider(stage, e))?;
        let mut form = reqwest::multipart::Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .part("file", part);
        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        let response = client
            .post(TRANSCRIPTION_URL)
            .header("Authorization", format!("Bearer {api_key}"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| CoreError::provider(stage, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CoreError::provider(
                stage,
                format!("API error ({status}): {error_text}"),
            ));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| CoreError::provider(stage, format!("failed to parse response: {e}")))?;
        Ok(parsed.text)
    }

    async fn enrich(
        &self,
        transcript: &str,
        prompt: &str,
        model: &str,
    ) -> Result<String, CoreError> {
        let stage = ProviderStage::Enrichment;
        let api_key = self.key(stage)?;
        let client = get_http_client().map_err(|e| CoreError::provider(stage, e))?;

        let response = client
            .post(CHAT_URL)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&serde_json::json!({
                "model": model,
                "messages": [
                    {"role": "system", "content": prompt},
                    {"role": "user", "content": transcript}
                ]
            }))
            .send()
            .await
            .map_err(|e| CoreError::provider(stage, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CoreError::provider(
                stage,
                format!("API error ({status}): {error_text}"),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CoreError::provider(stage, format!("failed to parse response: {e}")))?;
        parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| CoreError::provider(stage, "empty completion response"))
    }
}
