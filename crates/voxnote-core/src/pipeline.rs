//! Processing pipeline: one finalized payload to one persisted, enriched
//! record.
//!
//! The payload is spooled to a scoped temp file, transcribed, enriched with
//! the current configuration, and appended to history. The spool file is
//! removed on every exit path, and nothing is persisted unless both provider
//! stages succeed.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::audio::AudioPayload;
use crate::config::ConfigStore;
use crate::error::CoreError;
use crate::history::{HistoryEntry, HistoryStore};
use crate::provider::SpeechProvider;

/// Result of one pipeline run, as surfaced to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub id: String,
    pub transcript: String,
    pub enriched: String,
}

pub struct ProcessingOrchestrator {
    provider: Arc<dyn SpeechProvider>,
    config: Arc<ConfigStore>,
    history: Arc<HistoryStore>,
    spool_dir: PathBuf,
}

impl ProcessingOrchestrator {
    pub fn new(
        provider: Arc<dyn SpeechProvider>,
        config: Arc<ConfigStore>,
        history: Arc<HistoryStore>,
    ) -> Self {
        Self {
            provider,
            config,
            history,
            spool_dir: std::env::temp_dir(),
        }
    }

    /// Spool uploads into `dir` instead of the system temp directory.
    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = dir.into();
        self
    }

    /// Run the two-stage pipeline for one finalized payload.
    ///
    /// Concurrent calls are safe: spool names are collision-free and history
    /// writes are serialized by the store.
    pub async fn process(&self, payload: AudioPayload) -> Result<ProcessOutcome, CoreError> {
        // removed on drop, whichever way this function exits
        let spool = tempfile::Builder::new()
            .prefix("voxnote_upload_")
            .suffix(".wav")
            .tempfile_in(&self.spool_dir)
            .map_err(|e| CoreError::persistence(format!("failed to create spool file: {e}")))?;
        tokio::fs::write(spool.path(), &payload.data)
            .await
            .map_err(|e| CoreError::persistence(format!("failed to spool payload: {e}")))?;

        let config = self.config.get().await?;

        let transcript = self
            .provider
            .transcribe(spool.path(), &payload.mime_type, Some(&config.language))
            .await?;
        debug!(chars = transcript.len(), "transcription complete");

        let enriched = self
            .provider
            .enrich(&transcript, &config.system_prompt, &config.model)
            .await?;
        debug!(chars = enriched.len(), "enrichment complete");

        let entry = HistoryEntry::new(transcript, enriched);
        let outcome = ProcessOutcome {
            id: entry.id.clone(),
            transcript: entry.transcript.clone(),
            enriched: entry.enriched.clone(),
        };
        self.history.append(entry).await?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::ProviderStage;

    #[derive(Default)]
    struct ScriptedProvider {
        fail_transcription: bool,
        fail_enrichment: bool,
        transcribe_calls: AtomicUsize,
        enrich_calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechProvider for ScriptedProvider {
        async fn transcribe(
            &self,
            path: &Path,
            _mime_type: &str,
            _language: Option<&str>,
        ) -> Result<String, CoreError> {
            self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
            assert!(path.exists(), "spool file must exist during transcription");
            if self.fail_transcription {
                return Err(CoreError::provider(
                    ProviderStage::Transcription,
                    "scripted failure",
                ));
            }
            Ok("hello world".to_string())
        }

        async fn enrich(
            &self,
            transcript: &str,
            prompt: &str,
            model: &str,
        ) -> Result<String, CoreError> {
            self.enrich_calls.fetch_add(1, Ordering::SeqCst);
            assert!(!prompt.is_empty());
            assert!(!model.is_empty());
            if self.fail_enrichment {
                return Err(CoreError::provider(
                    ProviderStage::Enrichment,
                    "scripted failure",
                ));
            }
            Ok(format!("- {transcript}"))
        }
    }

    struct Harness {
        orchestrator: ProcessingOrchestrator,
        history: Arc<HistoryStore>,
        spool_dir: PathBuf,
        _dir: tempfile::TempDir,
    }

    fn harness(provider: ScriptedProvider) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let spool_dir = dir.path().join("spool");
        std::fs::create_dir_all(&spool_dir).unwrap();

        let config = Arc::new(ConfigStore::new(dir.path()));
        let history = Arc::new(HistoryStore::new(dir.path()));
        let orchestrator =
            ProcessingOrchestrator::new(Arc::new(provider), config, history.clone())
                .with_spool_dir(&spool_dir);
        Harness {
            orchestrator,
            history,
            spool_dir,
            _dir: dir,
        }
    }

    fn payload() -> AudioPayload {
        AudioPayload {
            data: vec![0u8; 64],
            mime_type: "audio/wav".to_string(),
        }
    }

    fn spool_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn success_appends_one_entry_and_cleans_the_spool() {
        let h = harness(ScriptedProvider::default());

        let outcome = h.orchestrator.process(payload()).await.unwrap();
        assert!(!outcome.id.is_empty());
        assert_eq!(outcome.transcript, "hello world");
        assert_eq!(outcome.enriched, "- hello world");

        let entries = h.history.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, outcome.id);
        assert!(!entries[0].deleted);

        assert!(spool_is_empty(&h.spool_dir));
    }

    #[tokio::test]
    async fn transcription_failure_persists_nothing() {
        let h = harness(ScriptedProvider {
            fail_transcription: true,
            ..ScriptedProvider::default()
        });

        let err = h.orchestrator.process(payload()).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Provider {
                stage: ProviderStage::Transcription,
                ..
            }
        ));

        assert!(h.history.raw().await.is_empty());
        assert!(spool_is_empty(&h.spool_dir));
    }

    #[tokio::test]
    async fn enrichment_failure_discards_the_transcript() {
        let h = harness(ScriptedProvider {
            fail_enrichment: true,
            ..ScriptedProvider::default()
        });

        let err = h.orchestrator.process(payload()).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Provider {
                stage: ProviderStage::Enrichment,
                ..
            }
        ));

        // no transcript-only fallback entry
        assert!(h.history.raw().await.is_empty());
        assert!(spool_is_empty(&h.spool_dir));
    }

    #[tokio::test]
    async fn concurrent_process_calls_all_land_in_history() {
        let dir = tempfile::tempdir().unwrap();
        let spool_dir = dir.path().join("spool");
        std::fs::create_dir_all(&spool_dir).unwrap();
        let config = Arc::new(ConfigStore::new(dir.path()));
        let history = Arc::new(HistoryStore::new(dir.path()));
        let orchestrator = Arc::new(
            ProcessingOrchestrator::new(
                Arc::new(ScriptedProvider::default()),
                config,
                history.clone(),
            )
            .with_spool_dir(&spool_dir),
        );

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let orchestrator = orchestrator.clone();
            tasks.push(tokio::spawn(async move {
                orchestrator.process(payload()).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(history.list().await.len(), 4);
        assert!(spool_is_empty(&spool_dir));
    }
}
