//! Recording session state machine.
//!
//! One controller per process arbitrates every start/stop trigger, whether it
//! came from the global hotkey or from an HTTP call. All state checks happen
//! under the same lock as the transition, so duplicate triggers collapse into
//! no-ops instead of racing into double-start or double-stop.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};

use crate::audio::AudioPayload;
use crate::error::CoreError;
use crate::pipeline::ProcessingOrchestrator;

/// Process-wide recording state. Exactly one instance per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Stopping,
    Processing,
    Error,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Stopping => "stopping",
            SessionState::Processing => "processing",
            SessionState::Error => "error",
        }
    }

    /// States from which the next cycle's `request_start` is accepted.
    fn startable(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Error)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source of capture sessions. The seam that lets the state machine run
/// without a microphone.
pub trait CaptureBackend: Send + Sync {
    fn open(&self) -> Result<Box<dyn CaptureSession>, CoreError>;
}

/// One in-progress capture. Implementations must release the device when
/// dropped, not only through `finalize`/`abort`.
pub trait CaptureSession: Send {
    fn finalize(self: Box<Self>) -> Result<AudioPayload, CoreError>;
    fn abort(self: Box<Self>);
}

struct SessionInner {
    state: SessionState,
    capture: Option<Box<dyn CaptureSession>>,
    cycle: u64,
}

/// Arbitrates recording triggers and drives each cycle
/// Idle → Recording → Stopping → Processing → Idle/Error.
pub struct SessionController {
    inner: Arc<Mutex<SessionInner>>,
    backend: Arc<dyn CaptureBackend>,
    orchestrator: Arc<ProcessingOrchestrator>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn CaptureBackend>, orchestrator: Arc<ProcessingOrchestrator>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                state: SessionState::Idle,
                capture: None,
                cycle: 0,
            })),
            backend,
            orchestrator,
        }
    }

    pub fn current_state(&self) -> SessionState {
        self.inner.lock().unwrap().state
    }

    /// Start a new capture. Returns `false` (no-op) unless the machine is in
    /// a startable state, so a hotkey fired twice starts exactly one session.
    pub fn request_start(&self) -> Result<bool, CoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.state.startable() {
            debug!(state = %inner.state, "start trigger ignored");
            return Ok(false);
        }

        // state is untouched if the device cannot be acquired
        let capture = self.backend.open()?;
        inner.capture = Some(capture);
        inner.state = SessionState::Recording;
        inner.cycle += 1;
        info!(cycle = inner.cycle, "recording started");
        Ok(true)
    }

    /// Stop the active capture and hand the payload to the pipeline.
    ///
    /// Returns `false` (no-op) unless currently `Recording`. The provider
    /// stages run as a detached task; its completion moves `Processing` to
    /// `Idle` or `Error` unless a newer cycle has taken over since.
    pub async fn request_stop(&self) -> Result<bool, CoreError> {
        let (capture, cycle) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != SessionState::Recording {
                debug!(state = %inner.state, "stop trigger ignored");
                return Ok(false);
            }
            inner.state = SessionState::Stopping;
            (inner.capture.take(), inner.cycle)
        };

        let Some(capture) = capture else {
            set_state_for_cycle(&self.inner, cycle, SessionState::Error);
            return Err(CoreError::ResourceUnavailable(
                "no active capture session".to_string(),
            ));
        };

        // finalize joins the capture thread; keep it off the async executor
        let payload = match tokio::task::spawn_blocking(move || capture.finalize()).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(err)) => {
                set_state_for_cycle(&self.inner, cycle, SessionState::Error);
                return Err(err);
            }
            Err(join_err) => {
                set_state_for_cycle(&self.inner, cycle, SessionState::Error);
                return Err(CoreError::ResourceUnavailable(format!(
                    "capture finalize task failed: {join_err}"
                )));
            }
        };

        set_state_for_cycle(&self.inner, cycle, SessionState::Processing);
        info!(bytes = payload.data.len(), "capture finalized, processing");

        let inner = self.inner.clone();
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            match orchestrator.process(payload).await {
                Ok(outcome) => {
                    info!(id = %outcome.id, "pipeline complete");
                    set_state_for_cycle(&inner, cycle, SessionState::Idle);
                }
                Err(err) => {
                    error!("pipeline failed: {err}");
                    set_state_for_cycle(&inner, cycle, SessionState::Error);
                }
            }
        });

        Ok(true)
    }

    /// Drop an in-progress capture without producing a payload. Used at
    /// shutdown, or whenever the cycle has to end without processing.
    pub fn abort_active(&self) {
        let capture = {
            let mut inner = self.inner.lock().unwrap();
            match inner.capture.take() {
                Some(capture) => {
                    inner.state = SessionState::Idle;
                    capture
                }
                None => return,
            }
        };
        capture.abort();
        info!("active capture aborted");
    }

    /// Toggle semantics shared by the hotkey and the HTTP control: stop when
    /// recording, start otherwise. The re-validation inside `request_start`/
    /// `request_stop` keeps concurrent toggles idempotent.
    pub async fn toggle(&self) -> Result<SessionState, CoreError> {
        if self.current_state() == SessionState::Recording {
            self.request_stop().await?;
        } else {
            self.request_start()?;
        }
        Ok(self.current_state())
    }
}

/// Apply `state` only if `cycle` is still the current one; a stale pipeline
/// completion must not clobber a newer cycle.
fn set_state_for_cycle(inner: &Mutex<SessionInner>, cycle: u64, state: SessionState) {
    let mut inner = inner.lock().unwrap();
    if inner.cycle == cycle {
        inner.state = state;
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::ConfigStore;
    use crate::error::ProviderStage;
    use crate::history::HistoryStore;
    use crate::provider::SpeechProvider;

    struct MockCapture {
        opened: AtomicUsize,
    }

    impl MockCapture {
        fn new() -> Self {
            Self {
                opened: AtomicUsize::new(0),
            }
        }
    }

    impl CaptureBackend for MockCapture {
        fn open(&self) -> Result<Box<dyn CaptureSession>, CoreError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockSession))
        }
    }

    struct MockSession;

    impl CaptureSession for MockSession {
        fn finalize(self: Box<Self>) -> Result<AudioPayload, CoreError> {
            Ok(AudioPayload {
                data: vec![1, 2, 3],
                mime_type: "audio/wav".to_string(),
            })
        }

        fn abort(self: Box<Self>) {}
    }

    struct MockProvider {
        fail_transcription: AtomicBool,
    }

    impl MockProvider {
        fn ok() -> Self {
            Self {
                fail_transcription: AtomicBool::new(false),
            }
        }

        fn failing() -> Self {
            Self {
                fail_transcription: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl SpeechProvider for MockProvider {
        async fn transcribe(
            &self,
            _path: &Path,
            _mime_type: &str,
            _language: Option<&str>,
        ) -> Result<String, CoreError> {
            if self.fail_transcription.load(Ordering::SeqCst) {
                return Err(CoreError::provider(
                    ProviderStage::Transcription,
                    "mock outage",
                ));
            }
            Ok("mock transcript".to_string())
        }

        async fn enrich(
            &self,
            transcript: &str,
            _prompt: &str,
            _model: &str,
        ) -> Result<String, CoreError> {
            Ok(format!("enriched: {transcript}"))
        }
    }

    fn controller_with(
        dir: &Path,
        backend: Arc<dyn CaptureBackend>,
        provider: Arc<dyn SpeechProvider>,
    ) -> (Arc<SessionController>, Arc<HistoryStore>) {
        let config = Arc::new(ConfigStore::new(dir));
        let history = Arc::new(HistoryStore::new(dir));
        let orchestrator = Arc::new(ProcessingOrchestrator::new(
            provider,
            config,
            history.clone(),
        ));
        (
            Arc::new(SessionController::new(backend, orchestrator)),
            history,
        )
    }

    async fn wait_for_state(controller: &SessionController, want: SessionState) {
        for _ in 0..200 {
            if controller.current_state() == want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "state never reached {want}, stuck at {}",
            controller.current_state()
        );
    }

    #[tokio::test]
    async fn double_start_records_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockCapture::new());
        let (controller, _) =
            controller_with(dir.path(), backend.clone(), Arc::new(MockProvider::ok()));

        assert!(controller.request_start().unwrap());
        assert!(!controller.request_start().unwrap());
        assert_eq!(controller.current_state(), SessionState::Recording);
        assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_without_recording_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, _) = controller_with(
            dir.path(),
            Arc::new(MockCapture::new()),
            Arc::new(MockProvider::ok()),
        );

        assert!(!controller.request_stop().await.unwrap());
        assert_eq!(controller.current_state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn full_cycle_lands_back_in_idle_with_history() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, history) = controller_with(
            dir.path(),
            Arc::new(MockCapture::new()),
            Arc::new(MockProvider::ok()),
        );

        assert!(controller.request_start().unwrap());
        assert!(controller.request_stop().await.unwrap());
        wait_for_state(&controller, SessionState::Idle).await;

        let entries = history.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].transcript, "mock transcript");
    }

    #[tokio::test]
    async fn pipeline_failure_ends_in_error_and_stays_startable() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, history) = controller_with(
            dir.path(),
            Arc::new(MockCapture::new()),
            Arc::new(MockProvider::failing()),
        );

        assert!(controller.request_start().unwrap());
        assert!(controller.request_stop().await.unwrap());
        wait_for_state(&controller, SessionState::Error).await;

        assert!(history.raw().await.is_empty());
        // the next cycle starts from Error
        assert!(controller.request_start().unwrap());
        assert_eq!(controller.current_state(), SessionState::Recording);
    }

    #[tokio::test]
    async fn abort_active_releases_capture_and_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, history) = controller_with(
            dir.path(),
            Arc::new(MockCapture::new()),
            Arc::new(MockProvider::ok()),
        );

        assert!(controller.request_start().unwrap());
        controller.abort_active();
        assert_eq!(controller.current_state(), SessionState::Idle);
        assert!(history.raw().await.is_empty());

        // idempotent with nothing in flight
        controller.abort_active();
        assert!(controller.request_start().unwrap());
    }

    #[tokio::test]
    async fn toggle_drives_a_whole_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, _) = controller_with(
            dir.path(),
            Arc::new(MockCapture::new()),
            Arc::new(MockProvider::ok()),
        );

        assert_eq!(controller.toggle().await.unwrap(), SessionState::Recording);
        let after_stop = controller.toggle().await.unwrap();
        assert!(matches!(
            after_stop,
            SessionState::Processing | SessionState::Idle
        ));
        wait_for_state(&controller, SessionState::Idle).await;
    }
}
