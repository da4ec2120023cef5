pub mod audio;
pub mod config;
pub mod error;
pub mod history;
pub mod hotkey;
pub mod http;
pub mod paths;
pub mod pipeline;
pub mod provider;
pub mod session;

pub use audio::{AudioPayload, AudioRecorder, CaptureHandle, LevelMeter};
pub use config::{Config, ConfigPatch, ConfigStore};
pub use error::{CoreError, ProviderStage};
pub use history::{HistoryEntry, HistoryStore};
pub use hotkey::{DEFAULT_HOTKEY, HotkeyDispatcher};
pub use pipeline::{ProcessOutcome, ProcessingOrchestrator};
pub use provider::{GroqProvider, SpeechProvider};
pub use session::{CaptureBackend, CaptureSession, SessionController, SessionState};
