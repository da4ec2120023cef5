//! Microphone capture and payload finalization.

mod encoder;
mod meter;
mod recorder;

pub use encoder::{downmix_to_mono, encode_wav};
pub use meter::LevelMeter;
pub use recorder::{AudioRecorder, CaptureHandle, ChunkObserver};

/// Finalized audio for one session: opaque bytes plus the declared content
/// type, ready for upload.
#[derive(Debug, Clone)]
pub struct AudioPayload {
    pub data: Vec<u8>,
    pub mime_type: String,
}
