//! Amplitude monitoring on the capture callback.

use std::sync::atomic::{AtomicU32, Ordering};

/// Tracks the RMS level of the most recent capture callback.
///
/// Wired into every capture session as the analysis stage. Nothing acts on
/// the readings yet; recordings stop only on an explicit trigger.
// TODO: expose a configurable silence threshold and auto-stop on sustained low RMS
#[derive(Debug, Default)]
pub struct LevelMeter {
    last_rms_bits: AtomicU32,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the RMS of one callback's worth of samples.
    pub fn observe(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        let rms = (sum_sq / samples.len() as f32).sqrt();
        self.last_rms_bits.store(rms.to_bits(), Ordering::Relaxed);
    }

    /// RMS of the most recently observed callback, 0.0 before any audio.
    pub fn last_rms(&self) -> f32 {
        f32::from_bits(self.last_rms_bits.load(Ordering::Relaxed))
    }
}
