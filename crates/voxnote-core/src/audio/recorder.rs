//! Capture sessions on a dedicated thread.
//!
//! cpal streams are not `Send`, so each session runs the stream on its own
//! thread; the handle carries only channels and shared buffers. Chunks are
//! accumulated in arrival order and concatenated into one WAV payload when
//! the session is finalized.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::{debug, warn};

use super::{AudioPayload, LevelMeter, encoder};
use crate::error::CoreError;
use crate::session::{CaptureBackend, CaptureSession};

const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct StreamInfo {
    sample_rate: u32,
    channels: u16,
}

/// Observer invoked with each chunk of samples as it arrives from the device.
pub type ChunkObserver = Arc<dyn Fn(&[f32]) + Send + Sync>;

/// Microphone recorder configuration.
#[derive(Clone, Default)]
pub struct AudioRecorder {
    device_name: Option<String>,
    observers: Vec<ChunkObserver>,
}

impl AudioRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a named input device instead of the system default.
    pub fn with_device(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = Some(device_name.into());
        self
    }

    /// Observe each arriving chunk. Observers run on the audio callback
    /// thread and must not block.
    pub fn on_chunk(mut self, observer: impl Fn(&[f32]) + Send + Sync + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Acquire the microphone and start accumulating samples.
    pub fn open(&self) -> Result<CaptureHandle, CoreError> {
        let samples = Arc::new(Mutex::new(Vec::<f32>::new()));
        let meter = Arc::new(LevelMeter::new());
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<StreamInfo, String>>(1);

        // the amplitude probe rides the same observer seam as external handlers
        let mut observers = self.observers.clone();
        let meter_observer = meter.clone();
        observers.push(Arc::new(move |chunk: &[f32]| meter_observer.observe(chunk)));

        let thread_samples = samples.clone();
        let device_name = self.device_name.clone();
        let join = std::thread::Builder::new()
            .name("voxnote-capture".into())
            .spawn(move || {
                capture_thread(device_name, thread_samples, observers, ready_tx, stop_rx)
            })
            .map_err(|e| {
                CoreError::ResourceUnavailable(format!("failed to spawn capture thread: {e}"))
            })?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(info)) => {
                debug!(
                    sample_rate = info.sample_rate,
                    channels = info.channels,
                    "capture stream open"
                );
                Ok(CaptureHandle {
                    samples,
                    meter,
                    stop_tx: Some(stop_tx),
                    join: Some(join),
                    info,
                })
            }
            Ok(Err(message)) => {
                let _ = join.join();
                Err(CoreError::ResourceUnavailable(message))
            }
            Err(_) => Err(CoreError::ResourceUnavailable(
                "timed out waiting for the input stream".to_string(),
            )),
        }
    }
}

/// One in-progress capture. Dropping the handle signals the capture thread,
/// so the device is released on every exit path.
pub struct CaptureHandle {
    samples: Arc<Mutex<Vec<f32>>>,
    meter: Arc<LevelMeter>,
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
    info: StreamInfo,
}

impl CaptureHandle {
    /// The amplitude probe fed by the capture callback.
    pub fn meter(&self) -> &LevelMeter {
        &self.meter
    }

    /// Stop the stream and concatenate everything captured so far into one
    /// WAV payload.
    pub fn finalize(mut self) -> Result<AudioPayload, CoreError> {
        self.shutdown();
        let raw = std::mem::take(&mut *self.samples.lock().unwrap());
        let mono = encoder::downmix_to_mono(&raw, self.info.channels);
        let data = encoder::encode_wav(&mono, self.info.sample_rate)
            .map_err(|e| CoreError::ResourceUnavailable(format!("failed to encode capture: {e}")))?;
        Ok(AudioPayload {
            data,
            mime_type: "audio/wav".to_string(),
        })
    }

    /// Release capture resources without producing a payload.
    pub fn abort(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        // disconnecting the channel unblocks the capture thread; no join here
        self.stop_tx.take();
    }
}

impl CaptureBackend for AudioRecorder {
    fn open(&self) -> Result<Box<dyn CaptureSession>, CoreError> {
        Ok(Box::new(AudioRecorder::open(self)?))
    }
}

impl CaptureSession for CaptureHandle {
    fn finalize(self: Box<Self>) -> Result<AudioPayload, CoreError> {
        CaptureHandle::finalize(*self)
    }

    fn abort(self: Box<Self>) {
        CaptureHandle::abort(*self);
    }
}

fn capture_thread(
    device_name: Option<String>,
    samples: Arc<Mutex<Vec<f32>>>,
    observers: Vec<ChunkObserver>,
    ready_tx: Sender<Result<StreamInfo, String>>,
    stop_rx: Receiver<()>,
) {
    if let Err(err) = run_capture(device_name, samples, observers, &ready_tx, stop_rx) {
        let _ = ready_tx.send(Err(err.to_string()));
    }
}

fn run_capture(
    device_name: Option<String>,
    samples: Arc<Mutex<Vec<f32>>>,
    observers: Vec<ChunkObserver>,
    ready_tx: &Sender<Result<StreamInfo, String>>,
    stop_rx: Receiver<()>,
) -> Result<()> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()
            .context("Failed to enumerate input devices")?
            .find(|d| d.name().ok().as_deref() == Some(name.as_str()))
            .with_context(|| format!("Input device not found: {name}"))?,
        None => host
            .default_input_device()
            .context("No default input device available")?,
    };

    let supported = device
        .default_input_config()
        .context("Failed to get default input config")?;
    let config: cpal::StreamConfig = supported.config();
    let info = StreamInfo {
        sample_rate: config.sample_rate,
        channels: config.channels,
    };

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, samples, observers)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, samples, observers)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, samples, observers)?,
        other => anyhow::bail!("Unsupported sample format: {other:?}"),
    };
    stream.play().context("Failed to start the input stream")?;

    let _ = ready_tx.send(Ok(info));

    // parked until an explicit stop or the handle is dropped
    let _ = stop_rx.recv();
    drop(stream);
    Ok(())
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<Mutex<Vec<f32>>>,
    observers: Vec<ChunkObserver>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let err_fn = |err| {
        warn!("audio stream error (non-fatal): {err}");
    };

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let chunk: Vec<f32> = data.iter().map(|&s| cpal::Sample::from_sample(s)).collect();
                for observer in &observers {
                    observer(&chunk);
                }
                samples.lock().unwrap().extend_from_slice(&chunk);
            },
            err_fn,
            None,
        )
        .context("Failed to build input stream")?;

    Ok(stream)
}
