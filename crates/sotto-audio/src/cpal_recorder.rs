//! Real microphone capture via cpal, writing WAV artifacts with hound.
//!
//! Samples are mixed down to mono f32 into a shared buffer while the stream
//! runs; `stop` drains the buffer into a 16-bit WAV file under the system
//! temp directory. Stream errors that occur after a successful start are
//! reported through the failure channel obtained from
//! [`CpalRecorder::take_failures`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use sotto_core::error::BridgeError;

use crate::AudioRecorder;

/// Wrapper to make the platform stream storable in shared state.
///
/// SAFETY: `cpal::Stream` is `!Send` because some platform backends tie the
/// stream to its creating thread. We only ever create, hold, and drop the
/// stream; no audio calls are made from other threads, and the mutex keeps
/// access exclusive.
struct SendStream(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for SendStream {}

/// Microphone recorder using the default cpal input device.
pub struct CpalRecorder {
    preferred_rate: u32,
    effective_rate: AtomicU32,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Mutex<Option<SendStream>>,
    playback: AtomicBool,
    failure_tx: UnboundedSender<String>,
    failure_rx: Mutex<Option<UnboundedReceiver<String>>>,
}

impl CpalRecorder {
    /// Create a recorder that prefers capturing at `sample_rate` Hz.
    pub fn new(sample_rate: u32) -> Self {
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        Self {
            preferred_rate: sample_rate,
            effective_rate: AtomicU32::new(sample_rate),
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: Mutex::new(None),
            playback: AtomicBool::new(false),
            failure_tx,
            failure_rx: Mutex::new(Some(failure_rx)),
        }
    }

    /// Take the receiver for asynchronous stream failures. The application
    /// forwards these into the engine. Returns `None` after the first call.
    pub fn take_failures(&self) -> Option<UnboundedReceiver<String>> {
        self.failure_rx
            .lock()
            .expect("failure channel mutex poisoned")
            .take()
    }

    fn capture_failed(reason: String) -> BridgeError {
        BridgeError::RecordingFailed { reason }
    }
}

impl AudioRecorder for CpalRecorder {
    async fn start(&self) -> Result<(), BridgeError> {
        let mut slot = self.stream.lock().expect("stream mutex poisoned");
        if slot.is_some() {
            return Err(Self::capture_failed("capture already active".to_string()));
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Self::capture_failed("no input device available".to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        // Prefer a native mono config at the requested rate; otherwise fall
        // back to the device default and decimate by an integer factor.
        let target = cpal::SampleRate(self.preferred_rate);
        let desired = device.supported_input_configs().ok().and_then(|mut configs| {
            configs
                .find(|c| {
                    c.channels() == 1
                        && c.min_sample_rate() <= target
                        && c.max_sample_rate() >= target
                        && c.sample_format() == cpal::SampleFormat::F32
                })
                .map(|c| c.with_sample_rate(target))
        });

        let (config, decimation) = match desired {
            Some(supported) => (supported.config(), 1u32),
            None => {
                let default = device.default_input_config().map_err(|e| {
                    Self::capture_failed(format!("no usable input config: {e}"))
                })?;
                let native_rate = default.sample_rate().0;
                let decimation = (native_rate / self.preferred_rate).max(1);
                (default.config(), decimation)
            }
        };

        let channels = config.channels as usize;
        let effective_rate = config.sample_rate.0 / decimation;
        self.effective_rate.store(effective_rate, Ordering::SeqCst);

        self.buffer.lock().expect("sample buffer poisoned").clear();
        let buffer = Arc::clone(&self.buffer);
        let failure_tx = self.failure_tx.clone();
        let mut frame_index: u32 = 0;

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mut samples = match buffer.lock() {
                        Ok(guard) => guard,
                        Err(_) => return,
                    };
                    for frame in data.chunks(channels) {
                        if frame_index % decimation == 0 {
                            let mono = frame.iter().sum::<f32>() / channels as f32;
                            samples.push(mono);
                        }
                        frame_index = frame_index.wrapping_add(1);
                    }
                },
                move |err| {
                    let _ = failure_tx.send(err.to_string());
                },
                None,
            )
            .map_err(|e| Self::capture_failed(format!("failed to open input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| Self::capture_failed(format!("failed to start input stream: {e}")))?;

        *slot = Some(SendStream(stream));
        tracing::info!(
            device = %device_name,
            channels,
            sample_rate = config.sample_rate.0,
            effective_rate,
            "Capture started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<Option<PathBuf>, BridgeError> {
        let stream = self.stream.lock().expect("stream mutex poisoned").take();
        if stream.is_none() {
            return Ok(None);
        }
        // Dropping the stream stops the device callbacks.
        drop(stream);

        let samples = std::mem::take(&mut *self.buffer.lock().expect("sample buffer poisoned"));
        if samples.is_empty() {
            tracing::warn!("Capture stopped with no samples");
            return Ok(None);
        }

        let rate = self.effective_rate.load(Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("sotto-recording-{}.wav", Uuid::new_v4()));
        write_wav(&path, rate, &samples)?;

        tracing::info!(
            path = %path.display(),
            samples = samples.len(),
            sample_rate = rate,
            "Capture artifact written"
        );
        Ok(Some(path))
    }

    fn set_playback(&self, enabled: bool) {
        // Capture has no monitoring path; the flag is recorded for the
        // output side.
        self.playback.store(enabled, Ordering::SeqCst);
        tracing::debug!(enabled, "Playback flag set");
    }
}

/// Write mono f32 samples as a 16-bit PCM WAV file.
fn write_wav(path: &PathBuf, sample_rate: u32, samples: &[f32]) -> Result<(), BridgeError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| CpalRecorder::capture_failed(format!("failed to create artifact: {e}")))?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(value)
            .map_err(|e| CpalRecorder::capture_failed(format!("failed to write artifact: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| CpalRecorder::capture_failed(format!("failed to finalize artifact: {e}")))?;
    Ok(())
}
