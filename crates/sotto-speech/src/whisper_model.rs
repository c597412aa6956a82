//! Real whisper.cpp backend via whisper-rs.
//!
//! Loads GGML model files and transcribes WAV artifacts. Model contexts are
//! addressed by [`ModelHandle`]; loading and inference run on blocking
//! threads so the engine's executor stays responsive.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use hound::SampleFormat;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use sotto_core::error::BridgeError;
use sotto_core::state::ModelHandle;

use crate::SpeechModel;

/// Speech backend backed by whisper.cpp.
pub struct WhisperModel {
    contexts: Mutex<HashMap<ModelHandle, Arc<WhisperContext>>>,
    language: String,
}

impl WhisperModel {
    /// Create an empty backend. `language` is a Whisper language code, or
    /// "auto" for detection.
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            language: language.into(),
        }
    }

    fn context(&self, handle: ModelHandle) -> Option<Arc<WhisperContext>> {
        self.contexts
            .lock()
            .expect("context map poisoned")
            .get(&handle)
            .cloned()
    }
}

impl SpeechModel for WhisperModel {
    async fn load(&self, path: &Path) -> Result<ModelHandle, BridgeError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BridgeError::ModelLoad("model path is not valid UTF-8".to_string()))?
            .to_string();

        tracing::info!(model = %path_str, "Loading Whisper model");
        let ctx = tokio::task::spawn_blocking(move || {
            WhisperContext::new_with_params(&path_str, WhisperContextParameters::default())
        })
        .await
        .map_err(|e| BridgeError::ModelLoad(format!("model load task failed: {e}")))?
        .map_err(|e| BridgeError::ModelLoad(format!("failed to load Whisper model: {e}")))?;

        let handle = ModelHandle::new();
        self.contexts
            .lock()
            .expect("context map poisoned")
            .insert(handle, Arc::new(ctx));
        tracing::info!(%handle, "Whisper model loaded");
        Ok(handle)
    }

    async fn transcribe(
        &self,
        audio: &Path,
        handle: ModelHandle,
    ) -> Result<String, BridgeError> {
        let ctx = self.context(handle).ok_or(BridgeError::ModelNotLoaded)?;
        let samples = read_wav_mono_16k(audio)?;
        tracing::debug!(%handle, samples = samples.len(), "Running Whisper inference");

        let language = self.language.clone();
        let result = tokio::task::spawn_blocking(move || run_inference(&ctx, &samples, &language))
            .await
            .map_err(|e| BridgeError::Transcription(format!("inference task failed: {e}")))?;
        let text = result?;

        tracing::debug!(%handle, chars = text.len(), "Whisper inference finished");
        Ok(text)
    }

    async fn unload(&self, handle: ModelHandle) {
        if self
            .contexts
            .lock()
            .expect("context map poisoned")
            .remove(&handle)
            .is_some()
        {
            tracing::info!(%handle, "Whisper model unloaded");
        }
    }
}

fn run_inference(
    ctx: &WhisperContext,
    samples: &[f32],
    language: &str,
) -> Result<String, BridgeError> {
    let mut state = ctx
        .create_state()
        .map_err(|e| BridgeError::Transcription(format!("failed to create Whisper state: {e}")))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    let lang = if language == "auto" {
        None
    } else {
        Some(language)
    };
    params.set_language(lang);
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    state
        .full(params, samples)
        .map_err(|e| BridgeError::Transcription(format!("inference failed: {e}")))?;

    let num_segments = state
        .full_n_segments()
        .map_err(|e| BridgeError::Transcription(format!("failed to read segments: {e}")))?;

    let mut text = String::new();
    for i in 0..num_segments {
        let segment = state
            .full_get_segment_text(i)
            .map_err(|e| BridgeError::Transcription(format!("failed to read segment {i}: {e}")))?;
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(segment.trim());
    }
    Ok(text)
}

/// Decode a WAV artifact to 16 kHz mono f32, the input Whisper expects.
fn read_wav_mono_16k(path: &Path) -> Result<Vec<f32>, BridgeError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| BridgeError::Transcription(format!("failed to open audio artifact: {e}")))?;
    let spec = reader.spec();

    let raw: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| BridgeError::Transcription(format!("failed to decode artifact: {e}")))?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<Result<_, _>>()
            .map_err(|e| BridgeError::Transcription(format!("failed to decode artifact: {e}")))?,
        (format, bits) => {
            return Err(BridgeError::Transcription(format!(
                "unsupported WAV format: {format:?} {bits}-bit"
            )));
        }
    };

    let channels = spec.channels as usize;
    let mono: Vec<f32> = if channels <= 1 {
        raw
    } else {
        raw.chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(resample(&mono, spec.sample_rate, 16_000))
}

/// Linear resampler; good enough for speech input.
fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (input.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < input.len() {
            input[idx] as f64 * (1.0 - frac) + input[idx + 1] as f64 * frac
        } else {
            input[idx] as f64
        };
        output.push(sample as f32);
    }

    output
}
