//! Sotto application binary - composition root.
//!
//! Ties the crates together into the bridge executable:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Select backends (whisper/cpal when the features are enabled,
//!    mocks otherwise)
//! 4. Build the engine, optionally preloading a model
//! 5. Start the axum bridge server on localhost

mod cli;

use clap::Parser;

use sotto_audio::AudioRecorder;
use sotto_bridge::{start_server, AppState};
use sotto_core::config::BridgeConfig;
use sotto_engine::Engine;
use sotto_speech::SpeechModel;

use cli::CliArgs;

#[cfg(feature = "whisper")]
fn speech_backend(config: &BridgeConfig) -> sotto_speech::whisper_model::WhisperModel {
    tracing::info!(language = %config.model.language, "Using the whisper speech backend");
    sotto_speech::whisper_model::WhisperModel::new(&config.model.language)
}

#[cfg(not(feature = "whisper"))]
fn speech_backend(_config: &BridgeConfig) -> sotto_speech::MockSpeechModel {
    tracing::warn!("Built without the whisper feature, using the mock speech backend");
    sotto_speech::MockSpeechModel::new()
}

#[cfg(feature = "capture")]
fn audio_backend(config: &BridgeConfig) -> sotto_audio::cpal_recorder::CpalRecorder {
    tracing::info!(
        sample_rate = config.audio.sample_rate,
        "Using the cpal capture backend"
    );
    sotto_audio::cpal_recorder::CpalRecorder::new(config.audio.sample_rate)
}

#[cfg(not(feature = "capture"))]
fn audio_backend(_config: &BridgeConfig) -> sotto_audio::MockRecorder {
    tracing::warn!("Built without the capture feature, using the mock recorder");
    sotto_audio::MockRecorder::new()
}

/// Preload the configured model, then serve until shutdown.
async fn run<M, R>(
    engine: Engine<M, R>,
    config: &BridgeConfig,
    args: &CliArgs,
) -> Result<(), Box<dyn std::error::Error>>
where
    M: SpeechModel + 'static,
    R: AudioRecorder + 'static,
{
    engine.enable_playback(config.audio.playback);

    if let Some(path) = args.resolve_model(config.model.path.as_deref()) {
        match engine
            .initialize_model(&path, config.model.force_reload)
            .await
        {
            Ok(_) => tracing::info!(path = %path, "Model preloaded"),
            Err(e) => tracing::warn!(path = %path, error = %e, "Model preload failed"),
        }
    }

    let port = args.resolve_port(config.server.port);
    let state = AppState::new(engine, port);
    start_server(state).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config before tracing: the default log level can come from the file.
    let config_file = args.resolve_config_path();
    let config = BridgeConfig::load_or_default(&config_file);

    // Priority: --log-level > RUST_LOG > config file.
    let filter = match args.resolve_log_level() {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Sotto v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    let speech = speech_backend(&config);
    let recorder = audio_backend(&config);

    // The cpal backend reports mid-capture stream errors on a channel;
    // claim it before the recorder moves into the engine.
    #[cfg(feature = "capture")]
    let capture_failures = recorder.take_failures();

    let engine =
        Engine::new(speech, recorder).with_transcribe_on_stop(config.audio.transcribe_on_stop);

    #[cfg(feature = "capture")]
    if let Some(mut failures) = capture_failures {
        let watcher = engine.clone();
        tokio::spawn(async move {
            while let Some(message) = failures.recv().await {
                watcher.on_capture_failure(&message);
            }
        });
    }

    run(engine, &config, &args).await
}
