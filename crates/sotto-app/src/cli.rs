//! CLI argument definitions for the Sotto bridge.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Sotto — a speech-to-text engine bridge serving a UI client on localhost.
#[derive(Parser, Debug)]
#[command(name = "sotto", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Bridge server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Model file to preload at startup.
    #[arg(short = 'm', long = "model")]
    pub model: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SOTTO_CONFIG env var > platform default
    /// (~/.sotto/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SOTTO_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the server port.
    ///
    /// Priority: --port flag > SOTTO_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("SOTTO_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Resolve the model file to preload.
    ///
    /// Priority: --model flag > config file value. `None` means no preload;
    /// the client is expected to send `initializeModel`.
    pub fn resolve_model(&self, config_model: Option<&str>) -> Option<String> {
        if let Some(ref p) = self.model {
            return Some(p.to_string_lossy().to_string());
        }
        config_model.map(|s| s.to_string())
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > RUST_LOG > config file value.
    /// Returns `None` if not overridden on the command line.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".sotto").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".sotto").join("config.toml");
    }
    PathBuf::from("config.toml")
}
