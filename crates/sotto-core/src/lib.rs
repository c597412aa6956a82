//! Core types for the Sotto speech-to-text bridge.
//!
//! Holds everything the other crates share: the engine state model, the
//! bridge event vocabulary and its single-subscriber broadcaster, the
//! client-visible message log, the error taxonomy, and configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod log;
pub mod state;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use events::{BridgeEvent, EventBroadcaster};
pub use log::{MessageLog, MessageLogEntry};
pub use state::{Activity, EngineState, ModelHandle, ModelState, PermissionState};
