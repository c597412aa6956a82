//! The Sotto engine: the stateful core behind the command bridge.
//!
//! One [`Engine`] per process owns the whole engine state. The command
//! dispatcher maps each bridge command onto exactly one engine operation;
//! outcomes flow back either through the operation's `Result` or through
//! events on the engine's broadcaster.
//!
//! The implementation is split by concern: model management in `model`,
//! the recording lifecycle in `recording`, transcription in
//! `transcription`. The shared state, permission gate, queries, and
//! `reset` live in `engine`.

pub mod engine;
mod model;
mod recording;
mod transcription;

pub use engine::Engine;
