//! Shared handler state.

use sotto_engine::Engine;

/// State handed to every route handler via axum's `State` extractor.
///
/// Generic over the engine's backends so the same router serves mock and
/// native builds.
pub struct AppState<M, R> {
    pub engine: Engine<M, R>,
    /// The localhost port the server binds; also pinned in the CORS origin
    /// list.
    pub port: u16,
}

impl<M, R> Clone for AppState<M, R> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            port: self.port,
        }
    }
}

impl<M, R> AppState<M, R> {
    pub fn new(engine: Engine<M, R>, port: u16) -> Self {
        Self { engine, port }
    }
}
