//! Sotto bridge crate - the HTTP adapter over the engine.
//!
//! Exposes the engine's two channels on localhost: the request/response
//! command interface (`POST /command`) and the one-way event stream
//! (`GET /events`, SSE), plus a health snapshot and the permission-result
//! entry point for the platform collaborator.

pub mod command;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use command::{dispatch, CommandName, CommandRequest};
pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
