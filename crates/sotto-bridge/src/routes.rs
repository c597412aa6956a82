//! Router setup and server startup.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use sotto_audio::AudioRecorder;
use sotto_core::error::BridgeError;
use sotto_speech::SpeechModel;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router<M, R>(state: AppState<M, R>) -> Router
where
    M: SpeechModel + 'static,
    R: AudioRecorder + 'static,
{
    // CORS: the UI client is served from localhost on the bridge port.
    let port = state.port;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            format!("http://127.0.0.1:{port}")
                .parse::<HeaderValue>()
                .unwrap(),
            format!("http://localhost:{port}")
                .parse::<HeaderValue>()
                .unwrap(),
        ]))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health::<M, R>))
        .route(
            "/command",
            post(handlers::command::<M, R>).layer(DefaultBodyLimit::max(64 * 1024)),
        )
        .route(
            "/permission-result",
            post(handlers::permission_result::<M, R>),
        )
        .route("/events", get(handlers::events::<M, R>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server, bound to localhost on the state's port.
pub async fn start_server<M, R>(state: AppState<M, R>) -> Result<(), BridgeError>
where
    M: SpeechModel + 'static,
    R: AudioRecorder + 'static,
{
    let addr = format!("127.0.0.1:{}", state.port);
    let router = create_router(state);

    tracing::info!(%addr, "Starting bridge server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
