pub mod auth;
pub mod config;
pub mod database;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

pub use state::AppState;

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    // Public routes (no token)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route(
            "/ai/supported-languages",
            get(handlers::session::supported_languages_handler),
        );

    // Bearer token checked per handler through the AuthUser extractor
    let protected_routes = Router::new()
        .route("/ai/start-session", post(handlers::session::start_session_handler))
        .route("/ai/send-message", post(handlers::session::send_message_handler))
        .route("/ai/voice-message", post(handlers::session::voice_message_handler))
        .route(
            "/ai/session/{session_id}/messages",
            get(handlers::session::session_messages_handler),
        )
        .route(
            "/ai/session/{session_id}/end",
            post(handlers::session::end_session_handler),
        )
        .route("/ai/sessions", get(handlers::session::list_sessions_handler));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        // Voice uploads are the largest bodies
        .layer(DefaultBodyLimit::max(max_body_bytes))
}
