// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{connection, progress},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Websocket sessions live under `/ws/{mode}`.
/// * Question media is served from the configured directory under `/media`.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let ws_routes = Router::new()
        .route("/{mode}", get(connection::ws_anonymous))
        .route("/{mode}/{client_id}", get(connection::ws_identified));

    let api_routes = Router::new()
        .route("/clients/{client_id}/progress", get(progress::get_progress));

    Router::new()
        .route("/", get(progress::health))
        .nest("/ws", ws_routes)
        .nest("/api", api_routes)
        .nest_service("/media", ServeDir::new(&state.config.media_dir))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
