//! Shared server state and the HTTP router

use crate::abuse::RateLimiter;
use crate::config::ServerConfig;
use crate::room::Registry;
use crate::types::Question;
use crate::{api, ws};
use axum::{routing::get, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub struct AppState {
    pub registry: Arc<Registry>,
    pub chat_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: &ServerConfig, questions: Vec<Question>) -> Self {
        Self {
            registry: Registry::new(questions, config.game.clone()),
            chat_limiter: RateLimiter::new(config.chat_rate_limit, config.chat_rate_window),
        }
    }
}

/// All routes: the WebSocket endpoint, the game lookup API, and static files
pub fn build_router(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/games/{code}", get(api::get_game))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
