//! HTTP API endpoints.
//!
//! Lets the join page check a game code before opening a WebSocket.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::GameError;

/// Look up a running game.
///
/// GET /api/games/{code}
pub async fn get_game(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> Response {
    let summary = match state.registry.get(&code).await {
        Some(handle) => handle.summary().await,
        None => Err(GameError::RoomNotFound),
    };

    match summary {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            tracing::debug!("Game lookup for {} failed: {}", code, e);
            // A game that closed while we asked is gone as far as clients care
            (
                StatusCode::NOT_FOUND,
                Json(GameError::RoomNotFound.to_payload()),
            )
                .into_response()
        }
    }
}
