// HTTP routes: the game WebSocket, status and metrics endpoints, and the static client.

pub mod ws;

use std::path::{Path, PathBuf};

use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::engine::server::GameServer;
use crate::metrics;

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub game_server: GameServer,
    /// Directory holding the client bundle.
    pub static_dir: PathBuf,
}

// ── Error helper ──────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(game_server: GameServer, static_dir: &Path) -> Router {
    let state = AppState {
        game_server,
        static_dir: static_dir.to_path_buf(),
    };

    Router::new()
        .route("/", get(ws::ws_or_index))
        .route("/health", get(health_check))
        .route("/api/status", get(game_status))
        .route("/metrics", get(get_metrics))
        // WebSocket
        .route("/ws", get(ws::ws_game))
        .with_state(state)
        // Everything else is the client bundle
        .fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
        .layer(CorsLayer::permissive())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "coinrush-backend" }))
}

async fn game_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.game_server.status().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            tracing::error!("Status query failed: {e}");
            json_error(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()).into_response()
        }
    }
}

async fn get_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}
