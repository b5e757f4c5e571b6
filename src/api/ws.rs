// WebSocket handler: one task per client, pumping frames between the socket and the session.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::engine::protocol::ClientMessage;
use crate::engine::server::Outgoing;
use crate::metrics;

use super::AppState;

/// WebSocket upgrade handler for game sessions.
pub async fn ws_game(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// The browser client opens its socket on `/`, so the root upgrades when asked to and
/// serves the client page otherwise.
pub async fn ws_or_index(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if let Ok(ws) = ws {
        return ws
            .on_upgrade(move |socket| handle_ws(socket, state))
            .into_response();
    }
    match tokio::fs::read_to_string(state.static_dir.join("index.html")).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::warn!("Client page unavailable: {e}");
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}

async fn handle_ws(mut socket: WebSocket, state: AppState) {
    let (conn, mut outgoing) = match state.game_server.connect() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Rejecting WebSocket client: {e}");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    tracing::info!(conn, "WebSocket client connected");

    loop {
        tokio::select! {
            // Frames queued by the session
            queued = outgoing.recv() => {
                match queued {
                    Some(Outgoing::Frame(frame)) => {
                        if socket.send(Message::Text(String::from(&*frame).into())).await.is_err() {
                            // Client disconnected
                            break;
                        }
                    }
                    Some(Outgoing::Close) => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                    None => break,
                }
            }
            // Client intents
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => match ClientMessage::parse(text.as_str()) {
                        Ok(msg) => {
                            tracing::debug!(conn, kind = msg.kind(), "Client message");
                            if state.game_server.intent(conn, msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            metrics::PROTOCOL_ERRORS_TOTAL.inc();
                            tracing::warn!(conn, "Discarding malformed message: {e}");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(conn, "WebSocket receive error: {e}");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary and ping/pong frames carry no intents
                    }
                }
            }
        }
    }

    tracing::info!(conn, "WebSocket client disconnected");
    let _ = state.game_server.disconnect(conn);
}
