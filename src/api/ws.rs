// WebSocket snapshot streaming.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{debug_player_id, AppState, AuthMode};
use crate::engine::game::GameSnapshot;
use crate::engine::player::Player;
use crate::metrics;

/// Messages pushed to the client. A `welcome` carries the joined player and
/// the current world; every tick thereafter arrives as a `snapshot`.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WsMessage {
    Welcome {
        player: Player,
        snapshot: GameSnapshot,
    },
    Snapshot {
        snapshot: GameSnapshot,
    },
}

/// `GET /ws?token=...` (or `?playerId=...` in insecure mode). The caller is
/// authenticated before the upgrade completes.
pub async fn ws_game(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Response {
    let player_id = match authenticate_ws(&state, &params).await {
        Ok(id) => id,
        Err(message) => {
            debug!(%message, "rejected websocket upgrade");
            return (StatusCode::UNAUTHORIZED, message).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_ws(socket, state, player_id))
}

async fn authenticate_ws(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<String, String> {
    match &state.auth {
        AuthMode::Insecure => Ok(params
            .get("playerId")
            .filter(|id| !id.is_empty())
            .cloned()
            .unwrap_or_else(debug_player_id)),
        AuthMode::Cognito(validator) => {
            let token = params
                .get("token")
                .filter(|t| !t.is_empty())
                .ok_or_else(|| "missing token query parameter".to_string())?;
            let claims = validator.validate(token).await.map_err(|e| e.to_string())?;
            Ok(claims.sub)
        }
    }
}

async fn handle_ws(socket: WebSocket, state: AppState, player_id: String) {
    metrics::CONNECTED_WEBSOCKETS.inc();
    stream_snapshots(socket, state, &player_id).await;
    metrics::CONNECTED_WEBSOCKETS.dec();
    debug!(%player_id, "websocket closed");
}

async fn stream_snapshots(mut socket: WebSocket, state: AppState, player_id: &str) {
    let player = match state.game.add_player(player_id) {
        Ok(player) => player,
        Err(err) => {
            warn!(player_id, error = %err, "could not join player over websocket");
            let body = json!({ "error": err.to_string() }).to_string();
            let _ = socket.send(Message::Text(body.into())).await;
            return;
        }
    };
    metrics::PLAYERS.set(state.game.player_count() as i64);

    let welcome = WsMessage::Welcome {
        player,
        snapshot: state.game.current_snapshot(),
    };
    if send_json(&mut socket, &welcome).await.is_err() {
        return;
    }

    // A shallow buffer keeps a stalled client from queueing stale worlds;
    // missed ticks are superseded by the next one anyway.
    let (mut updates, _subscription) = state.game.subscribe(2);

    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Some(snapshot) => {
                        let msg = WsMessage::Snapshot { snapshot };
                        if send_json(&mut socket, &msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Clients only listen on this stream; ignore chatter.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    // _subscription drops here, removing this client from the hub.
}

async fn send_json(socket: &mut WebSocket, msg: &WsMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(body) => socket.send(Message::Text(body.into())).await,
        Err(err) => {
            warn!(error = %err, "failed to encode websocket message");
            Ok(())
        }
    }
}
