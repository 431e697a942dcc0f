// HTTP API routes: player join, state query, health, metrics.

pub mod ws;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::auth::Validator;
use crate::engine::game::Game;
use crate::metrics;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub game: Game,
    pub auth: AuthMode,
}

#[derive(Clone)]
pub enum AuthMode {
    /// No token validation; player ids come from the `X-Debug-Player`
    /// header (HTTP) or the `playerId` query parameter (WebSocket).
    Insecure,
    Cognito(Arc<Validator>),
}

type ApiError = (StatusCode, Json<Value>);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/player", get(join_player))
        .route("/api/state", get(current_state))
        .route("/ws", get(ws::ws_game))
        .route("/metrics", get(serve_metrics))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "spheres-backend" }))
}

async fn serve_metrics() -> String {
    metrics::gather_metrics()
}

/// Join the caller's player (idempotent) and return it.
async fn join_player(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let player_id = authenticate(&state, &headers).await?;

    let player = state
        .game
        .add_player(&player_id)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))?;

    metrics::PLAYERS.set(state.game.player_count() as i64);

    Ok(Json(json!(player)))
}

/// Current world snapshot.
async fn current_state(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authenticate(&state, &headers).await?;
    Ok(Json(json!(state.game.current_snapshot())))
}

/// Resolve the caller's player id from the request headers.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    match &state.auth {
        AuthMode::Insecure => {
            let id = headers
                .get("x-debug-player")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if id.is_empty() {
                Ok(debug_player_id())
            } else {
                Ok(id.to_string())
            }
        }
        AuthMode::Cognito(validator) => {
            let value = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| unauthorized("missing Authorization header"))?;

            let mut parts = value.splitn(2, ' ');
            let scheme = parts.next().unwrap_or_default();
            let token = parts.next().unwrap_or_default();
            if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
                return Err(unauthorized("invalid Authorization header"));
            }

            let claims = validator
                .validate(token)
                .await
                .map_err(|e| unauthorized(&e.to_string()))?;
            Ok(claims.sub)
        }
    }
}

/// Fallback player id for unauthenticated debug traffic.
pub(crate) fn debug_player_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("debug-{nanos}")
}

fn unauthorized(message: &str) -> ApiError {
    error_response(StatusCode::UNAUTHORIZED, message)
}

fn error_response(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}
