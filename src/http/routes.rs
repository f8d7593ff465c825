//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::GameId;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/play", get(play_handler))
        .route("/games/:id", get(game_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(state.config.client_origin.as_deref()))
        .with_state(state)
}

/// CORS for the listed origins (comma-separated), or any origin when unset
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match client_origin {
        Some(origins) => {
            let allowed_origins: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed_origins)
        }
        None => cors.allow_origin(Any),
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_games: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_games: state.registry.len(),
        active_players: state.registry.total_players(),
    })
}

// ============================================================================
// Game endpoints
// ============================================================================

#[derive(Serialize)]
struct PlayResponse {
    game_id: GameId,
}

/// Matchmaking lookup; the client then joins this id over the WebSocket
async fn play_handler(State(state): State<AppState>) -> Json<PlayResponse> {
    Json(PlayResponse {
        game_id: state.find_or_create_game(),
    })
}

#[derive(Serialize)]
struct GameResponse {
    game_id: GameId,
    players: usize,
    capacity: usize,
    tick: u64,
    projectiles: usize,
}

async fn game_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GameResponse>, AppError> {
    let entry = state
        .registry
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Game {} does not exist", id)))?;

    let (players, tick, projectiles) = {
        let game = entry.lock();
        (game.player_count(), game.tick(), game.projectile_count())
    };

    Ok(Json(GameResponse {
        game_id: entry.id.clone(),
        players,
        capacity: state.registry.capacity(),
        tick,
        projectiles,
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
