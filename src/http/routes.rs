//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::PlayerRecord;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::PlayerSummary;

/// Upper bound for plain HTTP requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - `*` or a comma-separated origin list in CLIENT_ORIGIN
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    let cors = if state.config.client_origin.trim() == "*" {
        cors.allow_origin(Any)
    } else {
        let allowed_origins: Vec<header::HeaderValue> = state
            .config
            .client_origin
            .split(',')
            .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
            .collect();
        cors.allow_origin(allowed_origins)
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/players", get(players_handler))
        .route("/players/:id", get(player_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    tick: u64,
    phase: &'static str,
    players: usize,
    connected: usize,
    scheduled_tasks: usize,
    pending_mutations: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.status.borrow().clone();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        tick: status.tick,
        phase: status.phase,
        players: state.players.len(),
        connected: state.connections.session_count(),
        scheduled_tasks: status.scheduled_tasks,
        pending_mutations: status.pending_mutations,
    })
}

// ============================================================================
// Player endpoints
// ============================================================================

fn summarize(player: &PlayerRecord) -> PlayerSummary {
    PlayerSummary {
        player_id: player.id(),
        name: player.name(),
        team: player.team().display_name().to_string(),
        alive: player.is_alive(),
        connected: player.is_connected(),
        kills: player.kills(),
        deaths: player.deaths(),
    }
}

async fn players_handler(State(state): State<AppState>) -> Json<Vec<PlayerSummary>> {
    let mut players: Vec<PlayerSummary> = state.players.all().iter().map(|p| summarize(p)).collect();
    players.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Json(players)
}

async fn player_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlayerSummary>, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::BadRequest(format!("Invalid player id: {id}")))?;
    state
        .players
        .get(&id)
        .map(|p| Json(summarize(&p)))
        .ok_or_else(|| AppError::NotFound(format!("Player {id}")))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::assemble;
    use crate::config::Config;
    use crate::game::Team;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn app() -> (AppState, Router) {
        let (state, _runtime) = assemble(Config::from_lookup(|_| None).unwrap()).unwrap();
        let router = build_router(state.clone());
        (state, router)
    }

    #[tokio::test]
    async fn health_reports_the_runtime_status() {
        let (_state, router) = app();
        let (status, body) = get_json(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["phase"], "waiting");
        assert_eq!(body["players"], 0);
    }

    #[tokio::test]
    async fn players_are_listed_by_name() {
        let (state, router) = app();
        state.players.get_or_create(Uuid::new_v4(), "zed").set_team(Team::Blue);
        state.players.get_or_create(Uuid::new_v4(), "Amy");

        let (status, body) = get_json(router, "/players").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["Amy", "zed"]);
        assert_eq!(body[1]["team"], "Blue");
    }

    #[tokio::test]
    async fn single_player_lookup() {
        let (state, router) = app();
        let id = Uuid::new_v4();
        state.players.get_or_create(id, "solo");

        let (status, body) = get_json(router.clone(), &format!("/players/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "solo");

        let (status, _) = get_json(router.clone(), &format!("/players/{}", Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get_json(router, "/players/nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }
}
