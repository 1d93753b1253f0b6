//! HTTP endpoints
//!
//! REST control surface for session lifecycle, health, and metrics.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::websocket::{create_session, WebSocketHandler};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session endpoints
        .route("/api/sessions", post(create_session))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id", delete(delete_session))
        // Process-wide performance statistics
        .route("/api/performance", get(global_performance))
        // Health check
        .route("/health", get(health_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        // WebSocket ingestion
        .route("/ws/:session_id", get(WebSocketHandler::handle))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Get session info
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let session = state
        .sessions
        .get(&id)
        .ok_or(crate::ServerError::Session(id.clone()))
        .map_err(StatusCode::from)?;
    let (video_count, _) = session.pipeline.state().video_counters();
    let (audio_count, _) = session.pipeline.state().audio_counters();

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "active": session.is_active(),
        "analyzing": session.is_analyzing(),
        "video_units": video_count,
        "audio_units": audio_count,
        "performance": session.pipeline.performance_snapshot(),
    })))
}

/// Delete session
async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.sessions.remove(&id);
    StatusCode::NO_CONTENT
}

/// List sessions
async fn list_sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.sessions.list();
    Json(serde_json::json!({
        "sessions": sessions,
        "count": sessions.len(),
    }))
}

/// Process-wide adapter latency statistics
async fn global_performance(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "global": state.perf.global_snapshot(),
        "active_sessions": state.sessions.count(),
    }))
}

/// Health check
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": state.sessions.count(),
    }))
}
