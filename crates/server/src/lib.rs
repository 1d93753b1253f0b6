//! Interview Engine Server
//!
//! Provides the WebSocket ingestion endpoint and HTTP control surface for
//! the real-time multimodal analysis engine.

pub mod broadcast;
pub mod http;
pub mod metrics;
pub mod session;
pub mod state;
pub mod websocket;

pub use broadcast::Broadcaster;
pub use http::create_router;
pub use metrics::{
    init_metrics, record_decode_error, record_session_closed, record_session_created,
    record_unit_ingested, record_ws_message,
};
pub use session::{DebugRing, Session, SessionManager};
pub use state::AppState;
pub use websocket::{ClientMessage, CommandAction, ServerMessage, WebSocketHandler, WsEventSink};

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Session error: {0}")]
    Session(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Max sessions reached")]
    Capacity,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Session(_) => axum::http::StatusCode::NOT_FOUND,
            ServerError::WebSocket(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::Capacity => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
