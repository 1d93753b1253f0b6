//! WebSocket handler
//!
//! Real-time ingestion of video frames and audio chunks, and streaming of
//! analysis updates back to the client. One socket per session; the session
//! is closed when the socket disconnects.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    Json,
};
use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use interview_engine_core::{
    AggregatedMetrics, Error as CoreError, EventSink, Result as CoreResult,
};
use interview_engine_pipeline::{decode_audio, decode_video, PerfSummary};

use crate::broadcast::Broadcaster;
use crate::metrics::{record_decode_error, record_unit_ingested, record_ws_message};
use crate::session::Session;
use crate::state::AppState;
use crate::ServerError;

/// Inbound client messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One encoded video frame (base64, optionally a data URL)
    VideoFrame { data: String },
    /// One encoded PCM16 audio chunk (base64) with its duration
    AudioChunk { data: String, duration_ms: u64 },
    /// Session control command
    Command { command: CommandAction },
    /// Liveness probe
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    StartAnalysis,
    StopAnalysis,
    Reset,
}

/// Outbound server messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Fused behavioral metrics; metric groups sit at the envelope top level
    AnalysisUpdate {
        timestamp: f64,
        #[serde(flatten)]
        metrics: AggregatedMetrics,
    },
    /// Periodic per-session performance statistics
    PerformanceSummary {
        #[serde(flatten)]
        summary: PerfSummary,
    },
    /// Recoverable per-message error; the session stays open
    Error { code: String, message: String },
    /// Sent once on connect
    SessionInfo { session_id: String },
    Pong,
}

/// Event sink over the write half of a WebSocket
#[derive(Clone)]
pub struct WsEventSink {
    sender: Arc<tokio::sync::Mutex<SplitSink<WebSocket, Message>>>,
}

impl WsEventSink {
    pub fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sender: Arc::new(tokio::sync::Mutex::new(sender)),
        }
    }

    /// Serialize and send one server message.
    pub async fn send_message(&self, message: &ServerMessage) -> CoreResult<()> {
        let payload = serde_json::to_string(message)
            .map_err(|e| CoreError::Transport(format!("serialize failed: {}", e)))?;
        self.send(payload).await
    }
}

#[async_trait]
impl EventSink for WsEventSink {
    async fn send(&self, payload: String) -> CoreResult<()> {
        self.sender
            .lock()
            .await
            .send(Message::Text(payload))
            .await
            .map_err(|e| CoreError::Transport(format!("socket send failed: {}", e)))
    }
}

/// Create a new session (HTTP side of the handshake)
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, axum::http::StatusCode> {
    let settings = state.config.read().clone();
    let session = state
        .sessions
        .create(&settings)
        .map_err(axum::http::StatusCode::from)?;

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "ws_url": format!("/ws/{}", session.id),
    })))
}

/// WebSocket handler
pub struct WebSocketHandler;

impl WebSocketHandler {
    /// Handle WebSocket upgrade
    pub async fn handle(
        ws: WebSocketUpgrade,
        State(state): State<AppState>,
        Path(session_id): Path<String>,
    ) -> Result<Response, axum::http::StatusCode> {
        let session = state
            .sessions
            .get(&session_id)
            .ok_or(ServerError::Session(session_id.clone()))
            .map_err(axum::http::StatusCode::from)?;

        Ok(ws.on_upgrade(move |socket| Self::handle_socket(socket, session, state)))
    }

    /// Handle WebSocket connection
    async fn handle_socket(socket: WebSocket, session: Arc<Session>, state: AppState) {
        let (sender, mut receiver) = socket.split();
        let sink = WsEventSink::new(sender);

        if sink
            .send_message(&ServerMessage::SessionInfo {
                session_id: session.id.clone(),
            })
            .await
            .is_err()
        {
            tracing::warn!(session_id = %session.id, "Failed initial send, dropping connection");
            state.sessions.remove(&session.id);
            return;
        }

        // Outbound pump: pipeline events -> coalescing broadcaster -> socket
        let broadcaster = Broadcaster::new(&state.config.read().engine);
        let events = session.pipeline.subscribe();
        let outbound_sink: Arc<dyn EventSink> = Arc::new(sink.clone());
        let sessions_for_pump = state.sessions.clone();
        let session_id_for_pump = session.id.clone();
        let pump = tokio::spawn(async move {
            if let Err(e) = broadcaster.run(events, outbound_sink).await {
                tracing::warn!(
                    session_id = %session_id_for_pump,
                    error = %e,
                    "Outbound pump failed, closing session"
                );
                sessions_for_pump.remove(&session_id_for_pump);
            }
        });

        // Inbound loop
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    Self::handle_client_message(&text, &session, &state, &sink).await;
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(session_id = %session.id, "Client closed WebSocket");
                    break;
                }
                Ok(_) => {} // binary/ping/pong frames are not part of the protocol
                Err(e) => {
                    tracing::warn!(session_id = %session.id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }

        pump.abort();
        state.sessions.remove(&session.id);
    }

    async fn handle_client_message(
        text: &str,
        session: &Arc<Session>,
        state: &AppState,
        sink: &WsEventSink,
    ) {
        session.touch();

        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                record_ws_message("invalid");
                let _ = sink
                    .send_message(&ServerMessage::Error {
                        code: "invalid_message".to_string(),
                        message: format!("unrecognized message: {}", e),
                    })
                    .await;
                return;
            }
        };

        match message {
            ClientMessage::VideoFrame { data } => {
                record_ws_message("video_frame");
                if !session.is_analyzing() {
                    tracing::debug!(session_id = %session.id, "Dropping frame, analysis not started");
                    return;
                }
                if let Some(ring) = &session.debug_ring {
                    ring.push(data.clone());
                }
                let config = state.config.read().engine.clone();
                match decode_video(&data, &config) {
                    Ok(frame) => {
                        record_unit_ingested("video");
                        if session.pipeline.process_video(frame).is_err() {
                            Self::reject_late_unit(session, sink).await;
                        }
                    }
                    Err(e) => {
                        record_decode_error("video");
                        let _ = sink
                            .send_message(&ServerMessage::Error {
                                code: e.code().to_string(),
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }
            ClientMessage::AudioChunk { data, duration_ms } => {
                record_ws_message("audio_chunk");
                if !session.is_analyzing() {
                    tracing::debug!(session_id = %session.id, "Dropping chunk, analysis not started");
                    return;
                }
                let config = state.config.read().engine.clone();
                match decode_audio(&data, duration_ms, &config) {
                    Ok(chunk) => {
                        record_unit_ingested("audio");
                        if session.pipeline.process_audio(chunk).is_err() {
                            Self::reject_late_unit(session, sink).await;
                        }
                    }
                    Err(e) => {
                        record_decode_error("audio");
                        let _ = sink
                            .send_message(&ServerMessage::Error {
                                code: e.code().to_string(),
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }
            ClientMessage::Command { command } => {
                record_ws_message("command");
                match command {
                    CommandAction::StartAnalysis => {
                        session.set_analyzing(true);
                        tracing::info!(session_id = %session.id, "Analysis started");
                    }
                    CommandAction::StopAnalysis => {
                        session.set_analyzing(false);
                        tracing::info!(session_id = %session.id, "Analysis stopped");
                    }
                    CommandAction::Reset => {
                        session.pipeline.reset();
                        tracing::info!(session_id = %session.id, "Session state reset");
                    }
                }
            }
            ClientMessage::Ping => {
                record_ws_message("ping");
                let _ = sink.send_message(&ServerMessage::Pong).await;
            }
        }
    }

    /// A unit arrived after the session's pipeline stopped. The unit is
    /// dropped and the client is told the session is gone.
    async fn reject_late_unit(session: &Arc<Session>, sink: &WsEventSink) {
        let err = CoreError::SessionNotFound(session.id.clone());
        tracing::debug!(session_id = %session.id, "Pipeline stopped, unit dropped");
        let _ = sink
            .send_message(&ServerMessage::Error {
                code: err.code().to_string(),
                message: err.to_string(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let m: ClientMessage =
            serde_json::from_str(r#"{"type":"video_frame","data":"AAAA"}"#).unwrap();
        assert!(matches!(m, ClientMessage::VideoFrame { .. }));

        let m: ClientMessage =
            serde_json::from_str(r#"{"type":"audio_chunk","data":"AAAA","duration_ms":250}"#)
                .unwrap();
        match m {
            ClientMessage::AudioChunk { duration_ms, .. } => assert_eq!(duration_ms, 250),
            other => panic!("unexpected message: {:?}", other),
        }

        let m: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(m, ClientMessage::Ping));
    }

    #[test]
    fn test_command_envelope_field_name() {
        for (raw, expected) in [
            ("start_analysis", CommandAction::StartAnalysis),
            ("stop_analysis", CommandAction::StopAnalysis),
            ("reset", CommandAction::Reset),
        ] {
            let json = format!(r#"{{"type":"command","command":"{}"}}"#, raw);
            let m: ClientMessage = serde_json::from_str(&json).unwrap();
            match m {
                ClientMessage::Command { command } => assert_eq!(command, expected),
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }

    #[test]
    fn test_analysis_update_fields_at_top_level() {
        use interview_engine_pipeline::{aggregate, StateSnapshot};

        let json = serde_json::to_value(&ServerMessage::AnalysisUpdate {
            timestamp: 12.5,
            metrics: aggregate(&StateSnapshot::default()),
        })
        .unwrap();

        assert_eq!(json["type"], "analysis_update");
        assert_eq!(json["timestamp"], 12.5);
        assert!(json.get("metrics").is_none());
        assert!(json["micro_expressions"]["dominant_emotion"].is_string());
        assert!(json["body_language"]["eye_contact_ratio"].is_number());
        assert!(json["suggestions"].is_array());
    }

    #[test]
    fn test_performance_summary_fields_at_top_level() {
        use interview_engine_pipeline::{ModalitySummary, PerfRating, PerfSummary};

        let json = serde_json::to_value(&ServerMessage::PerformanceSummary {
            summary: PerfSummary {
                video: Some(ModalitySummary {
                    count: 30,
                    avg_ms: 8.0,
                    min_ms: 5.0,
                    max_ms: 12.0,
                    fps: Some(25.0),
                    real_time_ratio: None,
                    rating: PerfRating::Excellent,
                }),
                audio: None,
            },
        })
        .unwrap();

        assert_eq!(json["type"], "performance_summary");
        assert!(json.get("summary").is_none());
        assert_eq!(json["video"]["count"], 30);
    }

    #[test]
    fn test_server_message_wire_format() {
        let json = serde_json::to_value(&ServerMessage::SessionInfo {
            session_id: "abc".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "session_info");
        assert_eq!(json["session_id"], "abc");

        let json = serde_json::to_value(&ServerMessage::Error {
            code: "decode_error".to_string(),
            message: "bad frame".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "decode_error");

        let json = serde_json::to_value(&ServerMessage::Pong).unwrap();
        assert_eq!(json["type"], "pong");
    }

    #[test]
    fn test_unknown_message_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"bogus"}"#).is_err());
    }
}
