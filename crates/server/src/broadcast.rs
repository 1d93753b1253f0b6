//! Coalescing outbound broadcaster
//!
//! Forwards pipeline events to the client's event sink at a bounded rate.
//! Analysis updates coalesce: while the pacing interval has not elapsed,
//! a newer update overwrites the single pending slot and the stale one is
//! never sent. Performance summaries are infrequent and bypass pacing.
//!
//! A failing send is retried a bounded number of times with linear backoff;
//! exhausting the retries ends the run with an error so the caller can
//! close the session.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::RecvError};

use interview_engine_config::EngineConfig;
use interview_engine_core::EventSink;
use interview_engine_pipeline::PipelineEvent;

use crate::websocket::ServerMessage;
use crate::ServerError;

pub struct Broadcaster {
    min_emit_interval: Duration,
    retry_limit: u32,
    retry_backoff: Duration,
}

impl Broadcaster {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            min_emit_interval: Duration::from_millis(config.min_emit_interval_ms),
            retry_limit: config.send_retry_limit,
            retry_backoff: Duration::from_millis(config.send_retry_backoff_ms),
        }
    }

    /// Pump events until the pipeline's sender is dropped or a send fails
    /// past the retry budget.
    pub async fn run(
        &self,
        mut events: broadcast::Receiver<PipelineEvent>,
        sink: Arc<dyn EventSink>,
    ) -> Result<(), ServerError> {
        let mut pending: Option<String> = None;
        // Allow the first update out immediately
        let mut last_emit = Instant::now() - self.min_emit_interval;

        loop {
            if pending.is_some() {
                let deadline = last_emit + self.min_emit_interval;
                tokio::select! {
                    event = events.recv() => {
                        match event {
                            Ok(event) => {
                                self.absorb(event, &mut pending, &sink).await?;
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                tracing::debug!(skipped, "Broadcast receiver lagged, continuing with freshest events");
                            }
                            Err(RecvError::Closed) => {
                                // Flush the final pending update before ending
                                if let Some(payload) = pending.take() {
                                    self.send_with_retry(&sink, payload).await?;
                                }
                                return Ok(());
                            }
                        }
                    }
                    _ = tokio::time::sleep_until(deadline.into()) => {
                        if let Some(payload) = pending.take() {
                            self.send_with_retry(&sink, payload).await?;
                            last_emit = Instant::now();
                        }
                    }
                }
            } else {
                match events.recv().await {
                    Ok(event) => {
                        if let PipelineEvent::MetricsUpdate { .. } = &event {
                            // Fast path: interval already elapsed, emit now
                            if last_emit.elapsed() >= self.min_emit_interval {
                                let payload = serialize(event)?;
                                self.send_with_retry(&sink, payload).await?;
                                last_emit = Instant::now();
                                continue;
                            }
                        }
                        self.absorb(event, &mut pending, &sink).await?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Broadcast receiver lagged, continuing with freshest events");
                    }
                    Err(RecvError::Closed) => return Ok(()),
                }
            }
        }
    }

    /// Coalesce an analysis update into the pending slot, or pass a
    /// summary straight through.
    async fn absorb(
        &self,
        event: PipelineEvent,
        pending: &mut Option<String>,
        sink: &Arc<dyn EventSink>,
    ) -> Result<(), ServerError> {
        match event {
            PipelineEvent::MetricsUpdate { .. } => {
                *pending = Some(serialize(event)?);
                Ok(())
            }
            PipelineEvent::PerformanceSummary(_) => {
                let payload = serialize(event)?;
                self.send_with_retry(sink, payload).await
            }
        }
    }

    async fn send_with_retry(
        &self,
        sink: &Arc<dyn EventSink>,
        payload: String,
    ) -> Result<(), ServerError> {
        let mut attempt = 0u32;
        loop {
            match sink.send(payload.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retry_limit => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %e, "Outbound send failed, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => {
                    return Err(ServerError::WebSocket(format!(
                        "send failed after {} retries: {}",
                        self.retry_limit, e
                    )));
                }
            }
        }
    }
}

fn serialize(event: PipelineEvent) -> Result<String, ServerError> {
    let message = match event {
        PipelineEvent::MetricsUpdate { timestamp, metrics } => ServerMessage::AnalysisUpdate {
            timestamp,
            metrics,
        },
        PipelineEvent::PerformanceSummary(summary) => ServerMessage::PerformanceSummary { summary },
    };
    serde_json::to_string(&message)
        .map_err(|e| ServerError::Internal(format!("serialize failed: {}", e)))
}
