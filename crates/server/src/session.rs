//! Session management
//!
//! One `Session` per interviewee connection, owning that connection's
//! analysis pipeline. The `SessionManager` enforces the concurrent-session
//! ceiling and sweeps idle sessions in the background.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use interview_engine_config::Settings;
use interview_engine_core::RollingBuffer;
use interview_engine_pipeline::{AnalysisPipeline, PerfMonitor};

use crate::ServerError;

/// Bounded in-memory ring of recent raw frame payloads
///
/// Debugging aid only; holds encoded payload strings and never touches disk.
pub struct DebugRing {
    frames: Mutex<RollingBuffer<String>>,
}

impl DebugRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(RollingBuffer::new(capacity)),
        }
    }

    pub fn push(&self, payload: String) {
        self.frames.lock().push(payload);
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().len() == 0
    }
}

/// Session state
pub struct Session {
    /// Session ID
    pub id: String,
    /// Analysis pipeline for this connection
    pub pipeline: Arc<AnalysisPipeline>,
    /// Creation time
    pub created_at: Instant,
    /// Last activity
    pub last_activity: RwLock<Instant>,
    /// Whether the client has started analysis
    analyzing: RwLock<bool>,
    /// Is active
    active: RwLock<bool>,
    /// Optional raw-frame ring for debugging
    pub debug_ring: Option<DebugRing>,
}

impl Session {
    pub fn new(id: impl Into<String>, settings: &Settings, perf: Arc<PerfMonitor>) -> Self {
        let id = id.into();
        let pipeline = Arc::new(AnalysisPipeline::new(&id, &settings.engine, perf));
        let debug_ring = settings
            .engine
            .debug_ring_enabled
            .then(|| DebugRing::new(settings.engine.debug_ring_capacity));
        Self {
            pipeline,
            id,
            created_at: Instant::now(),
            last_activity: RwLock::new(Instant::now()),
            analyzing: RwLock::new(false),
            active: RwLock::new(true),
            debug_ring,
        }
    }

    /// Update last activity
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    /// Check if session is expired
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.read().elapsed() > timeout
    }

    pub fn set_analyzing(&self, on: bool) {
        *self.analyzing.write() = on;
    }

    pub fn is_analyzing(&self) -> bool {
        *self.analyzing.read()
    }

    /// Close session and stop its pipeline
    pub fn close(&self) {
        *self.active.write() = false;
        *self.analyzing.write() = false;
        self.pipeline.stop();
    }

    /// Is session active
    pub fn is_active(&self) -> bool {
        *self.active.read()
    }
}

/// Session manager
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    perf: Arc<PerfMonitor>,
    max_sessions: usize,
    session_timeout: Duration,
    cleanup_interval: Duration,
}

impl SessionManager {
    pub fn new(settings: &Settings, perf: Arc<PerfMonitor>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            perf,
            max_sessions: settings.server.max_sessions,
            session_timeout: Duration::from_secs(settings.server.session_idle_timeout_secs),
            cleanup_interval: Duration::from_secs(settings.server.cleanup_interval_secs),
        }
    }

    /// Start a background task that periodically sweeps idle sessions.
    ///
    /// Returns a shutdown sender that stops the sweep task.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let manager = Arc::clone(self);
        let interval = manager.cleanup_interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let before = manager.count();
                        manager.cleanup_expired();
                        let after = manager.count();
                        if before != after {
                            tracing::info!(
                                "Session cleanup: removed {} idle sessions ({} remaining)",
                                before - after,
                                after
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    /// Create a new session, shedding load when at the ceiling.
    pub fn create(&self, settings: &Settings) -> Result<Arc<Session>, ServerError> {
        let mut sessions = self.sessions.write();

        if sessions.len() >= self.max_sessions {
            // Reclaim idle slots before refusing
            self.cleanup_expired_internal(&mut sessions);

            if sessions.len() >= self.max_sessions {
                return Err(ServerError::Capacity);
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(&id, settings, self.perf.clone()));
        sessions.insert(id.clone(), session.clone());
        let active = sessions.len();
        drop(sessions);

        crate::metrics::record_session_created(active);
        tracing::info!(session_id = %id, active_sessions = active, "Created session");
        Ok(session)
    }

    /// Get a session by ID
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Remove a session, stopping its pipeline and detaching its
    /// per-session performance accumulators.
    pub fn remove(&self, id: &str) {
        let removed = self.sessions.write().remove(id);
        if let Some(session) = removed {
            session.close();
            self.perf.detach(id);
            let active = self.count();
            crate::metrics::record_session_closed(active);
            tracing::info!(session_id = %id, active_sessions = active, "Removed session");
        }
    }

    /// Get active session count
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Cleanup idle sessions
    pub fn cleanup_expired(&self) {
        let mut sessions = self.sessions.write();
        self.cleanup_expired_internal(&mut sessions);
    }

    fn cleanup_expired_internal(&self, sessions: &mut HashMap<String, Arc<Session>>) {
        let timeout = self.session_timeout;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.is_expired(timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if let Some(session) = sessions.remove(&id) {
                session.close();
                self.perf.detach(&id);
                tracing::info!(session_id = %id, "Idle session expired");
            }
        }
    }

    /// List all session IDs
    pub fn list(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }
}
