//! Application state
//!
//! Shared state across all handlers.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use interview_engine_config::Settings;
use interview_engine_pipeline::PerfMonitor;

use crate::session::SessionManager;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration wrapped in RwLock for reload support
    pub config: Arc<RwLock<Settings>>,
    /// Session manager
    pub sessions: Arc<SessionManager>,
    /// Cross-session performance monitor
    pub perf: Arc<PerfMonitor>,
}

impl AppState {
    pub fn new(config: Settings) -> Self {
        let perf = Arc::new(PerfMonitor::new(
            Duration::from_secs(config.engine.perf_summary_interval_secs),
            config.engine.perf_summary_every_units,
        ));
        let sessions = Arc::new(SessionManager::new(&config, perf.clone()));
        Self {
            config: Arc::new(RwLock::new(config)),
            sessions,
            perf,
        }
    }
}
