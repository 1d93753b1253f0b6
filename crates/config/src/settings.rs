//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Runtime environment enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation
    #[default]
    Development,
    /// Staging mode
    Staging,
    /// Production mode
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Analysis engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent sessions before load shedding
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle timeout in seconds before a session is closed automatically
    #[serde(default = "default_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,

    /// Interval in seconds between idle-session sweeps
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_sessions: default_max_sessions(),
            session_idle_timeout_secs: default_idle_timeout_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

/// Analysis engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rolling buffer capacity per modality
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Queued (not yet started) units per session per modality; beyond this
    /// the oldest queued unit is dropped
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Bound on each adapter call in milliseconds
    #[serde(default = "default_adapter_timeout_ms")]
    pub adapter_timeout_ms: u64,

    /// Maximum decoded video payload in bytes
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Maximum decoded audio payload in bytes
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,

    /// Assumed sample rate of inbound PCM audio
    #[serde(default = "default_sample_rate")]
    pub audio_sample_rate: u32,

    /// Minimum interval between outbound analysis updates, in milliseconds
    /// (newer metrics overwrite the pending slot, never queue)
    #[serde(default = "default_min_emit_interval_ms")]
    pub min_emit_interval_ms: u64,

    /// Emit a performance summary after this many seconds...
    #[serde(default = "default_perf_summary_secs")]
    pub perf_summary_interval_secs: u64,

    /// ...or after this many processed units, whichever first
    #[serde(default = "default_perf_summary_units")]
    pub perf_summary_every_units: u64,

    /// Bounded attempts for a failing outbound send before the session is
    /// closed
    #[serde(default = "default_send_retries")]
    pub send_retry_limit: u32,

    /// Base backoff between send retries, in milliseconds
    #[serde(default = "default_send_backoff_ms")]
    pub send_retry_backoff_ms: u64,

    /// Keep recent raw frame payloads in a bounded in-memory ring for
    /// debugging (off by default; never touches disk)
    #[serde(default)]
    pub debug_ring_enabled: bool,

    /// Debug ring capacity in frames
    #[serde(default = "default_debug_ring_capacity")]
    pub debug_ring_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            queue_depth: default_queue_depth(),
            adapter_timeout_ms: default_adapter_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
            max_chunk_bytes: default_max_chunk_bytes(),
            audio_sample_rate: default_sample_rate(),
            min_emit_interval_ms: default_min_emit_interval_ms(),
            perf_summary_interval_secs: default_perf_summary_secs(),
            perf_summary_every_units: default_perf_summary_units(),
            send_retry_limit: default_send_retries(),
            send_retry_backoff_ms: default_send_backoff_ms(),
            debug_ring_enabled: false,
            debug_ring_capacity: default_debug_ring_capacity(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Expose Prometheus metrics at /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_enabled: true,
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_max_sessions() -> usize {
    100
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_cleanup_interval_secs() -> u64 {
    30
}

fn default_buffer_capacity() -> usize {
    30
}

fn default_queue_depth() -> usize {
    2
}

fn default_adapter_timeout_ms() -> u64 {
    2000
}

fn default_max_frame_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_max_chunk_bytes() -> usize {
    1024 * 1024
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_min_emit_interval_ms() -> u64 {
    500
}

fn default_perf_summary_secs() -> u64 {
    30
}

fn default_perf_summary_units() -> u64 {
    100
}

fn default_send_retries() -> u32 {
    3
}

fn default_send_backoff_ms() -> u64 {
    100
}

fn default_debug_ring_capacity() -> usize {
    16
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Load settings from files and environment
///
/// Priority: env vars > config/{env}.yaml > config/default.yaml > defaults.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if Path::new("config/default.yaml").exists() {
        builder = builder.add_source(File::with_name("config/default"));
    }

    if let Some(env) = env {
        let env_path = format!("config/{}", env);
        if Path::new(&format!("{}.yaml", env_path)).exists() {
            builder = builder.add_source(File::with_name(&env_path));
        } else {
            tracing::warn!(env = %env, "Environment config file not found, skipping");
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("INTERVIEW_ENGINE")
            .separator("__")
            .try_parsing(true),
    );

    let settings: Settings = builder.build()?.try_deserialize()?;
    Ok(settings)
}
