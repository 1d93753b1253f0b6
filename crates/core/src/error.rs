//! Error types for the analysis engine

use thiserror::Error;

/// Engine errors
///
/// Per-unit failures (`Decode`, `ModelUnavailable`, `Inference`, `Timeout`)
/// are always recovered locally by the analyzer: the unit is dropped or a
/// degraded default result is produced. `SessionNotFound` and `Transport`
/// surface at the session boundary, where the unit is dropped or the
/// session is closed.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed inbound unit. The unit is dropped; no session impact.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A detector backend is not loaded or not usable.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(&'static str),

    /// A detector backend failed on a valid unit.
    #[error("Inference error: {0}")]
    Inference(String),

    /// An adapter call exceeded its bound. Treated as an inference failure.
    #[error("Adapter call timed out")]
    Timeout,

    /// Unit arrived for an unknown or closed session.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Broadcaster failed to push an envelope to the client.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Stable machine-readable code for the outbound `error` envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Decode(_) => "decode_error",
            Error::ModelUnavailable(_) => "model_unavailable",
            Error::Inference(_) => "inference_error",
            Error::Timeout => "timeout",
            Error::SessionNotFound(_) => "session_not_found",
            Error::Transport(_) => "transport_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Decode("bad".into()).code(), "decode_error");
        assert_eq!(Error::Timeout.code(), "timeout");
        assert_eq!(
            Error::SessionNotFound("x".into()).code(),
            "session_not_found"
        );
    }
}
