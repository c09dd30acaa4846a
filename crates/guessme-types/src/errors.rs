use thiserror::Error;

pub type Result<T, E = GuessmeError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
///
/// `Api` and `Network` are the two predictor failure kinds. Their display text
/// is what a session stores as its user-facing error message.
#[derive(Debug, Error)]
pub enum GuessmeError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("capture error: {0}")]
    Capture(String),
    #[error("API error: {status} {reason}")]
    Api { status: u16, reason: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("identity error: {0}")]
    Identity(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GuessmeError {
    /// HTTP status carried by an API failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            GuessmeError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predictor_failures_render_user_messages() {
        let api = GuessmeError::Api {
            status: 404,
            reason: "Not Found".into(),
        };
        assert_eq!(api.to_string(), "API error: 404 Not Found");
        assert_eq!(api.status(), Some(404));

        let network = GuessmeError::Network("connection refused".into());
        assert_eq!(network.to_string(), "Network error: connection refused");
        assert_eq!(network.status(), None);
    }
}
