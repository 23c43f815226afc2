//! Error taxonomy for diagnostics collection and orchestration

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, TriageError>;

/// Errors surfaced by collectors, analyzers, and the orchestration pipeline
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unrecoverable: {0}")]
    Unrecoverable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TriageError {
    /// Transient transport failures are the only class worth a retry.
    pub fn is_transport(&self) -> bool {
        matches!(self, TriageError::Transport(_) | TriageError::Timeout(_))
    }
}

impl From<reqwest::Error> for TriageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TriageError::Timeout(err.to_string())
        } else {
            TriageError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(TriageError::Transport("conn refused".into()).is_transport());
        assert!(TriageError::Timeout("30s elapsed".into()).is_transport());
        assert!(!TriageError::Parse("bad line".into()).is_transport());
        assert!(!TriageError::Schema("missing field".into()).is_transport());
        assert!(!TriageError::Unrecoverable("all collectors down".into()).is_transport());
    }

    #[test]
    fn test_error_display() {
        let err = TriageError::InvalidTarget("agent 'db'".into());
        assert_eq!(err.to_string(), "Invalid target: agent 'db'");
    }

    #[test]
    fn test_json_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: TriageError = parse_err.into();
        assert!(matches!(err, TriageError::Json(_)));
    }
}
