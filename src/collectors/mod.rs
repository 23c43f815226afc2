//! Remote data collectors for control-plane and tracing signals

pub mod jaeger;
pub mod kubectl;

pub use jaeger::{JaegerClient, RawSpan, RawSpanRef, RawTag, RawTrace, TraceQuery};
pub use kubectl::{KubectlClient, CONTROL_PLANE_COMPONENTS};

use reqwest::StatusCode;
use std::time::Duration;

use crate::error::TriageError;

/// Delay before the single retry of a transient failure.
pub(crate) const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Failure of one request attempt. Gateway errors and connection-level
/// failures are worth a retry; everything else is terminal.
pub(crate) struct CallFailure {
    pub error: TriageError,
    pub transient: bool,
}

impl CallFailure {
    pub fn terminal(error: TriageError) -> Self {
        Self {
            error,
            transient: false,
        }
    }

    pub fn from_status(target: &str, status: StatusCode, body: String) -> Self {
        Self {
            error: TriageError::Transport(format!("{target} returned status {status}: {body}")),
            transient: matches!(status.as_u16(), 502 | 503 | 504),
        }
    }
}

impl From<reqwest::Error> for CallFailure {
    fn from(err: reqwest::Error) -> Self {
        Self {
            error: err.into(),
            transient: true,
        }
    }
}
