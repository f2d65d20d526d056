//! Executor adapter error types.

/// Errors surfaced by the executor adapter.
///
/// Every variant carries a stable wire code (see [`ExecutorError::code`])
/// that settlement records in the job's failure detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// The bounded wait elapsed and the call was cancelled.
    #[error("executor call timed out after {seconds}s")]
    Timeout {
        /// The configured ceiling, in seconds.
        seconds: u64,
    },

    /// Connection or transfer failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// The executor answered with a non-success HTTP status.
    #[error("executor returned HTTP {status}")]
    Http {
        /// The HTTP status code.
        status: u16,
    },

    /// The response parsed but is missing the success/failure discriminator
    /// (or the fields the discriminator promises).
    #[error("invalid executor response: {0}")]
    InvalidResponse(String),

    /// A well-formed failure reported by the executor, passed through
    /// verbatim.
    #[error("executor failure: {code} - {message}")]
    Remote {
        /// The executor's error code.
        code: String,
        /// The executor's error message.
        message: String,
    },

    /// The envelope could not be serialized.
    #[error("envelope serialization error: {0}")]
    Serialization(String),
}

impl ExecutorError {
    /// Stable error code for settlement records and caller responses.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Transport(_) => "transport_error",
            Self::Http { .. } => "http_error",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Remote { code, .. } => code,
            Self::Serialization(_) => "serialization_error",
        }
    }
}
