use thiserror::Error;

/// Why a generation request produced no text.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("could not connect to {endpoint}: {message}")]
    Unreachable { endpoint: String, message: String },

    #[error("request to {endpoint} timed out after {secs}s")]
    Timeout { endpoint: String, secs: u64 },

    #[error("{endpoint} answered HTTP {status}: {body}")]
    Status { endpoint: String, status: u16, body: String },

    #[error("unexpected response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl GenerationError {
    /// The backend URL the failure refers to, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Unreachable { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Malformed { endpoint, .. } => Some(endpoint),
            Self::Client(_) => None,
        }
    }
}
