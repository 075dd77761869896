use thiserror::Error;

/// Type alias for Result with PriorityError
pub type Result<T> = std::result::Result<T, PriorityError>;

/// Error types for the sign-in, fetch, rank and persist flows
#[derive(Error, Debug)]
pub enum PriorityError {
    /// Identity broker denied or failed a token request
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Network-level failure (connection refused, TLS, malformed response body)
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Remote endpoint answered with a non-success status
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// A remote call did not answer within the configured timeout
    #[error("{operation} timed out after {secs} seconds")]
    Timeout { operation: String, secs: u64 },

    /// Mail search returned no message identifiers
    #[error("No messages found")]
    NoResults,

    /// Ranking service returned an error envelope or an invalid permutation
    #[error("Ranking error: {0}")]
    RankParseError(String),

    /// Provider message could not be normalized
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// An operation needed a session token but none is stored
    #[error("Not signed in")]
    NotSignedIn,

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Persisted session state could not be read or written
    #[error("State error: {0}")]
    StateError(String),
}

impl PriorityError {
    /// Whether this error came from the network or from a remote HTTP status
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PriorityError::TransportError(_)
                | PriorityError::HttpStatus { .. }
                | PriorityError::Timeout { .. }
        )
    }
}

impl From<google_gmail1::Error> for PriorityError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                PriorityError::HttpStatus {
                    status: status.as_u16(),
                    message: status.canonical_reason().unwrap_or("Unknown").to_string(),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => PriorityError::HttpStatus {
                status: 400,
                message: err.to_string(),
            },
            google_gmail1::Error::HttpError(ref err) => {
                PriorityError::TransportError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => PriorityError::TransportError(err.to_string()),
            _ => PriorityError::TransportError(error.to_string()),
        }
    }
}

impl From<hyper_util::client::legacy::Error> for PriorityError {
    fn from(error: hyper_util::client::legacy::Error) -> Self {
        PriorityError::TransportError(format!("Connection error: {}", error))
    }
}
