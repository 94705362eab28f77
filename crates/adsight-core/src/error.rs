use thiserror::Error;

/// Top-level infrastructure error type for adsight.
///
/// Subsystem crates define their own error types and implement
/// `From<AdsightError>` (or the reverse) so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdsightError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for AdsightError {
    fn from(err: toml::de::Error) -> Self {
        AdsightError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AdsightError {
    fn from(err: toml::ser::Error) -> Self {
        AdsightError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AdsightError {
    fn from(err: serde_json::Error) -> Self {
        AdsightError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for adsight operations.
pub type Result<T> = std::result::Result<T, AdsightError>;

/// Stable, caller-visible failure codes.
///
/// Each code carries the HTTP status used when it is returned as a JSON
/// error envelope and a pre-approved message that is safe to show users.
/// Internal error text never leaves the process; only these messages do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InternalServerError,
    InvalidInput,
    Unauthorized,
    InvalidToken,
    ChatProcessingError,
    SqlGenerationFailed,
    QueryFailed,
    TurnTimedOut,
}

impl ErrorCode {
    /// Machine-readable name, e.g. `"QUERY_FAILED"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::ChatProcessingError => "CHAT_PROCESSING_ERROR",
            ErrorCode::SqlGenerationFailed => "SQL_GENERATION_FAILED",
            ErrorCode::QueryFailed => "QUERY_FAILED",
            ErrorCode::TurnTimedOut => "TURN_TIMED_OUT",
        }
    }

    /// HTTP status code for this failure.
    pub fn status(&self) -> u16 {
        match self {
            ErrorCode::InvalidInput => 400,
            ErrorCode::Unauthorized | ErrorCode::InvalidToken => 401,
            ErrorCode::TurnTimedOut => 504,
            ErrorCode::InternalServerError
            | ErrorCode::ChatProcessingError
            | ErrorCode::SqlGenerationFailed
            | ErrorCode::QueryFailed => 500,
        }
    }

    /// User-facing message.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::InternalServerError => "An error occurred while processing your request.",
            ErrorCode::InvalidInput => "The request input is invalid.",
            ErrorCode::Unauthorized => "Authentication is required.",
            ErrorCode::InvalidToken => "The access token is invalid.",
            ErrorCode::ChatProcessingError => "An error occurred while generating the answer.",
            ErrorCode::SqlGenerationFailed => "An error occurred while preparing the data query.",
            ErrorCode::QueryFailed => "An error occurred while retrieving the data.",
            ErrorCode::TurnTimedOut => "The request took too long and was stopped.",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
