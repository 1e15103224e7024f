use std::fmt;

/// Main error type for the ride-request-notifier service
#[derive(Debug)]
pub enum NotifierError {
    // Network and HTTP client errors
    NetworkTimeout,
    NetworkConnection(String),
    HttpClient(String),
    InvalidUrl(String),

    // Serialization and parsing errors
    JsonParsing(String),
    JsonSerialization(String),

    // External service errors
    Authentication(String),

    // Configuration and setup errors
    Io(String),
    MissingEnvironmentVariable(String),
    InvalidConfiguration(String),
}

impl fmt::Display for NotifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifierError::NetworkTimeout => write!(f, "Network request timed out"),
            NotifierError::NetworkConnection(msg) => write!(f, "Network connection error: {}", msg),
            NotifierError::HttpClient(msg) => write!(f, "HTTP client error: {}", msg),
            NotifierError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),

            NotifierError::JsonParsing(msg) => write!(f, "JSON parsing error: {}", msg),
            NotifierError::JsonSerialization(msg) => write!(f, "JSON serialization error: {}", msg),

            NotifierError::Authentication(msg) => write!(f, "Authentication error: {}", msg),

            NotifierError::Io(msg) => write!(f, "I/O error: {}", msg),
            NotifierError::MissingEnvironmentVariable(var) => {
                write!(f, "Missing environment variable: {}", var)
            }
            NotifierError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for NotifierError {}

// Convenience type alias for Results
pub type NotifierResult<T> = Result<T, NotifierError>;

// Conversion implementations for common error types
impl From<reqwest::Error> for NotifierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotifierError::NetworkTimeout
        } else if err.is_connect() {
            NotifierError::NetworkConnection(err.to_string())
        } else {
            NotifierError::HttpClient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for NotifierError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_eof() {
            NotifierError::JsonParsing(err.to_string())
        } else {
            NotifierError::JsonSerialization(err.to_string())
        }
    }
}

impl From<std::io::Error> for NotifierError {
    fn from(err: std::io::Error) -> Self {
        NotifierError::Io(err.to_string())
    }
}

// Helper functions for creating common errors
impl NotifierError {
    pub fn missing_env(var: impl Into<String>) -> Self {
        NotifierError::MissingEnvironmentVariable(var.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        NotifierError::InvalidConfiguration(msg.into())
    }
}
