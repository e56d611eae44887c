//! Error types for configuration loading and HTTP transport.
//!
//! [`ConfigError`] covers everything that can go wrong before a run starts.
//! [`TransportError`] covers failures where no HTTP response was received;
//! a response with a non-2xx status is *not* a transport error.

/// Errors that occur while loading or obtaining tester configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure in a config file.
    #[error("Failed to parse config TOML: {source}")]
    Parse {
        #[from]
        source: toml::de::Error,
    },

    /// The config file could not be read from disk.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        source: std::io::Error,
        path: String,
    },

    /// A required value was left empty at an interactive prompt.
    #[error("{field} is required")]
    MissingInput { field: &'static str },

    /// Reading from the terminal failed.
    #[error("Failed to read {field} from terminal: {source}")]
    Prompt {
        field: &'static str,
        source: std::io::Error,
    },

    /// An environment variable held a value of the wrong shape.
    #[error("Invalid value for {var}: {message}")]
    InvalidEnv { var: String, message: String },
}

/// Failure to obtain an HTTP response from the backend.
///
/// Each variant is reported with its own wording so the summary can tell a
/// network problem apart from a rejection by the server.
#[derive(Debug, thiserror::Error, Clone)]
pub enum TransportError {
    /// The request exceeded the per-call timeout.
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// DNS resolution, TCP connect or TLS handshake failed.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The request could not be built or the response could not be read.
    #[error("Request error: {message}")]
    Request { message: String },
}

impl TransportError {
    /// Returns the error category as a static string for logs and reports.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Connection { .. } => "connection",
            Self::Request { .. } => "request",
        }
    }

    /// Classify a [`reqwest::Error`] into the matching [`TransportError`] variant.
    pub fn classify_reqwest(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { secs: timeout_secs }
        } else if err.is_connect() {
            Self::Connection {
                message: err.to_string(),
            }
        } else {
            Self::Request {
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_timeout() {
        assert_eq!(TransportError::Timeout { secs: 10 }.category(), "timeout");
    }

    #[test]
    fn test_category_connection() {
        let err = TransportError::Connection {
            message: "connection refused".to_string(),
        };
        assert_eq!(err.category(), "connection");
    }

    #[test]
    fn test_timeout_display_mentions_seconds() {
        let err = TransportError::Timeout { secs: 10 };
        assert_eq!(err.to_string(), "Request timed out after 10s");
    }

    #[test]
    fn test_missing_input_display() {
        let err = ConfigError::MissingInput {
            field: "Backend URL",
        };
        assert_eq!(err.to_string(), "Backend URL is required");
    }

    #[test]
    fn test_parse_error_from_toml() {
        let parse_err = toml::from_str::<toml::Value>("base_url = ").unwrap_err();
        let err: ConfigError = parse_err.into();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
