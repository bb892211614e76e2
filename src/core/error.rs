use std::io;
use thiserror::Error;

/// Longest diagnostic excerpt carried inside an error.
pub const DIAGNOSTIC_EXCERPT_CHARS: usize = 200;

/// Unified error type for the chat client
#[derive(Error, Debug)]
pub enum ChatError {
    /// Malformed command arguments
    #[error("Invalid value: {0}")]
    Validation(String),

    /// Missing or unusable configuration, raised before any network attempt
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-success HTTP status from a backend
    #[error("{}", http_message(*status, detail))]
    Http { status: u16, detail: String },

    /// The response parsed but carried no reply text
    #[error("Empty response from backend")]
    EmptyResponse,

    /// Connection, timeout and other transport failures
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// The in-flight request was cancelled by the user or by session teardown
    #[error("Request cancelled")]
    Cancelled,

    /// User input errors
    #[error("Input error: {0}")]
    Input(String),

    /// Code execution side-channel errors
    #[error("Execution error: {0}")]
    Execution(String),
}

impl ChatError {
    /// Builds an HTTP failure, trimming the body down to a short excerpt.
    pub fn http(status: u16, body: &str) -> Self {
        ChatError::Http {
            status,
            detail: crate::utils::text::truncate_chars(body.trim(), DIAGNOSTIC_EXCERPT_CHARS),
        }
    }

    /// True for the failures a backend round trip can produce.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            ChatError::Http { .. }
                | ChatError::EmptyResponse
                | ChatError::Network(_)
                | ChatError::Serialization(_)
        )
    }
}

fn http_message(status: u16, detail: &str) -> String {
    if detail.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, detail)
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ChatError::Network(format!("Connection failed: {}", err))
        } else if let Some(status) = err.status() {
            ChatError::http(status.as_u16(), &err.to_string())
        } else {
            ChatError::Network(format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yml::Error> for ChatError {
    fn from(err: serde_yml::Error) -> Self {
        ChatError::Serialization(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_truncates_long_bodies() {
        let body = "x".repeat(1000);
        match ChatError::http(502, &body) {
            ChatError::Http { status, detail } => {
                assert_eq!(status, 502);
                assert!(detail.chars().count() <= DIAGNOSTIC_EXCERPT_CHARS + 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn http_error_without_detail_shows_bare_status() {
        let err = ChatError::Http {
            status: 529,
            detail: String::new(),
        };
        assert_eq!(err.to_string(), "HTTP 529");
    }
}
