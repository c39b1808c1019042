use thiserror::Error;

/// Errors that can occur when interacting with the document source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network or connection error.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limited by the source")]
    RateLimited,

    /// API error from the source.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Document not found.
    #[error("Not found: {id}")]
    NotFound { id: String },

    /// Document exists but its content type or shape is not supported.
    #[error("Unsupported document: {message}")]
    Unsupported { message: String },

    /// Malformed document or envelope data.
    #[error("Invalid document data: {message}")]
    Invalid { message: String },
}

impl SourceError {
    /// Create a network error.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an API error.
    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[inline]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an unsupported document error.
    #[inline]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Create an invalid data error.
    #[inline]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Check whether this error is transient and worth retrying without
    /// counting it against the sync attempt budget.
    ///
    /// Network failures, rate limiting and throttling/server-side statuses
    /// (403, 429, 5xx) are expected to clear on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimited => true,
            Self::Api { status, .. } => *status == 403 || *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which is useful for errors
/// that include multi-line details. This provides a concise message for
/// progress reporting and poison records.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_is_transient() {
        assert!(SourceError::network("connection refused").is_transient());
        assert!(SourceError::RateLimited.is_transient());
    }

    #[test]
    fn test_throttling_statuses_are_transient() {
        assert!(SourceError::api(403, "forbidden").is_transient());
        assert!(SourceError::api(429, "slow down").is_transient());
        assert!(SourceError::api(502, "bad gateway").is_transient());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert!(!SourceError::api(400, "bad request").is_transient());
        assert!(!SourceError::not_found("x").is_transient());
        assert!(!SourceError::unsupported("dictamen").is_transient());
        assert!(!SourceError::invalid("truncated").is_transient());
    }

    #[test]
    fn test_short_error_message_takes_first_line() {
        let err = SourceError::invalid("first line\nsecond line");
        assert_eq!(
            short_error_message(&err),
            "Invalid document data: first line"
        );
    }
}
