//! Server error types.

use thiserror::Error;

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured address could not be parsed or bound.
    #[error("bind error: {0}")]
    Bind(String),

    /// I/O error during server operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a bind error.
    pub fn bind(message: impl Into<String>) -> Self {
        Self::Bind(message.into())
    }
}

/// Why a request body could not be collected.
///
/// The dispatcher turns these into enveloped responses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BodyError {
    /// The body exceeds the configured limit.
    #[error("request body exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The client did not send the body in time.
    #[error("timed out reading request body")]
    Timeout,

    /// The connection failed while reading the body.
    #[error("failed to read request body: {0}")]
    Read(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ServerError::bind("address in use").to_string(),
            "bind error: address in use"
        );
        assert_eq!(
            BodyError::TooLarge { limit: 16 }.to_string(),
            "request body exceeds 16 bytes"
        );
    }
}
