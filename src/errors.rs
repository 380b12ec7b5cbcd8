//! Error types for the paypal-nvp library.
//!
//! This module defines every error that can occur while building requests,
//! talking to the NVP endpoint, or interpreting its answers.

use thiserror::Error;

/// Main error type for PayPal NVP operations.
#[derive(Error, Debug)]
pub enum PayPalError {
    /// An argument was rejected (unknown request method, bad amount, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A header handle does not name a header of the request
    #[error("Index out of bounds: {0}")]
    OutOfBounds(usize),

    /// The request has no host to send to
    #[error("No hostname supplied")]
    MissingHost,

    /// The server URI could not be parsed or is unusable
    #[error("Malformed server URI supplied: {0}")]
    MalformedUri(String),

    /// A socket (or the TLS session on top of it) could not be established
    #[error("Cannot open socket to {address}: {source}")]
    Connection {
        /// `host:port` that was dialed
        address: String,
        /// Underlying failure; `raw_os_error()` carries the errno when there is one
        #[source]
        source: std::io::Error,
    },

    /// TLS configuration or session error
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// A connect, read or write timeout elapsed
    #[error("Timeout exceeded")]
    TimeoutExceeded,

    /// I/O error on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The API answered with a non-success status code
    #[error("Cannot read data from API: {status_line}")]
    Upstream {
        /// Numeric status code
        code: u16,
        /// Status line as received
        status_line: String,
    },

    /// The response could not be parsed as HTTP
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The response exceeded the configured size limit
    #[error("Response exceeds {0} bytes")]
    ResponseTooLarge(usize),

    /// The API responded but a field the call depends on is missing
    #[error("Cannot decode API response: {0}")]
    Decode(String),

    /// The API rejected the call (ACK was not a success value)
    #[error("{method} failed with ACK={ack}: {message}")]
    ApiFailure {
        /// NVP method that was called
        method: String,
        /// ACK value returned by the API
        ack: String,
        /// First error message returned, if any
        message: String,
    },

    /// No checkout token was supplied for validation
    #[error("No payment information found in request")]
    MissingToken,

    /// Error raised by the reqwest-backed transport
    #[cfg(feature = "reqwest-proxy")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error during JSON deserialization of a configuration
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for PayPal NVP operations.
pub type Result<T> = std::result::Result<T, PayPalError>;

impl From<url::ParseError> for PayPalError {
    fn from(err: url::ParseError) -> Self {
        PayPalError::MalformedUri(err.to_string())
    }
}

impl PayPalError {
    /// Maps an I/O error from an established connection, turning timeouts
    /// into [`PayPalError::TimeoutExceeded`].
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                PayPalError::TimeoutExceeded
            }
            _ => PayPalError::Io(err),
        }
    }

    /// Returns `true` when the error came from the remote API rather than
    /// from the local side or the network.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            PayPalError::Upstream { .. } | PayPalError::ApiFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PayPalError::InvalidArgument("Wrong request type supplied: DELETE".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid argument: Wrong request type supplied: DELETE"
        );
        assert_eq!(PayPalError::MissingHost.to_string(), "No hostname supplied");
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: PayPalError = json_err.into();
        assert!(matches!(err, PayPalError::JsonError(_)));

        let url_err = url::Url::parse("no scheme here").unwrap_err();
        let err: PayPalError = url_err.into();
        assert!(matches!(err, PayPalError::MalformedUri(_)));
    }

    #[test]
    fn test_timeout_mapping() {
        let err = PayPalError::from_io(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(matches!(err, PayPalError::TimeoutExceeded));

        let err = PayPalError::from_io(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(matches!(err, PayPalError::Io(_)));
    }

    #[test]
    fn test_connection_error_keeps_errno() {
        let err = PayPalError::Connection {
            address: "localhost:1".to_string(),
            source: std::io::Error::from_raw_os_error(111),
        };
        match &err {
            PayPalError::Connection { source, .. } => assert_eq!(source.raw_os_error(), Some(111)),
            _ => unreachable!(),
        }
        assert!(err.to_string().starts_with("Cannot open socket to localhost:1"));
    }

    #[test]
    fn test_is_upstream() {
        let err = PayPalError::Upstream {
            code: 404,
            status_line: "HTTP/1.1 404 Not Found".to_string(),
        };
        assert!(err.is_upstream());
        assert!(!PayPalError::MissingHost.is_upstream());
    }
}
