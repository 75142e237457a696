//! Error types for the event-stream client.
//!
//! Every failure the stream client can observe is expressed as a [`StreamError`].
//! None of them escape the driver task as a panic: transport failures feed the
//! reconnect state machine, malformed frames are dropped, and server error frames
//! are surfaced as non-fatal messages.
//!
//! ## Error Categories
//!
//! - **Transport Errors**: connection refused, dropped, or closed by the server
//! - **Protocol Errors**: frames that cannot be decoded
//! - **Server Errors**: explicit `error` frames sent over a healthy connection
//! - **Fatal Errors**: reconnection attempts exhausted
//! - **Setup Errors**: invalid endpoints or configuration
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use facility_stream::StreamError;
//!
//! let error = StreamError::transport("connection reset by peer");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias for stream operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Main error type for stream operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Malformed frame: {details}")]
    Protocol {
        details: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Stream error reported by server: {message}")]
    Server { message: String },

    #[error("Reconnection attempts exhausted after {attempts} retries")]
    RetriesExhausted { attempts: u32 },

    #[error("Invalid stream endpoint '{url}': {reason}")]
    Endpoint { url: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Stream driver is no longer running")]
    DriverStopped,
}

impl StreamError {
    /// Returns whether the reconnect machinery may recover from this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Transport { .. } => true,
            StreamError::Protocol { .. } => false,
            StreamError::Server { .. } => false,
            StreamError::RetriesExhausted { .. } => false,
            StreamError::Endpoint { .. } => false,
            StreamError::Config { .. } => false,
            StreamError::DriverStopped => false,
        }
    }

    /// Returns whether this error ends the session without further automatic attempts.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StreamError::RetriesExhausted { .. } | StreamError::DriverStopped)
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            StreamError::Transport { .. } => vec![
                "Check that the stream gateway is reachable",
                "Verify the configured base URL",
                "Wait for the automatic reconnect to complete",
            ],
            StreamError::Protocol { .. } => vec![
                "Check gateway and client versions are compatible",
                "Inspect the raw frame at debug log level",
            ],
            StreamError::Server { .. } => vec![
                "Inspect the gateway logs for the reported failure",
                "The connection stays open; no action is required to keep receiving",
            ],
            StreamError::RetriesExhausted { .. } => vec![
                "Call connect() to start a fresh session",
                "Increase max_retries or max_retry_delay_ms",
                "Check gateway availability",
            ],
            StreamError::Endpoint { .. } => vec![
                "Use an absolute http(s) base URL",
                "Check the FACILITY_STREAM_BASE_URL variable",
            ],
            StreamError::Config { .. } => vec![
                "Check configuration values against their documented ranges",
                "Fall back to StreamConfig::default()",
            ],
            StreamError::DriverStopped => vec![
                "Create a new feed; the previous one was dropped or shut down",
                "Make sure the tokio runtime is still running",
            ],
        }
    }

    /// Helper constructor for transport errors.
    pub fn transport(reason: impl Into<String>) -> Self {
        StreamError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        StreamError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for malformed frames.
    pub fn protocol(details: impl Into<String>) -> Self {
        StreamError::Protocol { details: details.into(), source: None }
    }

    /// Helper constructor for server-reported stream errors.
    pub fn server(message: impl Into<String>) -> Self {
        StreamError::Server { message: message.into() }
    }

    /// Helper constructor for invalid endpoints.
    pub fn endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamError::Endpoint { url: url.into(), reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        StreamError::Config { reason: reason.into() }
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Protocol { details: err.to_string(), source: Some(err) }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        let reason = match err.status() {
            Some(status) => format!("HTTP {status}"),
            None if err.is_connect() => "connection refused".to_string(),
            None if err.is_timeout() => "connection timed out".to_string(),
            None => "request failed".to_string(),
        };
        StreamError::Transport { reason, source: Some(Box::new(err)) }
    }
}

impl From<url::ParseError> for StreamError {
    fn from(err: url::ParseError) -> Self {
        StreamError::Endpoint { url: "<unknown>".to_string(), reason: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            reason in ".*",
            message in ".*",
            attempts in 0u32..100u32,
          ) {
            let transport = StreamError::transport(reason.clone());
            let server = StreamError::server(message.clone());
            let exhausted = StreamError::RetriesExhausted { attempts };

            prop_assert!(transport.to_string().contains(&reason));
            prop_assert!(server.to_string().contains(&message));
            prop_assert!(exhausted.to_string().contains(&attempts.to_string()));
          }

          #[test]
          fn source_chain_is_preserved(base_message in "[a-z ]{1,40}") {
            let inner: Box<dyn std::error::Error + Send + Sync> =
              Box::new(std::io::Error::other(base_message.clone()));
            let error = StreamError::transport_with_source("stream dropped", inner);

            let source = std::error::Error::source(&error);
            prop_assert!(source.is_some());
            prop_assert_eq!(source.map(|s| s.to_string()), Some(base_message));
          }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<StreamError>();

        let error = StreamError::transport("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn retry_and_fatal_classification() {
        assert!(StreamError::transport("reset").is_retryable());
        assert!(!StreamError::transport("reset").is_fatal());
        assert!(!StreamError::server("kafka down").is_retryable());
        assert!(!StreamError::protocol("bad json").is_retryable());
        assert!(StreamError::RetriesExhausted { attempts: 10 }.is_fatal());
        assert!(StreamError::DriverStopped.is_fatal());

        let exhausted = StreamError::RetriesExhausted { attempts: 3 };
        assert!(!exhausted.recovery_suggestions().is_empty());
        for suggestion in exhausted.recovery_suggestions() {
            assert!(suggestion.len() > 5);
        }
    }

    #[test]
    fn json_errors_become_protocol_errors() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let converted: StreamError = err.into();
        match converted {
            StreamError::Protocol { source, .. } => assert!(source.is_some()),
            other => panic!("Expected Protocol error, got {other:?}"),
        }
    }

    #[test]
    fn url_errors_become_endpoint_errors() {
        let err = url::Url::parse("not a url").unwrap_err();
        let converted: StreamError = err.into();
        assert!(matches!(converted, StreamError::Endpoint { .. }));
    }
}
