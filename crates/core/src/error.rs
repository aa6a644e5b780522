//! Error types for the record stream
//!
//! This module defines the single error type used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! # Categories
//!
//! | Category | Variants | Description |
//! |----------|----------|-------------|
//! | Validation | `InvalidArgument` | Bad input, raised before any engine access |
//! | Not Found | `RecordNotFound`, `StreamNotFound` | Governed by a caller-selected strategy |
//! | Conflict | `StreamAlreadyExists`, `RecordAlreadyExists`, `InvalidTransition` | State conflicts |
//! | Coordination | `MutexTimeout` | Claim mutex could not be acquired in time |
//! | System | `Serialization`, `Engine`, `Config`, `UnexpectedOutput` | Infrastructure errors |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handling::HandlingStatus;

/// Result type alias for stream operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Error types for the record stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum StreamError {
    /// Input failed validation (blank string, unknown strategy, bad tag, ...)
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the input
        reason: String,
    },

    /// No record matched and the caller asked for an error in that case
    #[error("record not found: {reason}")]
    RecordNotFound {
        /// Description of the query that came back empty
        reason: String,
    },

    /// The stream's storage does not exist on a locator
    #[error("stream not found on locator {locator}")]
    StreamNotFound {
        /// Locator that was queried
        locator: String,
    },

    /// Stream creation found existing storage on a locator
    #[error("stream already exists on locator {locator}")]
    StreamAlreadyExists {
        /// Locator that already holds the stream
        locator: String,
    },

    /// A throw-if-found write strategy encountered a matching record
    #[error("record already exists: {reason}")]
    RecordAlreadyExists {
        /// Description of the matching record
        reason: String,
    },

    /// A handling status change is not allowed from the current status
    #[error(
        "invalid handling transition for record {internal_record_id} concern '{concern}': {from} -> {to}"
    )]
    InvalidTransition {
        /// Record whose status was being changed
        internal_record_id: u64,
        /// Concern the status belongs to
        concern: String,
        /// Current status
        from: HandlingStatus,
        /// Requested status
        to: HandlingStatus,
    },

    /// The distributed mutex could not be acquired before the timeout
    #[error("timed out acquiring mutex for {scope}")]
    MutexTimeout {
        /// Display form of the mutex scope
        scope: String,
    },

    /// Payload or identifier could not be (de)serialized
    #[error("serialization error: {reason}")]
    Serialization {
        /// Codec error message
        reason: String,
    },

    /// Failure surfaced by the backing engine, propagated unchanged
    #[error("engine error: {reason}")]
    Engine {
        /// Engine error message
        reason: String,
    },

    /// A configuration file could not be read or written
    #[error("configuration error: {reason}")]
    Config {
        /// What went wrong
        reason: String,
    },

    /// The backing engine answered an operation with the wrong output variant
    #[error("unexpected output for {operation}")]
    UnexpectedOutput {
        /// Name of the operation
        operation: String,
    },
}

impl StreamError {
    /// Create an `InvalidArgument` error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        StreamError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a `RecordNotFound` error
    pub fn record_not_found(reason: impl Into<String>) -> Self {
        StreamError::RecordNotFound {
            reason: reason.into(),
        }
    }

    /// Create a `RecordAlreadyExists` error
    pub fn record_already_exists(reason: impl Into<String>) -> Self {
        StreamError::RecordAlreadyExists {
            reason: reason.into(),
        }
    }

    /// Create a `Serialization` error
    pub fn serialization(reason: impl Into<String>) -> Self {
        StreamError::Serialization {
            reason: reason.into(),
        }
    }

    /// Create an `Engine` error
    pub fn engine(reason: impl Into<String>) -> Self {
        StreamError::Engine {
            reason: reason.into(),
        }
    }

    /// Create a `Config` error
    pub fn config(reason: impl Into<String>) -> Self {
        StreamError::Config {
            reason: reason.into(),
        }
    }

    /// Create an `UnexpectedOutput` error
    pub fn unexpected_output(operation: impl Into<String>) -> Self {
        StreamError::UnexpectedOutput {
            operation: operation.into(),
        }
    }

    /// True for input validation failures
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, StreamError::InvalidArgument { .. })
    }

    /// True for record or stream not-found failures
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StreamError::RecordNotFound { .. } | StreamError::StreamNotFound { .. }
        )
    }
}

/// Fail with `InvalidArgument` when `value` is empty or whitespace only.
pub fn require_non_blank(value: &str, what: &str) -> StreamResult<()> {
    if value.trim().is_empty() {
        return Err(StreamError::invalid_argument(format!(
            "{} must not be blank",
            what
        )));
    }
    Ok(())
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StreamError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StreamError::serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StreamError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StreamError::serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_argument() {
        let err = StreamError::invalid_argument("concern must not be blank");
        let msg = err.to_string();
        assert!(msg.contains("invalid argument"));
        assert!(msg.contains("concern must not be blank"));
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_error_display_transition() {
        let err = StreamError::InvalidTransition {
            internal_record_id: 7,
            concern: "export".to_string(),
            from: HandlingStatus::Completed,
            to: HandlingStatus::Running,
        };
        let msg = err.to_string();
        assert!(msg.contains("record 7"));
        assert!(msg.contains("export"));
        assert!(msg.contains("Completed -> Running"));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(StreamError::record_not_found("id 1").is_not_found());
        assert!(StreamError::StreamNotFound {
            locator: "p0".into()
        }
        .is_not_found());
        assert!(!StreamError::engine("disk full").is_not_found());
    }

    #[test]
    fn test_require_non_blank() {
        assert!(require_non_blank("export", "concern").is_ok());
        assert!(require_non_blank("", "concern").is_err());
        let err = require_non_blank("   ", "details").unwrap_err();
        assert!(err.to_string().contains("details must not be blank"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let result: StreamResult<u64> = serde_json::from_str::<u64>("not a number").map_err(Into::into);
        assert!(matches!(result, Err(StreamError::Serialization { .. })));
    }

    #[test]
    fn test_error_from_msgpack() {
        let invalid = vec![0xc1u8];
        let result: StreamResult<String> = rmp_serde::from_slice::<String>(&invalid).map_err(Into::into);
        assert!(matches!(result, Err(StreamError::Serialization { .. })));
    }
}
