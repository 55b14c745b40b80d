//! Error types for shepherd
//!
//! The coordinator-facing error taxonomy lives in
//! [`CoordinatorError`](crate::coordinator::CoordinatorError); everything else
//! surfaces through [`ShepherdError`]. The core only reacts to the
//! *node-exists* and *no-node* variants; all other failures propagate to the
//! caller.

use crate::coordinator::CoordinatorError;
use thiserror::Error;

/// Result type alias for shepherd operations
pub type Result<T> = std::result::Result<T, ShepherdError>;

/// Errors surfaced by consumer group operations
#[derive(Debug, Error)]
pub enum ShepherdError {
    /// Coordinator failure (session loss, contention outside the handled
    /// cases, malformed paths).
    #[error("coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    /// Broker client failure (metadata fetch, partition stream).
    #[error("broker error: {0}")]
    Broker(String),

    /// The partition has no live leader; a consumer cannot be opened for it.
    #[error("no live leader for partition {partition} of topic {topic}")]
    NoLeader {
        /// Topic being consumed.
        topic: String,
        /// Partition without a leader.
        partition: i32,
    },

    /// Stored offset payload was non-empty but not decimal ASCII.
    #[error("invalid offset payload at {path}: {payload:?}")]
    InvalidOffset {
        /// Coordinator path holding the payload.
        path: String,
        /// The offending payload, lossily decoded.
        payload: String,
    },

    /// The group was closed; construct a new one to rejoin.
    #[error("consumer group is closed")]
    Closed,
}

impl ShepherdError {
    /// Convenience constructor for broker-side failures.
    pub fn broker(message: impl Into<String>) -> Self {
        ShepherdError::Broker(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_errors_convert() {
        let err: ShepherdError = CoordinatorError::NoNode("/consumers/g/ids".into()).into();
        assert!(matches!(
            err,
            ShepherdError::Coordinator(CoordinatorError::NoNode(_))
        ));
    }

    #[test]
    fn broker_constructor_formats() {
        let err = ShepherdError::broker("connection refused");
        assert_eq!(err.to_string(), "broker error: connection refused");
    }
}
