//! Error Handling
//!
//! Error types for the sync engine, covering the fault classes the protocol
//! distinguishes: transport faults, store query faults, directory faults,
//! trigger decode faults and delivery-queue misuse.
//!
//! Every fault in this subsystem is recoverable at the session boundary: the
//! controller logs it and returns to the idle state, abandoning whatever work
//! remains. [`SyncError::is_recoverable`] classifies which errors a caller
//! may treat as transient (retry on the next trigger) versus which indicate a
//! programming error on the caller's side.
//!
//! ## Example
//!
//! ```rust
//! use deskbridge_protocol::{SyncError, Result};
//!
//! fn decode_cursor(raw: &str) -> Result<i64> {
//!     raw.parse()
//!         .map_err(|_| SyncError::InvalidTrigger(format!("bad cursor: {raw}")))
//! }
//!
//! let err = decode_cursor("not-a-number").unwrap_err();
//! assert!(err.is_recoverable());
//! ```

use thiserror::Error;

use crate::channel::Channel;

/// Result type alias for sync engine operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur in the sync engine
#[derive(Error, Debug)]
pub enum SyncError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport write failed or the link dropped mid-transaction
    #[error("Transport error: {0}")]
    Transport(String),

    /// Transport is no longer connected
    #[error("Transport disconnected")]
    Disconnected,

    /// Message store query failed
    #[error("Store error: {0}")]
    Store(String),

    /// Contact directory lookup failed (a real fault, not "no such contact")
    #[error("Directory error: {0}")]
    Directory(String),

    /// Backing database error from a reference store
    #[error("Database error: {0}")]
    Database(String),

    /// Malformed inbound trigger payload
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    /// A transaction is already open on this channel
    #[error("Transaction already in flight on channel {0}")]
    TransactionInFlight(Channel),

    /// Operation not valid in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The per-device session worker is no longer running
    #[error("Session worker unavailable: {0}")]
    SessionUnavailable(String),
}

impl SyncError {
    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        SyncError::InvalidState(message.into())
    }

    /// Create a transport error with context
    pub fn transport<S: Into<String>>(message: S) -> Self {
        SyncError::Transport(message.into())
    }

    /// Check if this error is recoverable by waiting for the next trigger
    ///
    /// Recoverable errors are absorbed at the session boundary: the session
    /// returns to idle and the next inbound trigger starts fresh. The
    /// non-recoverable variants ([`SyncError::TransactionInFlight`],
    /// [`SyncError::InvalidState`]) signal caller misuse and fail fast.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SyncError::TransactionInFlight(_) | SyncError::InvalidState(_)
        )
    }

    /// Check if this error should abort an in-flight delivery transaction
    pub fn aborts_delivery(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::Disconnected | SyncError::Io(_)
        )
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(error: rusqlite::Error) -> Self {
        SyncError::Database(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::Store("sms store offline".to_string());
        assert_eq!(err.to_string(), "Store error: sms store offline");

        let err = SyncError::TransactionInFlight(Channel::MessageStream);
        assert_eq!(
            err.to_string(),
            "Transaction already in flight on channel deskbridge.stream.messages"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: SyncError = io_err.into();
        assert!(matches!(err, SyncError::Io(_)));
        assert!(err.aborts_delivery());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: SyncError = json_err.into();
        assert!(matches!(err, SyncError::Json(_)));
    }

    #[test]
    fn test_recoverability() {
        assert!(SyncError::Disconnected.is_recoverable());
        assert!(SyncError::Store("down".into()).is_recoverable());
        assert!(SyncError::Directory("down".into()).is_recoverable());
        assert!(SyncError::InvalidTrigger("garbage".into()).is_recoverable());

        assert!(!SyncError::TransactionInFlight(Channel::PresenceStream).is_recoverable());
        assert!(!SyncError::invalid_state("trigger while delivering").is_recoverable());
    }

    #[test]
    fn test_abort_classification() {
        assert!(SyncError::Disconnected.aborts_delivery());
        assert!(SyncError::transport("write failed").aborts_delivery());
        assert!(!SyncError::Store("down".into()).aborts_delivery());
        assert!(!SyncError::Directory("down".into()).aborts_delivery());
    }
}
