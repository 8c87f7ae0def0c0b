//! Error types for reader operations.
//!
//! The taxonomy distinguishes failures that end a session (connection),
//! failures reported by the device itself (command), failures caught before
//! any device I/O (validation), and use of a closed session. Transient
//! conditions such as "no tag yet" or "inventory already finished" are not
//! errors at all; they are recoverable [`StatusOutcome`](crate::StatusOutcome)
//! values absorbed by the inventory controller.

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a CF591 reader.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Opening the device failed and the session never became usable.
    #[error("connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    /// The device rejected a command with a hard fault status.
    ///
    /// Carries the masked 32-bit status code for diagnostics.
    #[error("{command} rejected by device (status {status:#010X})")]
    Command { command: &'static str, status: u32 },

    /// A payload returned by the device could not be decoded.
    #[error("malformed {what} payload: {message}")]
    Payload { what: &'static str, message: String },

    /// A parameter was rejected before any device I/O took place.
    #[error("invalid parameter: {message}")]
    Validation { message: String },

    /// An operation was attempted on a session that is not open.
    #[error("session is not open")]
    NotOpen,
}

impl Error {
    /// Create a new connection error.
    pub fn connection(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a new command error from a masked status code.
    pub fn command(command: &'static str, status: u32) -> Self {
        Self::Command { command, status }
    }

    /// Create a new malformed-payload error.
    pub fn payload(what: &'static str, message: impl Into<String>) -> Self {
        Self::Payload {
            what,
            message: message.into(),
        }
    }

    /// Create a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// The raw device status code, if this error carries one.
    pub fn status(&self) -> Option<u32> {
        match self {
            Self::Command { status, .. } => Some(*status),
            _ => None,
        }
    }
}
