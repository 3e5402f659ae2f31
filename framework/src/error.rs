//! Error types for the telemetry core

use std::time::Duration;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Telemetry core error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Device bus transaction failed or timed out
    #[error("Bus error: {0}")]
    Bus(String),

    /// Network credentials empty or malformed
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(&'static str),

    /// Bounded wait exceeded
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Transport rejected or failed a send
    #[error("Send failed: {0}")]
    SendFailure(String),

    /// Network attachment gave up after exhausting its retry budget
    #[error("Network attachment failed after {0} retries")]
    AttachFailed(u32),

    /// Serialized message does not fit the wire buffer
    #[error("Message too long: {len} bytes exceeds {capacity}-byte buffer")]
    MessageTooLong {
        /// Bytes the message needed
        len: usize,
        /// Buffer capacity
        capacity: usize,
    },

    /// Network collaborator rejected a configure/start/attach call
    #[error("Link error: {0}")]
    Link(String),
}

impl<E: core::fmt::Debug> From<icm20948::Error<E>> for Error {
    fn from(e: icm20948::Error<E>) -> Self {
        Error::Bus(e.to_string())
    }
}
