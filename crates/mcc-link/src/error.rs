//! Link error types.

use mcc_protocol::{FirmwareErrorCode, ProtocolError};
use thiserror::Error;

/// Errors from the correlation engine, its transport, or the device.
#[derive(Error, Debug)]
pub enum LinkError {
    /// No matching response arrived in time.
    #[error("timed out waiting for response codes {expected:?}")]
    Timeout {
        /// Codes that would have been accepted.
        expected: Vec<u8>,
    },

    /// A response arrived with a code the waiter did not accept.
    #[error("expected response codes {expected:?}, got 0x{actual:02X}")]
    Mismatch {
        /// Codes that would have been accepted.
        expected: Vec<u8>,
        /// Code that arrived.
        actual: u8,
    },

    /// Another `await_response` is already outstanding.
    #[error("a response waiter is already registered")]
    WaiterBusy,

    /// Push handlers can only be registered for codes 0x80 and above.
    #[error("0x{0:02X} is not a push code")]
    InvalidPushCode(u8),

    /// The link is closed.
    #[error("link closed: {reason}")]
    Closed {
        /// Why the link closed.
        reason: String,
    },

    /// Writing to the transport failed.
    #[error("transport write failed: {0}")]
    Write(#[source] std::io::Error),

    /// The device answered with an error frame.
    #[error("device error: {0}")]
    Device(FirmwareErrorCode),

    /// A contact listing ended with a different number of contacts than
    /// announced.
    #[error("contact listing announced {declared} contacts but sent {received}")]
    ContactCountMismatch {
        /// Count from `ContactsStart`.
        declared: u32,
        /// Contacts received before `EndOfContacts`.
        received: u32,
    },

    /// Encoding or decoding failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Result type for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;
