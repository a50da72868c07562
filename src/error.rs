//! # Error Types
//!
//! Error handling for the BIG Chat client.
//!
//! Every failure the session engine can hit is a variant of [`ProtocolError`].
//! Variants are grouped into an [`ErrorKind`] so callers can tell a frame that was
//! safely drained (recoverable) apart from a broken connection (fatal).
//!
//! ## Error Categories
//! - **Transport**: connect/send/receive failures, short reads, peer close
//! - **Protocol**: unexpected responses, non-success status, length violations
//! - **Resource**: bodies larger than the configured allocation limit
//! - **Frame**: unknown or out-of-place frames, consumed without desyncing the stream
//! - **Config**: invalid configuration
//!
//! ## Example Usage
//! ```rust
//! use big_chat_client::error::{ErrorKind, ProtocolError};
//!
//! let err = ProtocolError::ShortRead { expected: 8, received: 3 };
//! assert_eq!(err.kind(), ErrorKind::Transport);
//! assert!(!err.is_recoverable());
//! ```

use std::io;
use std::net::SocketAddrV4;
use thiserror::Error;

use crate::core::header::{FrameType, StatusCode};
use crate::protocol::phase::Phase;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Server closed connection unexpectedly";
    pub const ERR_CONNECT_TIMEOUT: &str = "Timed out connecting to server";

    /// Input errors
    pub const ERR_EMPTY_USERNAME: &str = "Username cannot be empty. Please try again.";
    pub const ERR_EMPTY_PASSWORD: &str = "Password cannot be empty. Please try again.";

    /// Clock errors
    pub const ERR_SYSTEM_TIME: &str = "System time error: time went backwards";
}

/// Coarse classification used to decide between draining a frame and ending the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket-level failure; the stream can no longer be trusted
    Transport,
    /// Peer violated the protocol or refused an operation
    Protocol,
    /// A declared size exceeded what the client is willing to allocate
    Resource,
    /// A whole frame was consumed but was not what the caller wanted
    Frame,
    /// Invalid configuration
    Config,
}

/// ProtocolError is the primary error type for all client operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Could not connect to {address}: {source}")]
    ConnectFailed {
        address: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    #[error("Timeout occurred")]
    Timeout,

    #[error("Unsupported protocol version: {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("Unknown frame type {type_byte:#04x} ({body_length} body bytes)")]
    UnknownFrameType { type_byte: u8, body_length: u32 },

    #[error("Unexpected frame: expected {expected}, got {actual}")]
    UnexpectedFrame {
        expected: FrameType,
        actual: FrameType,
    },

    #[error("{operation} failed: {status}")]
    StatusFailure {
        operation: &'static str,
        status: StatusCode,
    },

    #[error("Body too short for {frame_type}: {length} bytes, minimum {minimum}")]
    BodyTooShort {
        frame_type: FrameType,
        length: usize,
        minimum: usize,
    },

    #[error("Invalid body size for {frame_type}: expected {expected} bytes, got {actual}")]
    BodyLengthMismatch {
        frame_type: FrameType,
        expected: usize,
        actual: usize,
    },

    #[error("Trailer mismatch for {frame_type}: count field says {declared}, body holds {actual}")]
    TrailerMismatch {
        frame_type: FrameType,
        declared: usize,
        actual: usize,
    },

    #[error("Trailer too long for {frame_type}: {length} bytes, maximum {maximum}")]
    TrailerTooLong {
        frame_type: FrameType,
        length: usize,
        maximum: usize,
    },

    #[error("Body does not fit frame type {0}")]
    BodyTypeMismatch(FrameType),

    #[error("Body too large: {0} bytes")]
    OversizedBody(u32),

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Operation requires phase {expected}, session is in {actual}")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("Server returned an empty channel list")]
    NoChannels,

    #[error("Input closed before a value was entered")]
    InputClosed,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Io(_)
            | ProtocolError::ConnectFailed { .. }
            | ProtocolError::ConnectionClosed
            | ProtocolError::ShortRead { .. }
            | ProtocolError::Timeout => ErrorKind::Transport,
            ProtocolError::OversizedBody(_) => ErrorKind::Resource,
            ProtocolError::UnknownFrameType { .. } | ProtocolError::UnexpectedFrame { .. } => {
                ErrorKind::Frame
            }
            ProtocolError::ConfigError(_) => ErrorKind::Config,
            _ => ErrorKind::Protocol,
        }
    }

    /// Whether the stream is still positioned on a frame boundary after this error.
    ///
    /// Only frame-level errors qualify, and only once the caller has consumed the
    /// frame's declared body.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Frame
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
