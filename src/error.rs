//! Error types for the connection, message and framing layers.
//!
//! Three classes are distinguished, matching the error handling design:
//! configuration errors are returned synchronously to the caller; session
//! errors (I/O, handshake, decode failures) never escape a transport worker
//! thread and are only observable via a `DISCONNECTED` event plus a log line;
//! frame-level errors (malformed frame, duplicate, stray ACK) are logged and
//! dropped, and have no dedicated error type at all.

use thiserror::Error;

/// Failure to establish or reconfigure a connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connection is already connected or connecting")]
    Busy,
    #[error("unsupported connection scheme: {0}")]
    UnknownScheme(String),
}

/// Failure to hand a packet to the supervisor.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("no dispatcher registered for dispatch byte {0:#04x}")]
    NoDispatcher(u8),
}

/// Failure to parse a [`crate::message::Message`] from wire bytes.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("buffer too short for message header: {0} bytes")]
    Truncated(usize),
    #[error("message payload length {declared} exceeds remaining {remaining} bytes")]
    LengthMismatch { declared: usize, remaining: usize },
    #[error("message footer length {0} is neither 0 nor 2 bytes")]
    InvalidFooter(usize),
}

/// Failure to parse a serial inner-protocol frame, once HDLC-deframed and CRC-checked.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame too short to contain a CRC")]
    TooShort,
    #[error("CRC mismatch: computed {computed:#06x}, frame claims {claimed:#06x}")]
    CrcMismatch { computed: u16, claimed: u16 },
    #[error("frame has no protocol tag")]
    Empty,
    #[error("unknown serial protocol tag {0:#04x}")]
    UnknownTag(u8),
    #[error("not enough data for serial protocol tag {0:#04x}")]
    Truncated(u8),
}
