//! Error types for the relay
//!
//! Defines wire protocol errors and application-level errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::message::MessageKind;

/// Wire protocol errors
///
/// Every variant except `Io` is protocol-fatal for the connection that
/// produced it; other connections are never affected.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Header carried a kind outside 1..=4
    #[error("Unrecognized message kind: {0}")]
    UnknownKind(u32),

    /// Header length field disagrees with the fixed size of its kind
    #[error("Length mismatch for {kind:?}: expected {expected} bytes, header says {actual}")]
    LengthMismatch {
        kind: MessageKind,
        expected: usize,
        actual: u32,
    },

    /// Stream ended in the middle of a frame
    #[error("Truncated frame: expected {expected} bytes, received {received}")]
    TruncatedFrame { expected: usize, received: usize },

    /// A well-formed message arrived on the side that never accepts it
    #[error("Unexpected message kind: {0:?}")]
    UnexpectedMessage(MessageKind),

    /// IO error while reading or writing frames (transport-fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application-level errors
///
/// Covers transport failures on setup and protocol failures bubbled
/// up from a connection.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol violation on a connection (fatal for that connection)
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configured address did not resolve to anything usable
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Server closed the connection while the client was still running
    #[error("Connection closed by server")]
    ConnectionClosed,
}
