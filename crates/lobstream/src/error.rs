use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = LobError> = core::result::Result<T, E>;

/// Failures raised by LOB values, their stores and their streams.
#[derive(Error, Debug)]
pub enum LobError {
    /// The value (or its store) has been released.
    #[error("LOB has been released")]
    InvalidState,
    /// An argument was out of range before any work was done.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ArgumentError),
    /// `pos` lies beyond the content plus the one-past-end position.
    #[error("position {pos} is beyond the end of the value")]
    EndOfValue {
        /// The offending 1-based position.
        pos: u64,
    },
    /// A copy asked for more characters than its source holds.
    #[error("source holds {available} characters, {requested} were requested")]
    TruncatedSource {
        /// Characters asked for.
        requested: u64,
        /// Characters present.
        available: u64,
    },
    /// The stream was closed, explicitly or because its value went away.
    #[error("stream closed")]
    StreamClosed,
    /// A position cache entry would place a character before its own byte.
    #[error("character {char_pos} cannot start at byte {byte_pos}")]
    InvariantViolation {
        /// 1-based character position.
        char_pos: u64,
        /// 0-based byte offset.
        byte_pos: u64,
    },
    /// Stored bytes are not valid in the text encoding.
    #[error("malformed encoded data at byte {offset}")]
    MalformedData {
        /// Byte offset of the bad sequence.
        offset: u64,
    },
    /// Failure in an underlying reader or store.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Details of a [`LobError::InvalidArgument`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentError {
    /// Positions start at 1.
    #[error("position {0} must be at least 1")]
    BadPosition(u64),
    /// A requested window does not fit in the value.
    #[error("window of {len} starting at {pos} extends past the end of the value")]
    WindowBeyondEnd {
        /// First position of the window.
        pos: u64,
        /// Length of the window.
        len: u64,
    },
}

impl From<LobError> for io::Error {
    fn from(err: LobError) -> Self {
        match err {
            LobError::Io(e) => e,
            e @ LobError::MalformedData { .. } => io::Error::new(io::ErrorKind::InvalidData, e),
            e => io::Error::other(e),
        }
    }
}
