//! Error handling module
//!
//! This module defines the error types and result type alias used throughout
//! the library.

use thiserror::Error;
use std::io;

/// Protomux error type
#[derive(Error, Debug)]
pub enum MuxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The connection ended before enough bytes were available to classify it
    #[error("connection closed before {needed} byte(s) could be peeked (got {got})")]
    InsufficientData {
        /// Bytes the detector needed to see
        needed: usize,
        /// Bytes actually available before EOF
        got: usize,
    },

    /// A listener was requested for a protocol name with no registered detector
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    /// The dispatch loop ended with an unrecoverable accept error
    #[error("dispatcher terminated: {0}")]
    Terminated(String),

    /// The shared endpoint was closed and no more connections will be delivered
    #[error("listener closed")]
    Closed,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `MuxError`.
pub type Result<T> = std::result::Result<T, MuxError>;
