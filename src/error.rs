//! Error types for the covert channel toolkit.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for toolkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur across the channel, processor and controller layers.
#[derive(Error, Debug)]
pub enum Error {
    /// The caller's receive buffer is smaller than the decoded message.
    ///
    /// The leading `written` bytes of the message were copied into the
    /// buffer; the remainder is discarded.
    #[error("buffer full: message truncated to {written} bytes")]
    BufferFull {
        /// Number of bytes copied before truncation
        written: u64,
    },

    /// A configured per-operation timeout expired.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Operation on a channel that is closed or was never opened.
    #[error("channel closed")]
    ChannelClosed,

    /// The embedder cannot encode into or decode from this packet shape.
    ///
    /// Recovered locally: the channel retries with another packet.
    #[error("embedder rejected packet: {0}")]
    EmbedderReject(&'static str),

    /// Processor inversion detected corruption.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Validation detected an out-of-range or inconsistent option.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Command opcode not recognised.
    #[error("unknown operation code: {0}")]
    UnknownOpCode(String),

    /// JSON encode/decode failure on the command surface.
    #[error("marshal error: {0}")]
    Marshal(#[from] serde_json::Error),

    /// Partial or failed send at the channel layer.
    #[error("write fail: wrote {written} bytes out of {total}: {reason}")]
    WriteFail {
        /// Bytes actually handed to the wire
        written: u64,
        /// Bytes the caller asked to send
        total: u64,
        /// Underlying cause, already rendered
        reason: String,
    },

    /// Cryptographic operation failed (processor layer).
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// Malformed packet or frame.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Network I/O error.
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),
}

impl Error {
    /// Create a new cryptographic error
    pub fn crypto(msg: impl Into<String>) -> Self {
        Error::Crypto(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Create a new malformed-message error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidMessage(msg.into())
    }

    /// Whether the channel layer may retry this failure with another packet.
    pub fn is_reject(&self) -> bool {
        matches!(self, Error::EmbedderReject(_))
    }

    /// Whether this error is the expected outcome of a cancelled operation.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::ChannelClosed)
    }
}
