//! Ingestion error types

use thiserror::Error;

/// Frame decode failure
///
/// `Incomplete*` means "wait for more bytes", `Malformed*` means the
/// candidate marker was not a real frame start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Fewer than 40 bytes after the marker
    #[error("incomplete header: {available} of 40 bytes available")]
    IncompleteHeader { available: usize },

    /// Buffer shorter than the declared packet length
    #[error("incomplete frame: need {needed} bytes, {available} available")]
    IncompleteFrame { needed: usize, available: usize },

    /// Header fields cannot describe a real frame
    #[error("malformed header: {message}")]
    MalformedHeader { message: String },

    /// Frame does not start with the sync marker
    #[error("missing sync marker at frame start")]
    MissingMarker,
}

impl ParseError {
    /// True if more bytes may turn this into a valid frame
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::IncompleteHeader { .. } | Self::IncompleteFrame { .. }
        )
    }
}

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Frame decode failure
    #[error("failed to parse frame from '{sensor}': {source}")]
    Parse {
        sensor: String,
        #[source]
        source: ParseError,
    },

    /// Receive buffer cleared by the safety valve
    #[error("receive buffer overflow for '{sensor}': {size} bytes > {max}")]
    BufferOverflow {
        sensor: String,
        size: usize,
        max: usize,
    },

    /// Byte stream read failure
    #[error("stream io error on '{sensor}': {source}")]
    StreamIo {
        sensor: String,
        #[source]
        source: std::io::Error,
    },

    /// Frame queue consumer is gone
    #[error("frame queue closed for '{sensor}'")]
    ChannelClosed { sensor: String },

    /// Radar config cannot be turned into a running source
    #[error("invalid radar config for '{sensor}': {message}")]
    Config { sensor: String, message: String },
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
