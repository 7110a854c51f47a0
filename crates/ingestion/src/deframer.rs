//! Frame deframer
//!
//! Owns the receive buffer of one radar. A frame is only handed to the
//! parser once two sync markers are buffered, so the frame between them is
//! complete even while the next one is still arriving.

use bytes::{Buf, BytesMut};
use contracts::wire::MAGIC;
use tracing::trace;

use crate::error::ParseError;
use crate::parser::{parse_frame, ParsedFrame};

/// Receive buffer size that triggers a full clear
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 100_000;

/// Deframer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeframerStats {
    /// Frames successfully parsed
    pub frames: u64,
    /// Garbage bytes dropped before a marker
    pub bytes_discarded: u64,
    /// Marker-length skips after a failed parse
    pub resyncs: u64,
    /// Full buffer clears by the safety valve
    pub overflows: u64,
}

/// Sync-marker based frame recovery over an append-only buffer
#[derive(Debug)]
pub struct FrameDeframer {
    buf: BytesMut,
    max_buffer_bytes: usize,
    stats: DeframerStats,
}

impl Default for FrameDeframer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_BYTES)
    }
}

impl FrameDeframer {
    pub fn new(max_buffer_bytes: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(8192),
            max_buffer_bytes,
            stats: DeframerStats::default(),
        }
    }

    /// Buffer for byte sources to append into
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn stats(&self) -> DeframerStats {
        self.stats
    }

    /// Next frame from the buffer.
    ///
    /// - `None`: fewer than two markers buffered, or the first frame still incomplete
    /// - `Some(Ok)`: frame parsed, buffer advanced past `total_packet_length`
    /// - `Some(Err)`: candidate rejected, buffer advanced past the marker only
    pub fn next_frame(&mut self) -> Option<Result<ParsedFrame, ParseError>> {
        let start = find_marker(&self.buf, 0)?;
        find_marker(&self.buf, start + MAGIC.len())?;

        if start > 0 {
            trace!(discarded = start, "dropping bytes before sync marker");
            self.buf.advance(start);
            self.stats.bytes_discarded += start as u64;
        }

        match parse_frame(&self.buf) {
            Ok(frame) => {
                self.buf.advance(frame.total_length());
                self.stats.frames += 1;
                Some(Ok(frame))
            }
            // Declared length fits in the buffer bound: wait for the rest
            Err(err) if err.is_incomplete() && !self.exceeds_bound(&err) => None,
            Err(err) => {
                self.buf.advance(MAGIC.len());
                self.stats.resyncs += 1;
                Some(Err(err))
            }
        }
    }

    /// Clear the buffer if it grew past the bound without yielding a frame.
    ///
    /// Returns the number of bytes dropped.
    pub fn check_overflow(&mut self) -> Option<usize> {
        if self.buf.len() <= self.max_buffer_bytes {
            return None;
        }
        let dropped = self.buf.len();
        self.buf.clear();
        self.stats.overflows += 1;
        Some(dropped)
    }

    /// An incomplete frame that could never fit is treated as a bad marker
    fn exceeds_bound(&self, err: &ParseError) -> bool {
        matches!(err, ParseError::IncompleteFrame { needed, .. } if *needed > self.max_buffer_bytes)
    }
}

/// Offset of the first sync marker at or after `from`
pub fn find_marker(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(MAGIC.len())
        .position(|w| w == MAGIC)
        .map(|pos| pos + from)
}
