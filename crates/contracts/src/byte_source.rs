//! ByteSource trait - raw radar byte stream abstraction
//!
//! The ingest loop only needs "read whatever is available, give up after a timeout".
//! Serial bridges, recorded captures and synthetic generators all implement this.

use std::io;
use std::time::Duration;

use bytes::BytesMut;

/// Byte stream feeding one radar's ingest loop
#[trait_variant::make(ByteSource: Send)]
pub trait LocalByteSource {
    /// Source description (used for logging)
    fn describe(&self) -> String;

    /// Append available bytes to `buf`.
    ///
    /// Waits at most `timeout`. Returns `Ok(0)` when nothing arrived in time,
    /// so the caller can check its shutdown signal and poll again.
    async fn read(&mut self, buf: &mut BytesMut, timeout: Duration) -> io::Result<usize>;

    /// Release the underlying stream
    async fn close(&mut self) -> io::Result<()>;
}
