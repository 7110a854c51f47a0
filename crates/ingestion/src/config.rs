//! Backpressure configuration and ingestion metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

pub use contracts::DropPolicy;

/// Backpressure configuration of one radar's frame queue
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    /// Channel capacity
    pub channel_capacity: usize,

    /// Drop policy when full
    pub drop_policy: DropPolicy,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 8,
            drop_policy: DropPolicy::DropOldest,
        }
    }
}

impl BackpressureConfig {
    pub fn new(channel_capacity: usize, drop_policy: DropPolicy) -> Self {
        Self {
            channel_capacity,
            drop_policy,
        }
    }
}

/// Per-radar ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Bytes read from the byte source
    pub bytes_received: AtomicU64,

    /// Frames parsed and published
    pub frames_parsed: AtomicU64,

    /// Frames dropped by the queue policy
    pub frames_dropped: AtomicU64,

    /// Candidate frames rejected by the parser
    pub parse_errors: AtomicU64,

    /// Receive buffer clears
    pub buffer_overflows: AtomicU64,

    /// Byte source read failures
    pub io_errors: AtomicU64,

    /// World tracks published
    pub tracks_published: AtomicU64,

    /// Tracks dropped by the world limits
    pub tracks_out_of_bounds: AtomicU64,

    /// TLVs or target records skipped inside otherwise valid frames
    pub records_skipped: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_bytes(&self, n: usize) {
        self.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Returns the new frame count
    pub fn record_frame(&self, tracks: usize) -> u64 {
        self.tracks_published
            .fetch_add(tracks as u64, Ordering::Relaxed);
        self.frames_parsed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overflow(&self) {
        self.buffer_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_io_error(&self) {
        self.io_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_out_of_bounds(&self, n: usize) {
        self.tracks_out_of_bounds
            .fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn record_skipped(&self, n: u32) {
        self.records_skipped.fetch_add(u64::from(n), Ordering::Relaxed);
    }

    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_parsed: self.frames_parsed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            buffer_overflows: self.buffer_overflows.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
            tracks_published: self.tracks_published.load(Ordering::Relaxed),
            tracks_out_of_bounds: self.tracks_out_of_bounds.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub bytes_received: u64,
    pub frames_parsed: u64,
    pub frames_dropped: u64,
    pub parse_errors: u64,
    pub buffer_overflows: u64,
    pub io_errors: u64,
    pub tracks_published: u64,
    pub tracks_out_of_bounds: u64,
    pub records_skipped: u64,
    pub queue_len: usize,
}
