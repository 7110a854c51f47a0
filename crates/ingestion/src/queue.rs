//! Per-radar frame queue
//!
//! Bounded single-producer/single-consumer queue between an ingest loop and
//! the fusion scheduler. With `DropOldest` the producer keeps an eviction
//! handle on the queue so the newest frame always gets in.

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{DropPolicy, SensorFrame};
use tracing::{trace, warn};

use crate::config::BackpressureConfig;

/// Result of publishing one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Queue full, the published frame was discarded
    DroppedNewest,
    /// Queue full, the oldest queued frame was discarded
    EvictedOldest,
    /// Consumer is gone
    Closed,
}

impl SendOutcome {
    pub fn dropped_frame(self) -> bool {
        matches!(self, Self::DroppedNewest | Self::EvictedOldest)
    }
}

/// Producer half of a radar's frame queue
#[derive(Debug)]
pub struct FrameSender {
    tx: Sender<SensorFrame>,
    evict: Receiver<SensorFrame>,
    policy: DropPolicy,
}

/// Create a radar frame queue
pub fn frame_queue(config: &BackpressureConfig) -> (FrameSender, Receiver<SensorFrame>) {
    let (tx, rx) = bounded(config.channel_capacity.max(1));
    let sender = FrameSender {
        tx,
        evict: rx.clone(),
        policy: config.drop_policy,
    };
    (sender, rx)
}

impl FrameSender {
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Consumer dropped its receiver (our eviction handle does not count)
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed() || self.tx.receiver_count() <= 1
    }

    /// Non-blocking publish honoring the drop policy
    pub fn send(&self, frame: SensorFrame) -> SendOutcome {
        if self.is_closed() {
            return SendOutcome::Closed;
        }

        match self.tx.try_send(frame) {
            Ok(()) => SendOutcome::Sent,
            Err(TrySendError::Full(frame)) => match self.policy {
                DropPolicy::DropNewest => {
                    trace!(sensor = %frame.sensor, "frame dropped (newest)");
                    SendOutcome::DroppedNewest
                }
                DropPolicy::DropOldest => {
                    if let Ok(old) = self.evict.try_recv() {
                        trace!(sensor = %old.sensor, frame_number = old.frame_number, "frame evicted (oldest)");
                    }
                    match self.tx.try_send(frame) {
                        Ok(()) => SendOutcome::EvictedOldest,
                        Err(TrySendError::Full(_)) => SendOutcome::DroppedNewest,
                        Err(TrySendError::Closed(_)) => SendOutcome::Closed,
                    }
                }
            },
            Err(TrySendError::Closed(frame)) => {
                warn!(sensor = %frame.sensor, "frame queue closed");
                SendOutcome::Closed
            }
        }
    }
}
