//! Monotonic pipeline clock
//!
//! Every context timestamps against the same epoch so sensor frames,
//! identity timeouts and fused frames share one time base.

use std::time::{Duration, Instant};

/// Seconds since pipeline start
#[derive(Debug, Clone, Copy)]
pub struct PipelineClock {
    epoch: Instant,
}

impl PipelineClock {
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Monotonic seconds since the epoch
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }
}

impl Default for PipelineClock {
    fn default() -> Self {
        Self::start()
    }
}
