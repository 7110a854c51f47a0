//! Latest-frame slots, one per radar

use contracts::{SensorFrame, SensorId, SlotRetention};

#[derive(Debug)]
struct Slot {
    sensor: SensorId,
    frame: Option<SensorFrame>,
}

/// Newest unfused frame per radar, in registration order
#[derive(Debug)]
pub struct LatestFrameSlots {
    slots: Vec<Slot>,
    retention: SlotRetention,
    max_age_s: f64,
    superseded: u64,
    expired: u64,
}

impl LatestFrameSlots {
    pub fn new(
        sensors: impl IntoIterator<Item = SensorId>,
        retention: SlotRetention,
        max_age_s: f64,
    ) -> Self {
        Self {
            slots: sensors
                .into_iter()
                .map(|sensor| Slot { sensor, frame: None })
                .collect(),
            retention,
            max_age_s,
            superseded: 0,
            expired: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn sensor(&self, index: usize) -> Option<&SensorId> {
        self.slots.get(index).map(|s| &s.sensor)
    }

    /// Store a frame, replacing whatever the slot held
    pub fn offer(&mut self, index: usize, frame: SensorFrame) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.frame.replace(frame).is_some() {
                self.superseded += 1;
            }
        }
    }

    pub fn populated(&self) -> usize {
        self.slots.iter().filter(|s| s.frame.is_some()).count()
    }

    /// Frames replaced before they were fused
    pub fn superseded(&self) -> u64 {
        self.superseded
    }

    /// Frames dropped by the `expire` policy
    pub fn expired(&self) -> u64 {
        self.expired
    }

    /// Frames to fuse this cycle, applying the retention policy
    pub fn take_for_fusion(&mut self, now: f64) -> Vec<SensorFrame> {
        match self.retention {
            SlotRetention::Retain => self.slots.iter().filter_map(|s| s.frame.clone()).collect(),
            SlotRetention::ClearAfterFuse => {
                self.slots.iter_mut().filter_map(|s| s.frame.take()).collect()
            }
            SlotRetention::Expire => {
                let max_age = self.max_age_s;
                for slot in &mut self.slots {
                    let stale = slot
                        .frame
                        .as_ref()
                        .is_some_and(|f| now - f.timestamp > max_age);
                    if stale {
                        slot.frame = None;
                        self.expired += 1;
                    }
                }
                self.slots.iter().filter_map(|s| s.frame.clone()).collect()
            }
        }
    }
}
