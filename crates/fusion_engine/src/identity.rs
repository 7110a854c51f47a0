//! Global identity table
//!
//! Maps sensor-local track keys onto fusion-wide ids. Owned by the engine,
//! never shared.

use std::collections::{BTreeSet, HashMap};

use contracts::TrackKey;
use tracing::trace;

/// `(sensor, local_id) -> global_id` plus `global_id -> last_seen`
///
/// Every id in the forward map has a `last_seen` entry and vice versa.
#[derive(Debug)]
pub struct GlobalIdentityTable {
    forward: HashMap<TrackKey, u32>,
    last_seen: HashMap<u32, f64>,
    next_id: u32,
    allocated: u64,
    purged: u64,
}

impl Default for GlobalIdentityTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalIdentityTable {
    pub fn new() -> Self {
        Self {
            forward: HashMap::new(),
            last_seen: HashMap::new(),
            next_id: 1,
            allocated: 0,
            purged: 0,
        }
    }

    /// Number of live global ids
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    /// Number of sensor-local keys currently mapped
    pub fn key_count(&self) -> usize {
        self.forward.len()
    }

    pub fn lookup(&self, key: &TrackKey) -> Option<u32> {
        self.forward.get(key).copied()
    }

    pub fn last_seen(&self, global_id: u32) -> Option<f64> {
        self.last_seen.get(&global_id).copied()
    }

    /// Next id that would be handed out
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    pub fn purged(&self) -> u64 {
        self.purged
    }

    /// Drop every id idle for longer than `timeout` (strict), with its keys.
    ///
    /// Returns the number of ids removed.
    pub fn purge(&mut self, now: f64, timeout: f64) -> usize {
        let stale: BTreeSet<u32> = self
            .last_seen
            .iter()
            .filter(|(_, &seen)| now - seen > timeout)
            .map(|(&id, _)| id)
            .collect();

        if stale.is_empty() {
            return 0;
        }

        for id in &stale {
            self.last_seen.remove(id);
        }
        self.forward.retain(|_, id| !stale.contains(id));
        self.purged += stale.len() as u64;

        trace!(purged = stale.len(), remaining = self.len(), "identities purged");
        stale.len()
    }

    /// Id for a track that was not merged this cycle
    pub fn resolve_single(&mut self, key: &TrackKey, now: f64) -> u32 {
        let id = match self.forward.get(key) {
            Some(&id) => id,
            None => {
                let id = self.allocate();
                self.forward.insert(key.clone(), id);
                id
            }
        };
        self.last_seen.insert(id, now);
        id
    }

    /// Id for a merged cluster
    ///
    /// The smallest id already mapped by any member wins, otherwise a fresh one
    /// is allocated. Every member key is re-pointed to the winner, and ids
    /// left without any key are dropped.
    pub fn resolve_cluster(&mut self, keys: &[TrackKey], now: f64) -> u32 {
        let id = match keys.iter().filter_map(|k| self.lookup(k)).min() {
            Some(id) => id,
            None => self.allocate(),
        };

        let mut displaced = BTreeSet::new();
        for key in keys {
            if let Some(previous) = self.forward.insert(key.clone(), id) {
                if previous != id {
                    displaced.insert(previous);
                }
            }
        }

        for orphan in displaced {
            if !self.forward.values().any(|&v| v == orphan) {
                trace!(orphan, adopted_by = id, "global id retired by merge");
                self.last_seen.remove(&orphan);
            }
        }

        self.last_seen.insert(id, now);
        id
    }

    /// Both maps reference exactly the same id set
    pub fn is_consistent(&self) -> bool {
        let mapped: BTreeSet<u32> = self.forward.values().copied().collect();
        let seen: BTreeSet<u32> = self.last_seen.keys().copied().collect();
        mapped == seen
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.allocated += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(sensor: &str, local_id: u32) -> TrackKey {
        TrackKey::new(sensor.into(), local_id)
    }

    #[test]
    fn ids_start_at_one_and_are_stable() {
        let mut table = GlobalIdentityTable::new();
        assert_eq!(table.resolve_single(&key("r1", 5), 0.0), 1);
        assert_eq!(table.resolve_single(&key("r1", 7), 0.0), 2);
        assert_eq!(table.resolve_single(&key("r1", 5), 0.1), 1);
        assert_eq!(table.last_seen(1), Some(0.1));
        assert_eq!(table.allocated(), 2);
        assert!(table.is_consistent());
    }

    #[test]
    fn purge_is_strict_and_removes_keys() {
        let mut table = GlobalIdentityTable::new();
        table.resolve_single(&key("r1", 1), 0.0);
        table.resolve_single(&key("r2", 1), 1.0);

        assert_eq!(table.purge(2.0, 2.0), 0);
        assert_eq!(table.purge(2.5, 2.0), 1);
        assert_eq!(table.lookup(&key("r1", 1)), None);
        assert_eq!(table.lookup(&key("r2", 1)), Some(2));
        assert!(table.is_consistent());

        // never reused
        assert_eq!(table.resolve_single(&key("r1", 1), 2.5), 3);
    }

    #[test]
    fn merge_adopts_smallest_and_retires_orphans() {
        let mut table = GlobalIdentityTable::new();
        let a = key("r1", 1);
        let b = key("r2", 4);
        assert_eq!(table.resolve_single(&a, 0.0), 1);
        assert_eq!(table.resolve_single(&b, 0.0), 2);

        assert_eq!(table.resolve_cluster(&[b.clone(), a.clone()], 0.1), 1);
        assert_eq!(table.lookup(&b), Some(1));
        assert_eq!(table.last_seen(2), None);
        assert_eq!(table.len(), 1);
        assert!(table.is_consistent());
    }

    #[test]
    fn merge_keeps_displaced_id_still_referenced() {
        let mut table = GlobalIdentityTable::new();
        let a = key("r1", 1);
        let b = key("r2", 1);
        let c = key("r2", 2);
        table.resolve_cluster(&[a.clone()], 0.0);
        table.resolve_cluster(&[b.clone(), c.clone()], 0.0);
        assert_eq!(table.lookup(&c), Some(2));

        // only b moves over, c still holds id 2
        assert_eq!(table.resolve_cluster(&[a.clone(), b.clone()], 0.1), 1);
        assert_eq!(table.lookup(&c), Some(2));
        assert!(table.last_seen(2).is_some());
        assert!(table.is_consistent());
    }

    #[test]
    fn unmapped_cluster_allocates() {
        let mut table = GlobalIdentityTable::new();
        let id = table.resolve_cluster(&[key("r1", 9), key("r2", 3)], 0.0);
        assert_eq!(id, 1);
        assert_eq!(table.key_count(), 2);
        assert_eq!(table.next_id(), 2);
    }
}
