//! The resolver's four mutable caches (spec §4.17, Design Note §9): the
//! location cache, the per-country strategy memo, the per-country
//! local-unavailable memo, and the in-flight pending set. All are plain
//! `std::sync::Mutex`-guarded maps bound to one [`crate::Resolver`]
//! instance rather than process-wide globals.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::strategy::StrategyId;
use crate::ResolvedLocation;

pub type CountryKey = (u16, u16);
pub type LocationKey = (u16, u16, u32);

#[derive(Debug, Default)]
pub struct LocationCache {
    entries: Mutex<HashMap<LocationKey, ResolvedLocation>>,
}

impl LocationCache {
    pub fn get(&self, cid: u16, tabcd: u16, lcd: u32) -> Option<ResolvedLocation> {
        self.entries.lock().unwrap().get(&(cid, tabcd, lcd)).cloned()
    }

    pub fn set(&self, cid: u16, tabcd: u16, lcd: u32, value: ResolvedLocation) {
        self.entries.lock().unwrap().insert((cid, tabcd, lcd), value);
    }

    pub fn len(&self) -> u64 {
        self.entries.lock().unwrap().len() as u64
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[derive(Debug, Default)]
pub struct StrategyCache {
    entries: Mutex<HashMap<CountryKey, StrategyId>>,
}

impl StrategyCache {
    pub fn get(&self, cid: u16, tabcd: u16) -> Option<StrategyId> {
        self.entries.lock().unwrap().get(&(cid, tabcd)).copied()
    }

    pub fn set(&self, cid: u16, tabcd: u16, strategy: StrategyId) {
        self.entries.lock().unwrap().insert((cid, tabcd), strategy);
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Remembers which `(cid, tabcd)` pairs have no local file (missing or
/// corrupt), so repeated calls skip straight to the remote fallback.
#[derive(Debug, Default)]
pub struct LocalAvailabilityCache {
    unavailable: Mutex<HashSet<CountryKey>>,
}

impl LocalAvailabilityCache {
    pub fn is_unavailable(&self, cid: u16, tabcd: u16) -> bool {
        self.unavailable.lock().unwrap().contains(&(cid, tabcd))
    }

    pub fn mark_unavailable(&self, cid: u16, tabcd: u16) {
        self.unavailable.lock().unwrap().insert((cid, tabcd));
    }

    pub fn clear(&self) {
        self.unavailable.lock().unwrap().clear();
    }
}

/// In-flight `(cid, tabcd, lcd)` markers, preventing duplicate concurrent
/// requests for the same location (spec §5). Released along every exit
/// path — success, empty result, error, or cancellation — via
/// [`PendingGuard`]'s `Drop` impl.
#[derive(Debug, Default)]
pub struct PendingSet {
    inflight: Mutex<HashSet<LocationKey>>,
}

impl PendingSet {
    pub fn is_pending(&self, cid: u16, tabcd: u16, lcd: u32) -> bool {
        self.inflight.lock().unwrap().contains(&(cid, tabcd, lcd))
    }

    /// Mark every LCD in `batch` pending and return a guard that releases
    /// them all when dropped, regardless of how the caller's scope exits.
    pub fn acquire<'a>(&'a self, cid: u16, tabcd: u16, batch: &[u32]) -> PendingGuard<'a> {
        let mut inflight = self.inflight.lock().unwrap();
        for &lcd in batch {
            inflight.insert((cid, tabcd, lcd));
        }
        drop(inflight);
        PendingGuard {
            set: self,
            cid,
            tabcd,
            lcds: batch.to_vec(),
        }
    }

    fn release(&self, cid: u16, tabcd: u16, lcds: &[u32]) {
        let mut inflight = self.inflight.lock().unwrap();
        for &lcd in lcds {
            inflight.remove(&(cid, tabcd, lcd));
        }
    }

    pub fn clear(&self) {
        self.inflight.lock().unwrap().clear();
    }
}

pub struct PendingGuard<'a> {
    set: &'a PendingSet,
    cid: u16,
    tabcd: u16,
    lcds: Vec<u32>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.set.release(self.cid, self.tabcd, &self.lcds);
    }
}
