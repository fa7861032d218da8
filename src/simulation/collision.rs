// src/simulation/collision.rs
//! Collision deduplication
//!
//! Both participants of a contact see it, usually on the same frame and
//! often for several frames in a row. The registry makes sure one contact is
//! resolved once: the first report claims the normalized pair key, later
//! reports find it taken and are dropped.
//!
//! ```text
//! (A,B) ──► PairKey(min,max) ──► insert? ──yes──► dispatch, evict in 0.1s
//! (B,A) ──►        same key  ──► insert? ──no───► duplicate, ignore
//! ```
//!
//! Claimed keys are evicted after the suppression window. A slower sweep
//! clears the whole set in case an eviction never ran.

use crate::pool::object_pool::InstanceId;
use crate::simulation::scheduler::TimerQueue;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Unordered pair of elf identities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    low: InstanceId,
    high: InstanceId,
}

impl PairKey {
    pub fn new(a: InstanceId, b: InstanceId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn members(&self) -> (InstanceId, InstanceId) {
        (self.low, self.high)
    }
}

/// Proof that a pair was claimed, used to evict exactly that claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairClaim {
    pub key: PairKey,
    epoch: u64,
}

/// Set of recently resolved pairs
pub struct CollisionRegistry {
    active: HashMap<PairKey, u64>,
    evictions: TimerQueue<PairClaim>,
    next_epoch: u64,

    /// Suppression window (seconds)
    window: f32,

    /// Full-clear interval (seconds)
    sweep_interval: f32,
    last_sweep: f64,

    stats: CollisionStats,
}

impl CollisionRegistry {
    pub fn new(window: f32, sweep_interval: f32) -> Self {
        Self {
            active: HashMap::new(),
            evictions: TimerQueue::new(),
            next_epoch: 0,
            window,
            sweep_interval,
            last_sweep: 0.0,
            stats: CollisionStats::default(),
        }
    }

    /// Claim the pair at time `now`. `None` means it is already claimed.
    pub fn try_claim(&mut self, a: InstanceId, b: InstanceId, now: f64) -> Option<PairClaim> {
        let key = PairKey::new(a, b);

        if self.active.contains_key(&key) {
            self.stats.duplicates += 1;
            trace!("Duplicate contact {} <-> {} suppressed", a, b);
            return None;
        }

        let epoch = self.next_epoch;
        self.next_epoch += 1;
        self.active.insert(key, epoch);
        self.stats.claims += 1;

        let claim = PairClaim { key, epoch };
        self.evictions
            .schedule(now + f64::from(self.window), claim);
        Some(claim)
    }

    /// Release a claim early. Only removes the key if it still belongs to
    /// this claim, so a stale release cannot free a newer claim.
    pub fn release(&mut self, claim: PairClaim) -> bool {
        match self.active.get(&claim.key) {
            Some(epoch) if *epoch == claim.epoch => {
                self.active.remove(&claim.key);
                true
            }
            _ => false,
        }
    }

    /// Evict expired claims and run the sweep when due.
    /// Returns how many keys were removed.
    pub fn expire(&mut self, now: f64) -> usize {
        let mut removed = 0;
        for claim in self.evictions.drain_due(now) {
            if self.release(claim) {
                removed += 1;
            }
        }
        self.stats.evicted += removed as u64;

        if now - self.last_sweep >= f64::from(self.sweep_interval) {
            let leaked = self.active.len();
            if leaked > 0 {
                debug!("Collision sweep cleared {} pair keys", leaked);
            }
            self.active.clear();
            self.last_sweep = now;
            self.stats.sweeps += 1;
            self.stats.swept += leaked as u64;
            removed += leaked;
        }

        removed
    }

    pub fn contains(&self, a: InstanceId, b: InstanceId) -> bool {
        self.active.contains_key(&PairKey::new(a, b))
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn stats(&self) -> CollisionStats {
        self.stats.clone()
    }
}

/// Dedup statistics
#[derive(Debug, Clone, Default)]
pub struct CollisionStats {
    /// Pairs admitted for resolution
    pub claims: u64,

    /// Reports dropped because the pair was already claimed
    pub duplicates: u64,

    /// Keys removed by their scheduled eviction
    pub evicted: u64,

    /// Sweeps run
    pub sweeps: u64,

    /// Keys removed by sweeps
    pub swept: u64,
}
