// src/pool/object_pool.rs
//! Generic reusable-instance pool
//!
//! Instances are constructed up front (or on demand) and handed out by value.
//! Ownership is the checkout state: an instance sitting in `available` belongs
//! to the pool, an instance the caller holds is checked out. Returning moves
//! it back.
//!
//! # Architecture
//!
//! ```text
//! ObjectPool
//! ├─ Available: [A, B, C]        (FIFO, oldest-returned reused first)
//! ├─ Checked out: {D, E}         (ids only, caller owns the instance)
//! └─ Deferred: [(t+1.2s, F)]     (still checked out, returns when due)
//! ```
//!
//! Each instance gets a stable [`InstanceId`] at construction that survives
//! reuse, and a back-reference to its pool so it can be routed home.

use crate::utils::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use tracing::{debug, trace, warn};

/// Identifier of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PoolId(pub u16);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool{}", self.0)
    }
}

/// Stable identity of a pooled instance (owning pool + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId {
    pub pool: PoolId,
    pub slot: u32,
}

impl InstanceId {
    pub const fn new(pool: PoolId, slot: u32) -> Self {
        Self { pool, slot }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pool, self.slot)
    }
}

/// Contract between a pool and the instances it manages
pub trait Poolable {
    /// Identity assigned at construction
    fn instance_id(&self) -> InstanceId;

    /// Wire the back-reference to the owning pool
    fn attach_pool(&mut self, pool: PoolId);

    /// Owning pool, if wired
    fn pool(&self) -> Option<PoolId>;

    /// Called when the instance is handed out
    fn on_checkout(&mut self) {}

    /// Called when the instance comes back; stop anything transient and go inert
    fn on_return(&mut self) {}
}

/// Pool sizing
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Human-readable name used in logs
    pub label: String,

    /// Instances constructed at creation
    pub initial_size: usize,

    /// Upper bound on live instances (`None` = grow without limit)
    pub max_size: Option<usize>,
}

impl PoolConfig {
    pub fn new(label: impl Into<String>, initial_size: usize) -> Self {
        Self {
            label: label.into(),
            initial_size,
            max_size: None,
        }
    }

    pub fn with_max_size(mut self, max_size: Option<usize>) -> Self {
        self.max_size = max_size;
        self
    }
}

struct DeferredReturn<T> {
    due: f64,
    item: T,
}

type Constructor<T> = Box<dyn FnMut(InstanceId) -> T + Send>;

/// FIFO object pool
pub struct ObjectPool<T: Poolable> {
    id: PoolId,
    config: PoolConfig,
    available: VecDeque<T>,
    checked_out: HashSet<InstanceId>,
    deferred: Vec<DeferredReturn<T>>,
    constructor: Constructor<T>,
    next_slot: u32,
    stats: PoolStats,
}

impl<T: Poolable> ObjectPool<T> {
    /// Create a pool and pre-construct its seed capacity
    pub fn new<F>(id: PoolId, config: PoolConfig, constructor: F) -> Self
    where
        F: FnMut(InstanceId) -> T + Send + 'static,
    {
        let seed = match config.max_size {
            Some(max) => config.initial_size.min(max),
            None => config.initial_size,
        };

        let mut pool = Self {
            id,
            available: VecDeque::with_capacity(seed),
            checked_out: HashSet::with_capacity(seed),
            deferred: Vec::new(),
            constructor: Box::new(constructor),
            next_slot: 0,
            stats: PoolStats {
                label: config.label.clone(),
                ..Default::default()
            },
            config,
        };

        for _ in 0..seed {
            let item = pool.construct();
            pool.available.push_back(item);
        }

        debug!(
            "[{}] Pool {} initialized with {} instances",
            pool.config.label, id, seed
        );

        pool
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    /// Instances owned by this pool, free or out
    fn live(&self) -> usize {
        self.stats.constructed as usize
    }

    fn construct(&mut self) -> T {
        let instance_id = InstanceId::new(self.id, self.next_slot);
        self.next_slot += 1;
        self.stats.constructed += 1;

        let mut item = (self.constructor)(instance_id);
        item.attach_pool(self.id);
        trace!("[{}] Constructed {}", self.config.label, instance_id);
        item
    }

    /// Take an instance, constructing one if none is free.
    ///
    /// Returns `None` when the pool is bounded and every instance is out.
    pub fn get(&mut self) -> Option<T> {
        let mut item = match self.available.pop_front() {
            Some(item) => item,
            None => {
                if let Some(max) = self.config.max_size {
                    if self.live() >= max {
                        self.stats.exhausted += 1;
                        debug!(
                            "[{}] Pool at capacity ({}), nothing to hand out",
                            self.config.label, max
                        );
                        return None;
                    }
                }
                self.stats.misses += 1;
                warn!("[{}] Pool is empty! Creating new object", self.config.label);
                self.construct()
            }
        };

        self.checked_out.insert(item.instance_id());
        self.stats.gets += 1;
        item.on_checkout();
        trace!(
            "[{}] Checked out {} ({} remaining)",
            self.config.label,
            item.instance_id(),
            self.available.len()
        );
        Some(item)
    }

    /// Like [`get`](Self::get) but reports exhaustion as an error
    pub fn try_get(&mut self) -> Result<T> {
        self.get().ok_or(EngineError::PoolExhausted)
    }

    /// Return an instance for reuse.
    ///
    /// A second return of an instance that is already back is logged and
    /// ignored. An instance from another pool is rejected.
    pub fn release(&mut self, mut item: T) -> Result<()> {
        let instance_id = item.instance_id();

        if instance_id.pool != self.id {
            self.stats.rejected += 1;
            warn!(
                "[{}] Refusing {} which belongs to {}",
                self.config.label, instance_id, instance_id.pool
            );
            return Err(EngineError::ForeignInstance(instance_id.to_string()));
        }

        if !self.checked_out.remove(&instance_id) {
            self.stats.rejected += 1;
            warn!(
                "[{}] {} returned while not checked out, ignoring",
                self.config.label, instance_id
            );
            return Ok(());
        }

        // construction is capped at max_size, so a valid return always fits
        item.on_return();
        self.stats.returns += 1;
        self.available.push_back(item);
        trace!(
            "[{}] Returned {} ({} available)",
            self.config.label,
            instance_id,
            self.available.len()
        );
        Ok(())
    }

    /// Schedule a return `delay` seconds after `now` without blocking.
    ///
    /// The instance stays checked out until [`tick`](Self::tick) passes the
    /// due time.
    pub fn release_after(&mut self, item: T, delay: f32, now: f64) {
        let due = now + f64::from(delay.max(0.0));
        trace!(
            "[{}] {} returns at t={:.3}",
            self.config.label,
            item.instance_id(),
            due
        );
        self.deferred.push(DeferredReturn { due, item });
    }

    /// Complete every deferred return that is due. Returns how many came back.
    pub fn tick(&mut self, now: f64) -> usize {
        if self.deferred.is_empty() {
            return 0;
        }

        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.deferred)
            .into_iter()
            .partition(|entry| entry.due <= now);
        self.deferred = pending;

        let count = due.len();
        for entry in due {
            if let Err(e) = self.release(entry.item) {
                warn!("[{}] Deferred return failed: {}", self.config.label, e);
            }
        }
        count
    }

    /// Instances awaiting a deferred return (still "in use")
    pub fn pending(&self) -> impl Iterator<Item = &T> {
        self.deferred.iter().map(|entry| &entry.item)
    }

    pub fn is_checked_out(&self, id: InstanceId) -> bool {
        self.checked_out.contains(&id)
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn checked_out_count(&self) -> usize {
        self.checked_out.len()
    }

    /// Pool statistics snapshot
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            available: self.available.len(),
            checked_out: self.checked_out.len(),
            pending_returns: self.deferred.len(),
            ..self.stats.clone()
        }
    }

    /// Tear the pool down, dropping everything it still owns.
    ///
    /// Instances still checked out stay with their holders but can no longer
    /// come back here.
    pub fn teardown(self) -> PoolStats {
        let stats = self.stats();
        debug!(
            "[{}] Tearing down pool {} ({} owned, {} still checked out)",
            self.config.label,
            self.id,
            stats.available + stats.pending_returns,
            stats.checked_out
        );
        stats
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub label: String,

    /// Instances ever constructed
    pub constructed: u64,

    /// Successful checkouts
    pub gets: u64,

    /// Checkouts that had to construct a new instance
    pub misses: u64,

    /// Checkouts refused at capacity
    pub exhausted: u64,

    /// Successful returns
    pub returns: u64,

    /// Duplicate or foreign returns
    pub rejected: u64,

    pub available: usize,
    pub checked_out: usize,
    pub pending_returns: usize,
}
