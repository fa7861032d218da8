// src/simulation/events.rs
//! World event queue
//!
//! Lifecycle events leave the core through a bounded lock-free queue that the
//! host drains at its own pace (UI counters, logs, tests). The queue never
//! blocks the frame: when it is full the event is dropped and counted.

use crate::pool::object_pool::InstanceId;
use crate::simulation::elf::ElfKind;
use crate::utils::math::Vec3;
use crossbeam::queue::ArrayQueue;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Why a spawn attempt produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Population cap reached
    PopulationCap,

    /// No pool registered or pool exhausted
    NoInstance,

    /// No valid position within the attempt budget
    NoPosition,

    /// No spawner config for the kind
    NoConfig,
}

/// Something that happened in the world
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldEvent {
    EntitySpawned {
        id: InstanceId,
        kind: ElfKind,
        position: Vec3,
        replicated: bool,
    },
    ReplicationRequested {
        kind: ElfKind,
        position: Vec3,
    },
    EntityDestroyed {
        id: InstanceId,
        kind: ElfKind,
    },
    SpawnSkipped {
        kind: ElfKind,
        reason: SkipReason,
        replicated: bool,
    },
}

/// Event stamped with simulation time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedEvent {
    pub sequence: u64,
    pub frame: u64,
    pub time: f64,
    pub event: WorldEvent,
}

/// Bounded MPMC event queue
#[derive(Clone)]
pub struct EventQueue {
    /// Underlying bounded queue
    queue: Arc<ArrayQueue<TimedEvent>>,

    /// Push counter
    push_count: Arc<AtomicU64>,

    /// Pop counter
    pop_count: Arc<AtomicU64>,

    /// Drop counter (queue full)
    drop_count: Arc<AtomicU64>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity)),
            push_count: Arc::new(AtomicU64::new(0)),
            pop_count: Arc::new(AtomicU64::new(0)),
            drop_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Push an event (non-blocking); hands it back when the queue is full
    pub fn push(&self, event: TimedEvent) -> Result<(), TimedEvent> {
        match self.queue.push(event) {
            Ok(()) => {
                self.push_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(event) => {
                self.drop_count.fetch_add(1, Ordering::Relaxed);
                Err(event)
            }
        }
    }

    pub fn try_pop(&self) -> Option<TimedEvent> {
        let event = self.queue.pop()?;
        self.pop_count.fetch_add(1, Ordering::Relaxed);
        Some(event)
    }

    /// Pop everything currently queued
    pub fn drain(&self) -> Vec<TimedEvent> {
        let mut events = Vec::with_capacity(self.queue.len());
        while let Some(event) = self.try_pop() {
            events.push(event);
        }
        events
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            push_count: self.push_count.load(Ordering::Relaxed),
            pop_count: self.pop_count.load(Ordering::Relaxed),
            drop_count: self.drop_count.load(Ordering::Relaxed),
            current_size: self.queue.len(),
            capacity: self.queue.capacity(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Queue statistics
#[derive(Debug, Clone)]
pub struct QueueStats {
    /// Total events pushed
    pub push_count: u64,

    /// Total events popped
    pub pop_count: u64,

    /// Total events dropped (queue full)
    pub drop_count: u64,

    /// Current queue size
    pub current_size: usize,

    /// Queue capacity
    pub capacity: usize,
}

impl QueueStats {
    pub fn fill_percentage(&self) -> f64 {
        (self.current_size as f64 / self.capacity as f64) * 100.0
    }

    pub fn drop_rate(&self) -> f64 {
        let attempted = self.push_count + self.drop_count;
        if attempted == 0 {
            0.0
        } else {
            (self.drop_count as f64 / attempted as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destroyed(sequence: u64) -> TimedEvent {
        TimedEvent {
            sequence,
            frame: 1,
            time: 0.5,
            event: WorldEvent::EntityDestroyed {
                id: InstanceId::new(crate::pool::object_pool::PoolId(2), sequence as u32),
                kind: ElfKind::Red,
            },
        }
    }

    #[test]
    fn test_push_pop_fifo() {
        let queue = EventQueue::new(8);
        queue.push(destroyed(1)).unwrap();
        queue.push(destroyed(2)).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_pop().unwrap().sequence, 1);
        assert_eq!(queue.drain().len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_drops() {
        let queue = EventQueue::new(2);
        queue.push(destroyed(1)).unwrap();
        queue.push(destroyed(2)).unwrap();
        assert!(queue.push(destroyed(3)).is_err());

        let stats = queue.stats();
        assert_eq!(stats.push_count, 2);
        assert_eq!(stats.drop_count, 1);
        assert_eq!(stats.fill_percentage(), 100.0);
    }

    #[test]
    fn test_event_json_shape() {
        let event = WorldEvent::ReplicationRequested {
            kind: ElfKind::Red,
            position: Vec3::flat(1.0, 2.0),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "replication_requested");
        assert_eq!(json["kind"], "red");
    }
}
