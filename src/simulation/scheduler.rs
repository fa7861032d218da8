// src/simulation/scheduler.rs
//! Deferred actions keyed by due time
//!
//! Nothing in the simulation sleeps. "Do this in 0.1s" becomes an entry in a
//! [`TimerQueue`] that the frame loop drains once the clock passes its due
//! time. Entries due at the same instant come out in scheduling order.
//!
//! A queued action may outlive its target (the elf went back to its pool and
//! was reused). Whoever drains the queue must re-check the target before
//! acting on it.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Entry<T> {
    due: f64,
    seq: u64,
    payload: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed so the max-heap pops the earliest entry first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-queue of payloads by due time
pub struct TimerQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `payload` to come due at absolute time `due`
    pub fn schedule(&mut self, due: f64, payload: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { due, seq, payload });
    }

    /// Pop the earliest entry if it is due at `now`
    pub fn pop_due(&mut self, now: f64) -> Option<T> {
        match self.heap.peek() {
            Some(entry) if entry.due <= now => self.heap.pop().map(|entry| entry.payload),
            _ => None,
        }
    }

    /// Pop every entry due at `now`, earliest first
    pub fn drain_due(&mut self, now: f64) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(payload) = self.pop_due(now) {
            due.push(payload);
        }
        due
    }

    /// Due time of the earliest entry
    pub fn next_due(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
