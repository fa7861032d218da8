// src/simulation/population.rs
//! Per-kind live-count ledger
//!
//! One counter per world. Admission checks the count against the spawner's
//! cap; every successful admission increments once and every confirmed
//! destruction decrements once. Decrements floor at zero.

use crate::observability::names;
use crate::simulation::elf::ElfKind;
use std::collections::{BTreeMap, HashMap};
use tracing::{trace, warn};

/// Live elves per kind
#[derive(Debug, Clone, Default)]
pub struct PopulationCounter {
    counts: HashMap<ElfKind, u32>,

    /// Destroy calls that found nothing to decrement
    underflows: u64,
}

impl PopulationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff another elf of `kind` fits under `cap`
    pub fn can_admit(&self, kind: ElfKind, cap: u32) -> bool {
        self.count(kind) < cap
    }

    pub fn on_admitted(&mut self, kind: ElfKind) {
        let count = self.counts.entry(kind).or_insert(0);
        *count += 1;
        trace!("{:?} population -> {}", kind, count);
        self.publish(kind);
    }

    pub fn on_destroyed(&mut self, kind: ElfKind) {
        match self.counts.get_mut(&kind) {
            Some(count) if *count > 0 => {
                *count -= 1;
                trace!("{:?} population -> {}", kind, count);
            }
            _ => {
                self.underflows += 1;
                warn!("{:?} destroyed with no live count to decrement", kind);
            }
        }
        self.publish(kind);
    }

    pub fn count(&self, kind: ElfKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn underflows(&self) -> u64 {
        self.underflows
    }

    /// Ordered copy of all counts
    pub fn snapshot(&self) -> BTreeMap<ElfKind, u32> {
        ElfKind::ALL
            .iter()
            .map(|kind| (*kind, self.count(*kind)))
            .collect()
    }

    /// Session restart
    pub fn reset(&mut self) {
        self.counts.clear();
        self.underflows = 0;
        for kind in ElfKind::ALL {
            self.publish(kind);
        }
    }

    fn publish(&self, kind: ElfKind) {
        metrics::gauge!(names::POPULATION, "kind" => kind.as_str()).set(f64::from(self.count(kind)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_admission_gate() {
        let mut counter = PopulationCounter::new();
        for _ in 0..3 {
            assert!(counter.can_admit(ElfKind::White, 3));
            counter.on_admitted(ElfKind::White);
        }
        assert!(!counter.can_admit(ElfKind::White, 3));
        assert!(counter.can_admit(ElfKind::Red, 3));

        counter.on_destroyed(ElfKind::White);
        assert!(counter.can_admit(ElfKind::White, 3));
    }

    #[test]
    fn test_destroy_floors_at_zero() {
        let mut counter = PopulationCounter::new();
        counter.on_destroyed(ElfKind::Blue);
        assert_eq!(counter.count(ElfKind::Blue), 0);
        assert_eq!(counter.underflows(), 1);

        counter.on_admitted(ElfKind::Blue);
        counter.on_destroyed(ElfKind::Blue);
        counter.on_destroyed(ElfKind::Blue);
        assert_eq!(counter.count(ElfKind::Blue), 0);
        assert_eq!(counter.underflows(), 2);
    }

    #[test]
    fn test_snapshot_and_reset() {
        let mut counter = PopulationCounter::new();
        counter.on_admitted(ElfKind::Red);
        counter.on_admitted(ElfKind::Red);
        counter.on_admitted(ElfKind::Black);

        let snapshot = counter.snapshot();
        assert_eq!(snapshot[&ElfKind::Red], 2);
        assert_eq!(snapshot[&ElfKind::White], 0);
        assert_eq!(counter.total(), 3);

        counter.reset();
        assert_eq!(counter.total(), 0);
    }

    proptest! {
        #[test]
        fn prop_count_tracks_floored_model(ops in proptest::collection::vec((0usize..4, any::<bool>()), 0..300)) {
            let mut counter = PopulationCounter::new();
            let mut model = [0i64; 4];

            for (index, admit) in ops {
                let kind = ElfKind::ALL[index];
                if admit {
                    counter.on_admitted(kind);
                    model[index] += 1;
                } else {
                    counter.on_destroyed(kind);
                    model[index] = (model[index] - 1).max(0);
                }
                prop_assert_eq!(i64::from(counter.count(kind)), model[index]);
            }
        }
    }
}
