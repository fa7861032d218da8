// src/spawning/factory.rs
//! Elf factory
//!
//! Maps an elf kind to its pool and performs the cross-wiring a freshly drawn
//! elf needs before it enters the world. The pools themselves know nothing
//! about effects; the factory injects the effect channel on every draw.
//!
//! # Architecture
//!
//! ```text
//! ElfFactory
//! ├─ pools:   {Red → ObjectPool<Elf>, Blue → ObjectPool<Elf>, ...}
//! ├─ owners:  {pool2 → Red, pool3 → Blue, ...}   (routing returns home)
//! └─ effects: ParticleEffects (explosion + spawn pools)
//! ```

use crate::observability::names;
use crate::pool::object_pool::{ObjectPool, PoolConfig, PoolId, PoolStats, Poolable};
use crate::pool::particle_effects::ParticleEffects;
use crate::simulation::elf::{Elf, ElfKind};
use crate::utils::config::{EffectsConfig, ElfConfig};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Pool ids reserved for the effect pools
const EXPLOSION_POOL: PoolId = PoolId(0);
const SPAWN_POOL: PoolId = PoolId(1);
const FIRST_ELF_POOL: u16 = 2;

/// Kind-to-pool registry
pub struct ElfFactory {
    pools: HashMap<ElfKind, ObjectPool<Elf>>,
    owners: HashMap<PoolId, ElfKind>,
    effects: ParticleEffects,
    next_pool_id: u16,
}

impl ElfFactory {
    /// Factory with effect pools and no elf pools yet
    pub fn new(effects: EffectsConfig) -> Self {
        Self {
            pools: HashMap::new(),
            owners: HashMap::new(),
            effects: ParticleEffects::new(EXPLOSION_POOL, SPAWN_POOL, effects),
            next_pool_id: FIRST_ELF_POOL,
        }
    }

    /// Factory with one pool per configured kind
    pub fn from_configs<'a>(effects: EffectsConfig, elves: impl IntoIterator<Item = &'a ElfConfig>) -> Self {
        let mut factory = Self::new(effects);
        for config in elves {
            factory.register(config);
        }
        factory
    }

    /// Create (or replace) the pool for `config.kind`
    pub fn register(&mut self, config: &ElfConfig) -> PoolId {
        if let Some(stats) = self.unregister(config.kind) {
            debug!("Replaced {:?} pool ({} constructed)", config.kind, stats.constructed);
        }

        let id = PoolId(self.next_pool_id);
        self.next_pool_id = self.next_pool_id.wrapping_add(1);

        let kind = config.kind;
        let color = config.color;
        let pool = ObjectPool::new(
            id,
            PoolConfig::new(format!("{} elves", kind), config.initial_pool_size)
                .with_max_size(config.max_pool_size),
            move |instance| Elf::new(instance, kind, color),
        );

        self.pools.insert(kind, pool);
        self.owners.insert(id, kind);
        info!("Registered {:?} elf pool {} (seed {})", kind, id, config.initial_pool_size);
        id
    }

    /// Tear down the pool for `kind`. Elves still checked out from it can
    /// no longer be returned.
    pub fn unregister(&mut self, kind: ElfKind) -> Option<PoolStats> {
        let pool = self.pools.remove(&kind)?;
        self.owners.remove(&pool.id());
        let stats = pool.teardown();
        if stats.checked_out > 0 {
            warn!(
                "{:?} pool torn down with {} elves still in the world",
                kind, stats.checked_out
            );
        }
        Some(stats)
    }

    pub fn is_registered(&self, kind: ElfKind) -> bool {
        self.pools.contains_key(&kind)
    }

    /// Draw an elf of `kind`, wired with the effect channel.
    /// `None` when the kind has no pool or its pool is exhausted.
    pub fn create(&mut self, kind: ElfKind) -> Option<Elf> {
        let Some(pool) = self.pools.get_mut(&kind) else {
            warn!("No pool registered for {:?} elves", kind);
            return None;
        };

        match pool.get() {
            Some(mut elf) => {
                elf.bind_effects(self.effects.channel());
                Some(elf)
            }
            None => {
                metrics::counter!(names::POOL_EXHAUSTED, "kind" => kind.as_str()).increment(1);
                None
            }
        }
    }

    /// Send an elf back to the pool that built it.
    /// Hands the elf back when that pool no longer exists.
    pub fn release(&mut self, elf: Elf) -> Result<(), Elf> {
        let Some(pool_id) = elf.pool() else {
            return Err(elf);
        };
        let Some(kind) = self.owners.get(&pool_id).copied() else {
            return Err(elf);
        };
        let Some(pool) = self.pools.get_mut(&kind) else {
            return Err(elf);
        };

        if let Err(e) = pool.release(elf) {
            warn!("{:?} pool rejected a return: {}", kind, e);
        }
        Ok(())
    }

    pub fn effects(&self) -> &ParticleEffects {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut ParticleEffects {
        &mut self.effects
    }

    pub fn pool_stats(&self, kind: ElfKind) -> Option<PoolStats> {
        self.pools.get(&kind).map(|pool| pool.stats())
    }

    /// Stats for every registered elf pool
    pub fn all_pool_stats(&self) -> BTreeMap<ElfKind, PoolStats> {
        self.pools
            .iter()
            .map(|(kind, pool)| (*kind, pool.stats()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::math::Vec3;

    fn factory() -> ElfFactory {
        let configs: Vec<ElfConfig> = ElfKind::ALL.iter().map(|kind| ElfConfig::for_kind(*kind)).collect();
        ElfFactory::from_configs(EffectsConfig::default(), &configs)
    }

    #[test]
    fn test_create_wires_pool_and_effects() {
        let mut factory = factory();
        let elf = factory.create(ElfKind::Red).unwrap();

        assert_eq!(elf.kind(), ElfKind::Red);
        assert!(elf.pool().is_some());
        assert!(elf.has_effects());
        assert_eq!(factory.pool_stats(ElfKind::Red).unwrap().checked_out, 1);
    }

    #[test]
    fn test_release_routes_home() {
        let mut factory = factory();
        let red = factory.create(ElfKind::Red).unwrap();
        let blue = factory.create(ElfKind::Blue).unwrap();

        assert!(factory.release(blue).is_ok());
        assert!(factory.release(red).is_ok());
        assert_eq!(factory.pool_stats(ElfKind::Red).unwrap().checked_out, 0);
        assert_eq!(factory.pool_stats(ElfKind::Blue).unwrap().returns, 1);
    }

    #[test]
    fn test_missing_pool_yields_nothing() {
        let mut factory = ElfFactory::new(EffectsConfig::default());
        assert!(factory.create(ElfKind::White).is_none());
    }

    #[test]
    fn test_unregister_strands_checked_out_elves() {
        let mut factory = factory();
        let mut elf = factory.create(ElfKind::White).unwrap();
        elf.activate(Vec3::ZERO, 1.0);

        let stats = factory.unregister(ElfKind::White).unwrap();
        assert_eq!(stats.checked_out, 1);
        assert!(!factory.is_registered(ElfKind::White));

        let stranded = factory.release(elf).unwrap_err();
        assert!(stranded.is_active());
    }

    #[test]
    fn test_reregister_gets_fresh_pool_id() {
        let mut factory = factory();
        let old = factory.create(ElfKind::Black).unwrap();
        let config = ElfConfig::for_kind(ElfKind::Black);
        let new_id = factory.register(&config);

        assert_ne!(old.pool(), Some(new_id));
        assert!(factory.release(old).is_err());
    }
}
