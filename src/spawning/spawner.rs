// src/spawning/spawner.rs
//! Periodic spawners
//!
//! Each spawner owns one kind's spawn config and a countdown. When the
//! countdown runs out it tries to bring one elf into the world:
//!
//! ```text
//! can_admit? ──no──► skip (cap)
//!     │ yes
//! factory.create ──none──► skip (no instance)
//!     │
//! find position ──none──► return elf to pool, skip (no position)
//!     │
//! activate + on_admitted
//! ```
//!
//! The same routine serves the replication dispatcher.

use crate::interfaces::Terrain;
use crate::movement::boundary::ArenaBounds;
use crate::observability::names;
use crate::simulation::elf::{Elf, ElfKind};
use crate::simulation::events::SkipReason;
use crate::simulation::population::PopulationCounter;
use crate::spawning::factory::ElfFactory;
use crate::spawning::placement::{find_spawn_position, PlacementRequest};
use crate::utils::config::{PlacementConfig, SpawnerConfig, MIN_SPAWN_INTERVAL_SECS};
use rand::rngs::SmallRng;
use tracing::{debug, info, warn};

/// Everything a spawn attempt touches
pub struct SpawnContext<'a> {
    pub factory: &'a mut ElfFactory,
    pub population: &'a mut PopulationCounter,
    pub terrain: &'a dyn Terrain,
    pub bounds: &'a ArenaBounds,
    pub placement: &'a PlacementConfig,
    pub ground_offset: f32,
    pub spawn_duration: f32,
    pub rng: &'a mut SmallRng,
}

/// Result of one spawn attempt
#[derive(Debug)]
pub enum SpawnOutcome {
    /// Activated and admitted; the caller puts it in the world
    Spawned(Elf),
    Skipped(SkipReason),
}

impl SpawnOutcome {
    pub fn is_spawned(&self) -> bool {
        matches!(self, SpawnOutcome::Spawned(_))
    }
}

/// Admit, draw, place and activate one elf
pub fn spawn_elf(
    ctx: &mut SpawnContext<'_>,
    kind: ElfKind,
    cap: u32,
    request: &PlacementRequest,
) -> SpawnOutcome {
    if !ctx.population.can_admit(kind, cap) {
        debug!("{:?} at population cap ({}), skipping spawn", kind, cap);
        return SpawnOutcome::Skipped(SkipReason::PopulationCap);
    }

    let Some(mut elf) = ctx.factory.create(kind) else {
        return SpawnOutcome::Skipped(SkipReason::NoInstance);
    };

    match find_spawn_position(ctx.terrain, ctx.bounds, request, &mut *ctx.rng) {
        Some(position) => {
            elf.activate(position, ctx.spawn_duration);
            ctx.population.on_admitted(kind);
            metrics::counter!(names::SPAWNED, "kind" => kind.as_str()).increment(1);
            SpawnOutcome::Spawned(elf)
        }
        None => {
            metrics::counter!(names::PLACEMENT_FAILURES, "kind" => kind.as_str()).increment(1);
            debug!(
                "No valid {:?} position near {:?} after {} attempts",
                kind, request.center, request.max_attempts
            );
            if let Err(elf) = ctx.factory.release(elf) {
                warn!("Unplaced {} has no pool to return to", elf.id());
            }
            SpawnOutcome::Skipped(SkipReason::NoPosition)
        }
    }
}

/// Per-spawner counters
#[derive(Debug, Clone, Default)]
pub struct SpawnerStats {
    pub spawned: u64,
    pub skipped: u64,
}

/// Periodic spawner for one kind
#[derive(Debug, Clone)]
pub struct Spawner {
    config: SpawnerConfig,

    /// Time until the next spawn (seconds)
    countdown: f32,

    stats: SpawnerStats,
}

impl Spawner {
    /// New spawner; its first spawn is due on the first tick
    pub fn new(config: SpawnerConfig) -> Self {
        Self {
            config,
            countdown: 0.0,
            stats: SpawnerStats::default(),
        }
    }

    pub fn kind(&self) -> ElfKind {
        self.config.kind
    }

    pub fn config(&self) -> &SpawnerConfig {
        &self.config
    }

    pub fn cap(&self) -> u32 {
        self.config.max_entities
    }

    pub fn interval(&self) -> f32 {
        self.config.spawn_interval
    }

    pub fn stats(&self) -> SpawnerStats {
        self.stats.clone()
    }

    /// Change the interval (clamped to the minimum) and restart the
    /// countdown so the next spawn is due immediately. Returns the interval
    /// in effect.
    pub fn set_spawn_interval(&mut self, interval: f32) -> f32 {
        let clamped = if interval.is_finite() {
            interval.max(MIN_SPAWN_INTERVAL_SECS)
        } else {
            MIN_SPAWN_INTERVAL_SECS
        };
        info!(
            "[{}] Spawn interval {:.2}s -> {:.2}s",
            self.config.name, self.config.spawn_interval, clamped
        );
        self.config.spawn_interval = clamped;
        self.countdown = 0.0;
        clamped
    }

    /// Advance the countdown; true when a spawn is due
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.config.enabled {
            return false;
        }

        self.countdown -= dt;
        if self.countdown <= 0.0 {
            self.countdown = self.config.spawn_interval;
            true
        } else {
            false
        }
    }

    /// Placement search for this spawner's area
    pub fn placement(&self, placement: &PlacementConfig, ground_offset: f32) -> PlacementRequest {
        PlacementRequest::area(self.config.location, self.config.spawn_area_size)
            .with_clearance(placement.obstacle_clearance)
            .with_attempts(placement.max_attempts)
            .with_ground_offset(ground_offset)
    }

    /// One spawn attempt in this spawner's area
    pub fn spawn(&mut self, ctx: &mut SpawnContext<'_>) -> SpawnOutcome {
        let request = self.placement(ctx.placement, ctx.ground_offset);
        let outcome = spawn_elf(ctx, self.config.kind, self.config.max_entities, &request);

        match &outcome {
            SpawnOutcome::Spawned(elf) => {
                self.stats.spawned += 1;
                debug!("[{}] Spawned {} at {:?}", self.config.name, elf.id(), elf.position);
            }
            SpawnOutcome::Skipped(_) => self.stats.skipped += 1,
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::FlatTerrain;
    use crate::pool::object_pool::Poolable;
    use crate::simulation::state_machine::ElfState;
    use crate::utils::config::{ArenaConfig, EffectsConfig, ElfConfig};
    use crate::utils::math::Vec3;
    use rand::SeedableRng;

    struct Fixture {
        factory: ElfFactory,
        population: PopulationCounter,
        terrain: FlatTerrain,
        bounds: ArenaBounds,
        placement: PlacementConfig,
        rng: SmallRng,
    }

    impl Fixture {
        fn new(terrain: FlatTerrain) -> Self {
            let configs: Vec<ElfConfig> = ElfKind::ALL.iter().map(|kind| ElfConfig::for_kind(*kind)).collect();
            Self {
                factory: ElfFactory::from_configs(EffectsConfig::default(), &configs),
                population: PopulationCounter::new(),
                terrain,
                bounds: ArenaBounds::from_config(&ArenaConfig::default()),
                placement: PlacementConfig::default(),
                rng: SmallRng::seed_from_u64(5),
            }
        }

        fn ctx(&mut self) -> SpawnContext<'_> {
            SpawnContext {
                factory: &mut self.factory,
                population: &mut self.population,
                terrain: &self.terrain,
                bounds: &self.bounds,
                placement: &self.placement,
                ground_offset: 0.1,
                spawn_duration: 2.0,
                rng: &mut self.rng,
            }
        }
    }

    fn spawner(kind: ElfKind) -> Spawner {
        Spawner::new(SpawnerConfig::for_kind(kind, Vec3::flat(5.0, 5.0)))
    }

    #[test]
    fn test_first_spawn_due_immediately() {
        let mut spawner = spawner(ElfKind::Red);
        assert!(spawner.tick(0.016));
        assert!(!spawner.tick(1.0));
        assert!(spawner.tick(1.0));
    }

    #[test]
    fn test_disabled_spawner_never_fires() {
        let mut config = SpawnerConfig::for_kind(ElfKind::Red, Vec3::ZERO);
        config.enabled = false;
        let mut spawner = Spawner::new(config);
        assert!(!spawner.tick(10.0));
    }

    #[test]
    fn test_interval_change_clamps_and_restarts() {
        let mut spawner = spawner(ElfKind::Blue);
        assert!(spawner.tick(0.1));
        assert!(!spawner.tick(0.1));

        assert_eq!(spawner.set_spawn_interval(0.01), MIN_SPAWN_INTERVAL_SECS);
        assert!(spawner.tick(0.0));
        assert_eq!(spawner.set_spawn_interval(3.0), 3.0);
        assert_eq!(spawner.set_spawn_interval(f32::NAN), MIN_SPAWN_INTERVAL_SECS);
    }

    #[test]
    fn test_spawn_activates_and_admits() {
        let mut fixture = Fixture::new(FlatTerrain::new(0.0));
        let mut spawner = spawner(ElfKind::Red);

        let SpawnOutcome::Spawned(elf) = spawner.spawn(&mut fixture.ctx()) else {
            panic!("expected a spawn");
        };
        assert_eq!(elf.state(), ElfState::Spawning);
        assert!((elf.position.x - 5.0).abs() <= 2.5);
        assert!((elf.position.y - 0.1).abs() < 1e-5);
        assert_eq!(fixture.population.count(ElfKind::Red), 1);
        assert_eq!(spawner.stats().spawned, 1);
    }

    #[test]
    fn test_cap_blocks_spawn() {
        let mut fixture = Fixture::new(FlatTerrain::new(0.0));
        let mut config = SpawnerConfig::for_kind(ElfKind::White, Vec3::ZERO);
        config.max_entities = 1;
        let mut spawner = Spawner::new(config);

        assert!(spawner.spawn(&mut fixture.ctx()).is_spawned());
        assert!(matches!(
            spawner.spawn(&mut fixture.ctx()),
            SpawnOutcome::Skipped(SkipReason::PopulationCap)
        ));
        assert_eq!(fixture.population.count(ElfKind::White), 1);
        assert_eq!(fixture.factory.pool_stats(ElfKind::White).unwrap().gets, 1);
    }

    #[test]
    fn test_placement_failure_returns_elf_to_pool() {
        let terrain = FlatTerrain::new(0.0).with_obstacle(Vec3::flat(5.0, 5.0), 30.0);
        let mut fixture = Fixture::new(terrain);
        let mut spawner = spawner(ElfKind::Black);

        let outcome = spawner.spawn(&mut fixture.ctx());
        assert!(matches!(outcome, SpawnOutcome::Skipped(SkipReason::NoPosition)));
        assert_eq!(fixture.population.count(ElfKind::Black), 0);

        let stats = fixture.factory.pool_stats(ElfKind::Black).unwrap();
        assert_eq!(stats.gets, 1);
        assert_eq!(stats.returns, 1);
        assert_eq!(stats.checked_out, 0);

        // returned instance is inert and reusable
        let reused = fixture.factory.create(ElfKind::Black).unwrap();
        assert_eq!(reused.state(), ElfState::Inactive);
        assert!(reused.pool().is_some());
    }
}
