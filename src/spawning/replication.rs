// src/spawning/replication.rs
//! Replication dispatcher
//!
//! Same-kind collisions do not spawn anything themselves. They post a
//! [`ReplicationRequest`] into the dispatcher's inbox, and the world drains
//! the inbox once per frame after collisions have been resolved. Each request
//! goes through the same admission gate and placement search as a periodic
//! spawn, seeded around the replication point instead of a spawner's area.

use crate::observability::names;
use crate::pool::object_pool::InstanceId;
use crate::simulation::elf::ElfKind;
use crate::simulation::events::SkipReason;
use crate::spawning::placement::PlacementRequest;
use crate::spawning::spawner::{spawn_elf, SpawnContext, SpawnOutcome, Spawner};
use crate::utils::math::Vec3;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// A request to bring one more elf of `kind` into the world near `position`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplicationRequest {
    pub kind: ElfKind,
    pub position: Vec3,

    /// Elf whose collision triggered the request, if any
    pub source: Option<InstanceId>,
}

/// Request paired with what came of it
#[derive(Debug)]
pub struct ReplicationResult {
    pub request: ReplicationRequest,
    pub outcome: SpawnOutcome,
}

/// Dispatcher statistics
#[derive(Debug, Clone, Default)]
pub struct ReplicationStats {
    pub received: u64,
    pub replicated: u64,
    pub rejected: u64,
}

/// Inbox of pending replication requests
#[derive(Debug, Default)]
pub struct ReplicationDispatcher {
    inbox: VecDeque<ReplicationRequest>,
    stats: ReplicationStats,
}

impl ReplicationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, request: ReplicationRequest) {
        self.stats.received += 1;
        self.inbox.push_back(request);
    }

    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    pub fn stats(&self) -> ReplicationStats {
        self.stats.clone()
    }

    /// Serve every queued request in arrival order
    pub fn dispatch(&mut self, spawners: &[Spawner], ctx: &mut SpawnContext<'_>) -> Vec<ReplicationResult> {
        let mut results = Vec::with_capacity(self.inbox.len());

        while let Some(request) = self.inbox.pop_front() {
            let outcome = self.serve(&request, spawners, ctx);
            match &outcome {
                SpawnOutcome::Spawned(_) => self.stats.replicated += 1,
                SpawnOutcome::Skipped(_) => self.stats.rejected += 1,
            }
            results.push(ReplicationResult { request, outcome });
        }

        results
    }

    fn serve(
        &self,
        request: &ReplicationRequest,
        spawners: &[Spawner],
        ctx: &mut SpawnContext<'_>,
    ) -> SpawnOutcome {
        let Some(spawner) = spawners.iter().find(|spawner| spawner.kind() == request.kind) else {
            warn!("No spawn config for {:?}, dropping replication", request.kind);
            return SpawnOutcome::Skipped(SkipReason::NoConfig);
        };

        let placement = PlacementRequest::around(request.position, ctx.placement.replication_radius)
            .with_clearance(ctx.placement.obstacle_clearance)
            .with_attempts(ctx.placement.max_attempts)
            .with_ground_offset(ctx.ground_offset);

        let outcome = spawn_elf(ctx, request.kind, spawner.cap(), &placement);
        if let SpawnOutcome::Spawned(elf) = &outcome {
            elf.play_spawn_effect();
            metrics::counter!(names::REPLICATED, "kind" => request.kind.as_str()).increment(1);
            debug!("Replicated {:?} as {} at {:?}", request.kind, elf.id(), elf.position);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::FlatTerrain;
    use crate::movement::boundary::ArenaBounds;
    use crate::simulation::population::PopulationCounter;
    use crate::spawning::factory::ElfFactory;
    use crate::utils::config::{ArenaConfig, EffectsConfig, ElfConfig, PlacementConfig, SpawnerConfig};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn request(kind: ElfKind) -> ReplicationRequest {
        ReplicationRequest {
            kind,
            position: Vec3::flat(2.0, 2.0),
            source: None,
        }
    }

    fn run(
        dispatcher: &mut ReplicationDispatcher,
        spawners: &[Spawner],
        factory: &mut ElfFactory,
        population: &mut PopulationCounter,
        terrain: &FlatTerrain,
    ) -> Vec<ReplicationResult> {
        let bounds = ArenaBounds::from_config(&ArenaConfig::default());
        let placement = PlacementConfig::default();
        let mut rng = SmallRng::seed_from_u64(9);
        let mut ctx = SpawnContext {
            factory,
            population,
            terrain,
            bounds: &bounds,
            placement: &placement,
            ground_offset: 0.1,
            spawn_duration: 2.0,
            rng: &mut rng,
        };
        dispatcher.dispatch(spawners, &mut ctx)
    }

    fn factory() -> ElfFactory {
        let configs: Vec<ElfConfig> = ElfKind::ALL.iter().map(|kind| ElfConfig::for_kind(*kind)).collect();
        ElfFactory::from_configs(EffectsConfig::default(), &configs)
    }

    #[test]
    fn test_replicates_near_request_and_plays_spawn_effect() {
        let mut dispatcher = ReplicationDispatcher::new();
        let spawners = vec![Spawner::new(SpawnerConfig::for_kind(ElfKind::Red, Vec3::ZERO))];
        let mut factory = factory();
        let mut population = PopulationCounter::new();

        dispatcher.submit(request(ElfKind::Red));
        let results = run(&mut dispatcher, &spawners, &mut factory, &mut population, &FlatTerrain::new(0.0));

        assert_eq!(results.len(), 1);
        let SpawnOutcome::Spawned(elf) = &results[0].outcome else {
            panic!("expected a replica");
        };
        assert!(elf.position.planar_distance(Vec3::flat(2.0, 2.0)) <= 5.0 * std::f32::consts::SQRT_2);
        assert_eq!(population.count(ElfKind::Red), 1);
        assert_eq!(dispatcher.pending(), 0);

        assert_eq!(factory.effects_mut().process(0.0), 1);
    }

    #[test]
    fn test_admission_gate_blocks_replication() {
        let mut dispatcher = ReplicationDispatcher::new();
        let mut config = SpawnerConfig::for_kind(ElfKind::White, Vec3::ZERO);
        config.max_entities = 3;
        let spawners = vec![Spawner::new(config)];
        let mut factory = factory();
        let mut population = PopulationCounter::new();
        for _ in 0..3 {
            population.on_admitted(ElfKind::White);
        }

        dispatcher.submit(request(ElfKind::White));
        let results = run(&mut dispatcher, &spawners, &mut factory, &mut population, &FlatTerrain::new(0.0));

        assert!(matches!(results[0].outcome, SpawnOutcome::Skipped(SkipReason::PopulationCap)));
        assert_eq!(population.count(ElfKind::White), 3);
        assert_eq!(factory.pool_stats(ElfKind::White).unwrap().gets, 0);
        assert_eq!(dispatcher.stats().rejected, 1);
    }

    #[test]
    fn test_missing_config_is_dropped() {
        let mut dispatcher = ReplicationDispatcher::new();
        let mut factory = factory();
        let mut population = PopulationCounter::new();

        dispatcher.submit(request(ElfKind::Blue));
        let results = run(&mut dispatcher, &[], &mut factory, &mut population, &FlatTerrain::new(0.0));
        assert!(matches!(results[0].outcome, SpawnOutcome::Skipped(SkipReason::NoConfig)));
    }

    #[test]
    fn test_unplaceable_replica_goes_back() {
        let mut dispatcher = ReplicationDispatcher::new();
        let spawners = vec![Spawner::new(SpawnerConfig::for_kind(ElfKind::Red, Vec3::ZERO))];
        let mut factory = factory();
        let mut population = PopulationCounter::new();
        let terrain = FlatTerrain::new(0.0).with_obstacle(Vec3::flat(2.0, 2.0), 50.0);

        dispatcher.submit(request(ElfKind::Red));
        let results = run(&mut dispatcher, &spawners, &mut factory, &mut population, &terrain);

        assert!(matches!(results[0].outcome, SpawnOutcome::Skipped(SkipReason::NoPosition)));
        assert_eq!(population.count(ElfKind::Red), 0);
        assert_eq!(factory.pool_stats(ElfKind::Red).unwrap().checked_out, 0);
        // no spawn effect for a failed replica
        assert_eq!(factory.effects_mut().process(0.0), 0);
    }
}
