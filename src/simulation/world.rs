// src/simulation/world.rs
//! The simulation world
//!
//! One [`World`] is one session: it owns every pool, the population ledger,
//! the collision dedup set, the deferred-action queue and the spawners. There
//! is no global state, so several worlds can run side by side.
//!
//! # Frame
//!
//! ```text
//! tick(dt)
//!  1. advance clock
//!  2. deferred actions      (explosion → pool return, re-validated)
//!  3. dedup expiry + sweep
//!  4. state timers          (Spawning/Replicating → Idle)
//!  5. movement              (exploding elves are frozen)
//!  6. contact detection     (both participants report; dedup decides)
//!  7. replication inbox, then periodic spawners
//!  8. effect pools
//! ```
//!
//! Everything runs on the caller's thread. Hosts that step the world from a
//! timer task share it behind a mutex.

use crate::interfaces::{ElfView, FlatTerrain, NullView, Terrain};
use crate::movement::boundary::ArenaBounds;
use crate::movement::motion::{MotionContext, MotionParams};
use crate::observability::names;
use crate::pool::object_pool::{InstanceId, PoolId, PoolStats, Poolable};
use crate::pool::particle_effects::{EffectStats, ParticleEffects};
use crate::simulation::collision::{CollisionRegistry, CollisionStats};
use crate::simulation::elf::{Elf, ElfKind};
use crate::simulation::events::{EventQueue, QueueStats, SkipReason, TimedEvent, WorldEvent};
use crate::simulation::population::PopulationCounter;
use crate::simulation::scheduler::TimerQueue;
use crate::simulation::state_machine::ElfState;
use crate::spawning::factory::ElfFactory;
use crate::spawning::replication::{ReplicationDispatcher, ReplicationRequest, ReplicationStats};
use crate::spawning::spawner::{SpawnContext, SpawnOutcome, Spawner};
use crate::utils::config::{ElfConfig, EngineConfig};
use crate::utils::errors::Result;
use crate::utils::math::Vec3;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tracing::{debug, info, info_span, trace, warn, Span};
use ulid::Ulid;

/// Work scheduled for a later frame
#[derive(Debug, Clone, Copy)]
enum Deferred {
    /// Send an exploded elf home, if it is still the same activation
    ReturnToPool { id: InstanceId, activation: u32 },
}

/// Why a reported contact changed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    SelfContact,

    /// One of the ids is not in the world
    Unknown,

    /// One of the elves is not idle
    NotIdle,
}

/// What a reported contact did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionOutcome {
    Ignored(IgnoreReason),

    /// Already resolved within the suppression window
    Duplicate,

    Replicated,
    Exploded,
}

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub frame: u64,
    pub time: f64,
    pub spawned: usize,
    pub replicated: usize,
    pub skipped: usize,
    pub replication_pairs: usize,
    pub explosion_pairs: usize,
    pub duplicates: usize,
    pub destroyed: usize,
    pub effects_started: usize,
    pub live: usize,
}

#[derive(Debug, Clone, Default)]
struct WorldCounters {
    spawned: u64,
    replicated: u64,
    skipped: u64,
    replication_pairs: u64,
    explosion_pairs: u64,
    ignored_contacts: u64,
    destroyed: u64,
    inert: u64,
}

/// Session-wide statistics
#[derive(Debug, Clone)]
pub struct WorldStats {
    pub session_id: String,
    pub frames: u64,
    pub time: f64,

    /// Elves activated, periodic and replicated
    pub spawned: u64,

    /// Of those, created by replication
    pub replicated: u64,

    /// Spawn attempts that produced nothing
    pub skipped: u64,

    pub replication_pairs: u64,
    pub explosion_pairs: u64,
    pub ignored_contacts: u64,

    /// Exploded elves taken out of the world
    pub destroyed: u64,

    /// Elves stranded without a pool
    pub inert: u64,

    pub live: usize,
    pub population: BTreeMap<ElfKind, u32>,
    pub pools: BTreeMap<ElfKind, PoolStats>,
    pub effects: EffectStats,
    pub collisions: CollisionStats,
    pub replication: ReplicationStats,
    pub events: QueueStats,
}

/// Simulation session
pub struct World {
    session_id: Ulid,
    span: Span,
    config: EngineConfig,
    elf_configs: HashMap<ElfKind, ElfConfig>,
    bounds: ArenaBounds,

    now: f64,
    frame: u64,

    factory: ElfFactory,
    elves: BTreeMap<InstanceId, Elf>,
    inert: Vec<Elf>,
    population: PopulationCounter,
    collisions: CollisionRegistry,
    timers: TimerQueue<Deferred>,
    spawners: Vec<Spawner>,
    replication: ReplicationDispatcher,

    events: EventQueue,
    next_event: u64,
    events_overflowing: bool,

    terrain: Box<dyn Terrain>,
    view: Box<dyn ElfView>,
    rng: SmallRng,

    counters: WorldCounters,
    summary: TickSummary,
}

impl World {
    /// Build a world from a validated configuration.
    ///
    /// Starts on flat ground covering the arena with no view attached.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let session_id = Ulid::new();
        let span = info_span!("world", session = %session_id);

        let rng = match config.session.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        let arena = &config.arena;
        let terrain = FlatTerrain::new(0.0).with_extent(
            Vec3::flat(arena.min_x, arena.min_z),
            Vec3::flat(arena.max_x, arena.max_z),
        );

        let factory = ElfFactory::from_configs(config.effects.clone(), &config.elves);
        let collisions = CollisionRegistry::new(
            config.timing.dedup_window,
            config.collision_cleanup_interval(),
        );
        let spawners = config.spawners.iter().cloned().map(Spawner::new).collect();
        let elf_configs = config
            .elves
            .iter()
            .map(|elf| (elf.kind, elf.clone()))
            .collect();

        info!(
            parent: &span,
            "World ready: {} elf kinds, {} spawners, arena {}x{}",
            config.elves.len(),
            config.spawners.len(),
            arena.max_x - arena.min_x,
            arena.max_z - arena.min_z
        );

        Ok(Self {
            session_id,
            span,
            bounds: ArenaBounds::from_config(&config.arena),
            events: EventQueue::new(config.session.event_queue_capacity),
            elf_configs,
            factory,
            collisions,
            spawners,
            config,
            now: 0.0,
            frame: 0,
            elves: BTreeMap::new(),
            inert: Vec::new(),
            population: PopulationCounter::new(),
            timers: TimerQueue::new(),
            replication: ReplicationDispatcher::new(),
            next_event: 0,
            events_overflowing: false,
            terrain: Box::new(terrain),
            view: Box::new(NullView),
            rng,
            counters: WorldCounters::default(),
            summary: TickSummary::default(),
        })
    }

    pub fn with_terrain(mut self, terrain: impl Terrain + 'static) -> Self {
        self.terrain = Box::new(terrain);
        self
    }

    pub fn with_view(mut self, view: impl ElfView + 'static) -> Self {
        self.view = Box::new(view);
        self
    }

    /// Reseed the world's random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn session_id(&self) -> Ulid {
        self.session_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bounds(&self) -> &ArenaBounds {
        &self.bounds
    }

    /// Simulation time (seconds)
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn elf(&self, id: InstanceId) -> Option<&Elf> {
        self.elves.get(&id)
    }

    /// Elves in the world, in id order
    pub fn elves(&self) -> impl Iterator<Item = &Elf> {
        self.elves.values()
    }

    pub fn live_count(&self) -> usize {
        self.elves.len()
    }

    pub fn inert_count(&self) -> usize {
        self.inert.len()
    }

    pub fn population(&self, kind: ElfKind) -> u32 {
        self.population.count(kind)
    }

    pub fn spawners(&self) -> &[Spawner] {
        &self.spawners
    }

    pub fn effects(&self) -> &ParticleEffects {
        self.factory.effects()
    }

    pub fn pool_stats(&self, kind: ElfKind) -> Option<PoolStats> {
        self.factory.pool_stats(kind)
    }

    /// Handle to the event queue, shareable with other threads
    pub fn event_queue(&self) -> EventQueue {
        self.events.clone()
    }

    /// Take every queued event
    pub fn drain_events(&mut self) -> Vec<TimedEvent> {
        self.events.drain()
    }

    /// Step the world by `dt` seconds
    pub fn tick(&mut self, dt: f32) -> TickSummary {
        let started = Instant::now();
        let span = self.span.clone();
        let _guard = span.enter();

        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.frame += 1;
        self.now += f64::from(dt);
        self.summary = TickSummary {
            frame: self.frame,
            time: self.now,
            ..Default::default()
        };

        self.run_deferred();
        self.collisions.expire(self.now);
        self.update_states(dt);
        self.move_elves(dt);
        if self.config.arena.detect_contacts {
            self.detect_contacts();
        }
        self.run_spawning(dt);
        self.summary.effects_started = self.factory.effects_mut().process(self.now);

        self.summary.live = self.elves.len();
        metrics::histogram!(names::TICK_SECONDS).record(started.elapsed().as_secs_f64());
        trace!(
            "Frame {} done: {} live, {} spawned, {} destroyed",
            self.frame,
            self.summary.live,
            self.summary.spawned,
            self.summary.destroyed
        );

        std::mem::take(&mut self.summary)
    }

    /// Place an elf of `kind` directly at `position`, bypassing the
    /// placement search but not the population cap. The height follows
    /// the ground when there is any.
    pub fn spawn_at(&mut self, kind: ElfKind, position: Vec3) -> Option<InstanceId> {
        let cap = self.cap(kind);
        if !self.population.can_admit(kind, cap) {
            debug!("{:?} at population cap ({}), spawn_at refused", kind, cap);
            self.note_skip(kind, SkipReason::PopulationCap, false);
            return None;
        }

        let Some(mut elf) = self.factory.create(kind) else {
            self.note_skip(kind, SkipReason::NoInstance, false);
            return None;
        };

        let mut placed = position;
        if let Some(ground) = self.terrain.probe_ground_height(position) {
            placed.y = ground + self.config.arena.ground_offset;
        }

        elf.activate(placed, self.config.timing.spawn_duration);
        self.population.on_admitted(kind);
        metrics::counter!(names::SPAWNED, "kind" => kind.as_str()).increment(1);
        Some(self.admit(elf, false))
    }

    /// Queue a replication for the next tick
    pub fn request_replication(&mut self, kind: ElfKind, position: Vec3) {
        self.replication.submit(ReplicationRequest {
            kind,
            position,
            source: None,
        });
    }

    /// Resolve a contact reported by `reporter` against `other`.
    ///
    /// Both idle elves are required before the pair is claimed; a claimed
    /// pair is ignored until its suppression window ends.
    pub fn handle_collision(&mut self, reporter: InstanceId, other: InstanceId) -> CollisionOutcome {
        if reporter == other {
            return CollisionOutcome::Ignored(IgnoreReason::SelfContact);
        }

        let (Some(first), Some(second)) = (self.elves.get(&reporter), self.elves.get(&other)) else {
            self.counters.ignored_contacts += 1;
            return CollisionOutcome::Ignored(IgnoreReason::Unknown);
        };

        if !first.can_collide() || !second.can_collide() {
            self.counters.ignored_contacts += 1;
            return CollisionOutcome::Ignored(IgnoreReason::NotIdle);
        }

        let kind = first.kind();
        let same_kind = kind == second.kind();
        let position = first.position;

        if self.collisions.try_claim(reporter, other, self.now).is_none() {
            self.summary.duplicates += 1;
            metrics::counter!(names::DUPLICATE_COLLISIONS).increment(1);
            return CollisionOutcome::Duplicate;
        }

        if same_kind {
            self.replicate_pair(reporter, other, kind, position);
            CollisionOutcome::Replicated
        } else {
            self.counters.explosion_pairs += 1;
            self.summary.explosion_pairs += 1;
            self.explode(reporter);
            self.explode(other);
            CollisionOutcome::Exploded
        }
    }

    /// Blow an elf up. False when it is unknown or already exploding.
    pub fn explode(&mut self, id: InstanceId) -> bool {
        let Some(elf) = self.elves.get_mut(&id) else {
            return false;
        };
        if elf.explode().is_none() {
            return false;
        }

        let kind = elf.kind();
        let activation = elf.activation();
        self.view.set_walking(id, false);
        metrics::counter!(names::EXPLODED, "kind" => kind.as_str()).increment(1);

        let due = self.now + f64::from(self.config.timing.explode_delay);
        self.timers
            .schedule(due, Deferred::ReturnToPool { id, activation });
        debug!("{} ({:?}) exploding, back to pool at t={:.3}", id, kind, due);
        true
    }

    /// Bounce an elf off a rock it touched. Not a lifecycle event.
    pub fn report_obstacle_contact(&mut self, id: InstanceId, obstacle: Vec3) -> bool {
        let Some(elf) = self.elves.get_mut(&id) else {
            return false;
        };
        if elf.state() == ElfState::Exploding {
            return false;
        }

        let hold = self
            .elf_configs
            .get(&elf.kind())
            .map(|config| config.direction_change_interval)
            .unwrap_or(0.0);
        elf.position = elf.motion.bounce(elf.position, obstacle, self.now, hold);
        true
    }

    /// Change a spawner's interval at runtime. Returns the interval in
    /// effect, or `None` when no spawner serves `kind`.
    pub fn set_spawn_interval(&mut self, kind: ElfKind, interval: f32) -> Option<f32> {
        let spawner = self.spawners.iter_mut().find(|spawner| spawner.kind() == kind)?;
        let applied = spawner.set_spawn_interval(interval);
        if let Some(config) = self.config.spawners.iter_mut().find(|config| config.kind == kind) {
            config.spawn_interval = applied;
        }
        Some(applied)
    }

    /// Tear down a kind's pool. Its elves keep running but go inert
    /// instead of returning home.
    pub fn unregister_pool(&mut self, kind: ElfKind) -> Option<PoolStats> {
        self.factory.unregister(kind)
    }

    /// Create or replace a kind's pool and behaviour
    pub fn register_pool(&mut self, config: ElfConfig) -> PoolId {
        let id = self.factory.register(&config);
        self.elf_configs.insert(config.kind, config);
        id
    }

    pub fn stats(&self) -> WorldStats {
        WorldStats {
            session_id: self.session_id.to_string(),
            frames: self.frame,
            time: self.now,
            spawned: self.counters.spawned,
            replicated: self.counters.replicated,
            skipped: self.counters.skipped,
            replication_pairs: self.counters.replication_pairs,
            explosion_pairs: self.counters.explosion_pairs,
            ignored_contacts: self.counters.ignored_contacts,
            destroyed: self.counters.destroyed,
            inert: self.counters.inert,
            live: self.elves.len(),
            population: self.population.snapshot(),
            pools: self.factory.all_pool_stats(),
            effects: self.factory.effects().stats(),
            collisions: self.collisions.stats(),
            replication: self.replication.stats(),
            events: self.events.stats(),
        }
    }

    fn cap(&self, kind: ElfKind) -> u32 {
        self.spawners
            .iter()
            .find(|spawner| spawner.kind() == kind)
            .map(|spawner| spawner.cap())
            .unwrap_or(u32::MAX)
    }

    fn replicate_pair(&mut self, a: InstanceId, b: InstanceId, kind: ElfKind, position: Vec3) {
        let cooldown = self
            .elf_configs
            .get(&kind)
            .map(|config| config.replication_cooldown)
            .unwrap_or(0.0);

        for id in [a, b] {
            if let Some(elf) = self.elves.get_mut(&id) {
                if elf.replicate(cooldown).is_some() {
                    elf.apply_visuals(&mut *self.view);
                }
            }
        }

        self.counters.replication_pairs += 1;
        self.summary.replication_pairs += 1;
        self.replication.submit(ReplicationRequest {
            kind,
            position,
            source: Some(a),
        });
        self.emit(WorldEvent::ReplicationRequested { kind, position });
        debug!("{} and {} replicating ({:?})", a, b, kind);
    }

    fn run_deferred(&mut self) {
        for action in self.timers.drain_due(self.now) {
            match action {
                Deferred::ReturnToPool { id, activation } => self.return_to_pool(id, activation),
            }
        }
    }

    fn return_to_pool(&mut self, id: InstanceId, activation: u32) {
        let current = matches!(
            self.elves.get(&id),
            Some(elf) if elf.activation() == activation && elf.state() == ElfState::Exploding
        );
        if !current {
            trace!("Stale pool return for {} ignored", id);
            return;
        }
        let Some(elf) = self.elves.remove(&id) else {
            return;
        };

        let kind = elf.kind();
        self.population.on_destroyed(kind);
        self.counters.destroyed += 1;
        self.summary.destroyed += 1;
        metrics::counter!(names::DESTROYED, "kind" => kind.as_str()).increment(1);
        self.emit(WorldEvent::EntityDestroyed { id, kind });

        if let Err(mut stranded) = self.factory.release(elf) {
            warn!("{} ({:?}) has no pool to return to, leaving it inert", id, kind);
            stranded.on_return();
            self.counters.inert += 1;
            metrics::counter!(names::INERT).increment(1);
            self.inert.push(stranded);
        }
    }

    fn update_states(&mut self, dt: f32) {
        for elf in self.elves.values_mut() {
            if elf.update(dt).is_some() {
                elf.apply_visuals(&mut *self.view);
            }
        }
    }

    fn move_elves(&mut self, dt: f32) {
        let targets: Vec<(InstanceId, ElfKind, Vec3)> = self
            .elves
            .values()
            .filter(|elf| elf.state() != ElfState::Exploding)
            .map(|elf| (elf.id(), elf.kind(), elf.position))
            .collect();

        let ctx = MotionContext {
            now: self.now,
            dt,
            bounds: &self.bounds,
            terrain: &*self.terrain,
            ground_offset: self.config.arena.ground_offset,
            max_step_height: self.config.arena.max_step_height,
            boundary_hold: self.config.timing.boundary_direction_hold,
        };

        for elf in self.elves.values_mut() {
            if elf.state() == ElfState::Exploding {
                continue;
            }
            let Some(config) = self.elf_configs.get(&elf.kind()) else {
                continue;
            };

            let target = config
                .movement
                .target_query()
                .and_then(|(kind, radius)| nearest(&targets, elf.id(), kind, elf.position, radius));

            let params = MotionParams {
                strategy: &config.movement,
                speed: config.move_speed,
                direction_change_interval: config.direction_change_interval,
                target,
            };
            let step = elf.motion.advance(elf.position, &params, &ctx, &mut self.rng);
            elf.position = step.position;
            self.view.set_walking(elf.id(), step.walking);
        }
    }

    fn detect_contacts(&mut self) {
        let radius = self.config.arena.contact_radius;
        let idle: Vec<(InstanceId, Vec3)> = self
            .elves
            .values()
            .filter(|elf| elf.can_collide())
            .map(|elf| (elf.id(), elf.position))
            .collect();

        let mut contacts = Vec::new();
        for (i, (a, pos_a)) in idle.iter().enumerate() {
            for (b, pos_b) in &idle[i + 1..] {
                if pos_a.distance(*pos_b) <= radius {
                    contacts.push((*a, *b));
                }
            }
        }

        // each participant reports the contact
        for (a, b) in contacts {
            self.handle_collision(a, b);
            self.handle_collision(b, a);
        }
    }

    fn run_spawning(&mut self, dt: f32) {
        let mut outcomes: Vec<(ElfKind, SpawnOutcome, bool)> = Vec::new();
        {
            let mut ctx = SpawnContext {
                factory: &mut self.factory,
                population: &mut self.population,
                terrain: &*self.terrain,
                bounds: &self.bounds,
                placement: &self.config.placement,
                ground_offset: self.config.arena.ground_offset,
                spawn_duration: self.config.timing.spawn_duration,
                rng: &mut self.rng,
            };

            for result in self.replication.dispatch(&self.spawners, &mut ctx) {
                outcomes.push((result.request.kind, result.outcome, true));
            }

            for spawner in self.spawners.iter_mut() {
                if spawner.tick(dt) {
                    let outcome = spawner.spawn(&mut ctx);
                    outcomes.push((spawner.kind(), outcome, false));
                }
            }
        }

        for (kind, outcome, replicated) in outcomes {
            match outcome {
                SpawnOutcome::Spawned(elf) => {
                    self.admit(elf, replicated);
                }
                // a full kind would report on every interval
                SpawnOutcome::Skipped(SkipReason::PopulationCap) if !replicated => {
                    self.counters.skipped += 1;
                    self.summary.skipped += 1;
                }
                SpawnOutcome::Skipped(reason) => self.note_skip(kind, reason, replicated),
            }
        }
    }

    /// Put an activated, admitted elf into the world
    fn admit(&mut self, elf: Elf, replicated: bool) -> InstanceId {
        let id = elf.id();
        let kind = elf.kind();
        let position = elf.position;

        elf.apply_visuals(&mut *self.view);
        self.view.set_walking(id, false);
        if self.elves.insert(id, elf).is_some() {
            warn!("{} admitted twice", id);
        }

        self.counters.spawned += 1;
        self.summary.spawned += 1;
        if replicated {
            self.counters.replicated += 1;
            self.summary.replicated += 1;
        }

        self.emit(WorldEvent::EntitySpawned {
            id,
            kind,
            position,
            replicated,
        });
        id
    }

    fn note_skip(&mut self, kind: ElfKind, reason: SkipReason, replicated: bool) {
        self.counters.skipped += 1;
        self.summary.skipped += 1;
        self.emit(WorldEvent::SpawnSkipped {
            kind,
            reason,
            replicated,
        });
    }

    fn emit(&mut self, event: WorldEvent) {
        let timed = TimedEvent {
            sequence: self.next_event,
            frame: self.frame,
            time: self.now,
            event,
        };
        self.next_event += 1;

        // one warning per overflow; the queue's drop count keeps the total
        match self.events.push(timed) {
            Ok(()) => self.events_overflowing = false,
            Err(dropped) if self.events_overflowing => {
                trace!("Event queue still full, dropped {:?}", dropped.event);
            }
            Err(dropped) => {
                self.events_overflowing = true;
                warn!(
                    "Event queue full ({} slots), dropping events until drained; first dropped {:?}",
                    self.events.capacity(),
                    dropped.event
                );
            }
        }
    }
}

/// Closest elf of `kind` within `radius`, other than `me`
fn nearest(
    candidates: &[(InstanceId, ElfKind, Vec3)],
    me: InstanceId,
    kind: ElfKind,
    from: Vec3,
    radius: f32,
) -> Option<Vec3> {
    candidates
        .iter()
        .filter(|(id, candidate_kind, _)| *id != me && *candidate_kind == kind)
        .map(|(_, _, position)| (from.distance(*position), *position))
        .filter(|(distance, _)| *distance <= radius)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, position)| position)
}
