// src/utils/config.rs
//! Engine configuration
//!
//! Configuration is layered with the `config` crate:
//!
//! 1. Built-in defaults (serde `default` attributes on every section)
//! 2. Optional YAML/TOML/JSON file (`config/elves.*` or an explicit path)
//! 3. `ELVES_`-prefixed environment variables (`ELVES_SESSION__SEED=7`)
//!
//! Everything here is read-only to the simulation core, except the spawn
//! interval which the host may change at runtime through the world.

use crate::movement::strategy::MovementStrategy;
use crate::simulation::elf::ElfKind;
use crate::utils::errors::{EngineError, Result};
use crate::utils::math::{Color, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Default config file stem, resolved relative to the working directory
pub const DEFAULT_CONFIG_STEM: &str = "config/elves";

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "ELVES_CONFIG";

/// Minimum spawn interval accepted at runtime
pub const MIN_SPAWN_INTERVAL_SECS: f32 = 0.1;

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub session: SessionConfig,
    pub arena: ArenaConfig,
    pub timing: TimingConfig,
    pub placement: PlacementConfig,
    pub effects: EffectsConfig,
    pub elves: Vec<ElfConfig>,
    pub spawners: Vec<SpawnerConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let corners = [
            (ElfKind::Black, Vec3::flat(-15.0, -15.0)),
            (ElfKind::Red, Vec3::flat(15.0, -15.0)),
            (ElfKind::White, Vec3::flat(-15.0, 15.0)),
            (ElfKind::Blue, Vec3::flat(15.0, 15.0)),
        ];

        Self {
            session: SessionConfig::default(),
            arena: ArenaConfig::default(),
            timing: TimingConfig::default(),
            placement: PlacementConfig::default(),
            effects: EffectsConfig::default(),
            elves: ElfKind::ALL.iter().map(|kind| ElfConfig::for_kind(*kind)).collect(),
            spawners: corners
                .iter()
                .map(|(kind, location)| SpawnerConfig::for_kind(*kind, *location))
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Load from the default file (if present) and environment overrides
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => Self::build(
                ::config::Config::builder()
                    .add_source(::config::File::with_name(DEFAULT_CONFIG_STEM).required(false)),
            ),
        }
    }

    /// Load from an explicit file plus environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());

        Self::build(::config::Config::builder().add_source(::config::File::from(path)))
    }

    fn build(builder: ::config::ConfigBuilder<::config::builder::DefaultState>) -> Result<Self> {
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("ELVES")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Per-kind elf configuration
    pub fn elf(&self, kind: ElfKind) -> Option<&ElfConfig> {
        self.elves.iter().find(|elf| elf.kind == kind)
    }

    /// Per-kind spawner configuration
    pub fn spawner(&self, kind: ElfKind) -> Option<&SpawnerConfig> {
        self.spawners.iter().find(|spawner| spawner.kind == kind)
    }

    /// Interval of the safety-net sweep over the collision dedup set
    pub fn collision_cleanup_interval(&self) -> f32 {
        self.elves
            .iter()
            .map(|elf| elf.collision_cleanup_interval)
            .fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |a| a.min(v))))
            .unwrap_or(ElfConfig::DEFAULT_COLLISION_CLEANUP_INTERVAL)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(EngineError::ConfigError(msg));

        if self.session.tick_rate_hz == 0 {
            return invalid("tick rate cannot be 0".to_string());
        }
        if self.session.event_queue_capacity == 0 {
            return invalid("event queue capacity cannot be 0".to_string());
        }
        if !self.session.report_interval_secs.is_finite() || self.session.report_interval_secs <= 0.0 {
            return invalid("session.report_interval_secs must be positive".to_string());
        }
        if let Some(limit) = self.session.run_seconds {
            if !limit.is_finite() || limit < 0.0 {
                return invalid("session.run_seconds must be a non-negative number".to_string());
            }
        }

        let arena = &self.arena;
        finite_all(
            "arena",
            &[
                ("min_x", arena.min_x),
                ("max_x", arena.max_x),
                ("min_z", arena.min_z),
                ("max_z", arena.max_z),
                ("boundary_margin", arena.boundary_margin),
                ("contact_radius", arena.contact_radius),
                ("ground_offset", arena.ground_offset),
                ("max_step_height", arena.max_step_height),
            ],
        )?;
        if arena.max_x - arena.min_x <= 2.0 * arena.boundary_margin
            || arena.max_z - arena.min_z <= 2.0 * arena.boundary_margin
        {
            return invalid("arena is empty once the boundary margin is applied".to_string());
        }
        if arena.contact_radius <= 0.0 {
            return invalid("contact radius must be positive".to_string());
        }

        let timing = &self.timing;
        let timings = [
            ("spawn_duration", timing.spawn_duration),
            ("explode_delay", timing.explode_delay),
            ("dedup_window", timing.dedup_window),
            ("boundary_direction_hold", timing.boundary_direction_hold),
        ];
        finite_all("timing", &timings)?;
        for (name, value) in timings {
            if value < 0.0 {
                return invalid(format!("timing.{} cannot be negative", name));
            }
        }

        let placement = &self.placement;
        if placement.max_attempts == 0 {
            return invalid("placement.max_attempts cannot be 0".to_string());
        }
        finite_all(
            "placement",
            &[
                ("obstacle_clearance", placement.obstacle_clearance),
                ("replication_radius", placement.replication_radius),
            ],
        )?;
        if placement.obstacle_clearance < 0.0 || placement.replication_radius < 0.0 {
            return invalid("placement distances cannot be negative".to_string());
        }

        let effects = &self.effects;
        let durations = [
            ("explosion_duration", effects.explosion_duration),
            ("spawn_duration", effects.spawn_duration),
            ("return_padding", effects.return_padding),
        ];
        finite_all("effects", &durations)?;
        for (name, value) in durations {
            if value < 0.0 {
                return invalid(format!("effects.{} cannot be negative", name));
            }
        }

        let mut seen = HashSet::new();
        for elf in &self.elves {
            if !seen.insert(elf.kind) {
                return invalid(format!("duplicate elf config for {:?}", elf.kind));
            }
            finite_all(
                &format!("elves.{}", elf.kind),
                &[
                    ("move_speed", elf.move_speed),
                    ("direction_change_interval", elf.direction_change_interval),
                    ("replication_cooldown", elf.replication_cooldown),
                    ("collision_cleanup_interval", elf.collision_cleanup_interval),
                ],
            )?;
            finite_all(&format!("elves.{}.movement", elf.kind), &elf.movement.parameters())?;
            if elf.move_speed < 0.0 {
                return invalid(format!("{:?} move speed cannot be negative", elf.kind));
            }
            if elf.direction_change_interval <= 0.0 || elf.collision_cleanup_interval <= 0.0 {
                return invalid(format!("{:?} intervals must be positive", elf.kind));
            }
            if elf.replication_cooldown < 0.0 {
                return invalid(format!("{:?} replication cooldown cannot be negative", elf.kind));
            }
            if let Some(max) = elf.max_pool_size {
                if max == 0 {
                    return invalid(format!("{:?} max pool size cannot be 0", elf.kind));
                }
            }
        }

        let mut seen = HashSet::new();
        for spawner in &self.spawners {
            if !seen.insert(spawner.kind) {
                return invalid(format!("duplicate spawner for {:?}", spawner.kind));
            }
            if self.elf(spawner.kind).is_none() {
                return invalid(format!("spawner {} has no elf config", spawner.name));
            }
            finite_all(
                &format!("spawner {}", spawner.name),
                &[
                    ("spawn_interval", spawner.spawn_interval),
                    ("location.x", spawner.location.x),
                    ("location.y", spawner.location.y),
                    ("location.z", spawner.location.z),
                    ("spawn_area_size.x", spawner.spawn_area_size.x),
                    ("spawn_area_size.z", spawner.spawn_area_size.z),
                ],
            )?;
            if spawner.spawn_interval < MIN_SPAWN_INTERVAL_SECS {
                return invalid(format!(
                    "spawner {} interval must be at least {}s",
                    spawner.name, MIN_SPAWN_INTERVAL_SECS
                ));
            }
            if spawner.spawn_area_size.x < 0.0 || spawner.spawn_area_size.z < 0.0 {
                return invalid(format!("spawner {} area cannot be negative", spawner.name));
            }
        }

        Ok(())
    }
}

/// Reject NaN and infinite values
fn finite_all(section: &str, values: &[(&str, f32)]) -> Result<()> {
    match values.iter().find(|(_, value)| !value.is_finite()) {
        Some((name, value)) => Err(EngineError::ConfigError(format!(
            "{}.{} must be a finite number, got {}",
            section, name, value
        ))),
        None => Ok(()),
    }
}

/// Session-level settings (runner and world plumbing)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,

    /// Simulation steps per second for the headless runner
    pub tick_rate_hz: u32,

    /// Stop the runner after this many simulated seconds
    pub run_seconds: Option<f64>,

    /// How often the runner logs a population report
    pub report_interval_secs: f64,

    /// Capacity of the outbound world event queue
    pub event_queue_capacity: usize,

    /// Prometheus exporter listen address (e.g. "0.0.0.0:9000")
    pub metrics_addr: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: None,
            tick_rate_hz: 60,
            run_seconds: None,
            report_interval_secs: 5.0,
            event_queue_capacity: 4096,
            metrics_addr: None,
        }
    }
}

/// Arena extent and contact settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,

    /// Inset applied to every wall
    pub boundary_margin: f32,

    /// Planar distance at which two elves touch
    pub contact_radius: f32,

    /// Run the built-in proximity check each tick; hosts with their own
    /// physics report contacts instead
    pub detect_contacts: bool,

    /// Height kept above the probed ground
    pub ground_offset: f32,

    /// Largest height change accepted from a single ground probe
    pub max_step_height: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            min_x: -25.0,
            max_x: 25.0,
            min_z: -25.0,
            max_z: 25.0,
            boundary_margin: 0.5,
            contact_radius: 0.6,
            detect_contacts: true,
            ground_offset: 0.1,
            max_step_height: 0.5,
        }
    }
}

/// Fixed lifecycle durations (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Time spent in `Spawning` after activation
    pub spawn_duration: f32,

    /// Delay between entering `Exploding` and returning to the pool
    pub explode_delay: f32,

    /// How long a resolved pair stays suppressed
    pub dedup_window: f32,

    /// Direction-change hold after bouncing off an arena wall
    pub boundary_direction_hold: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            spawn_duration: 2.0,
            explode_delay: 0.1,
            dedup_window: 0.1,
            boundary_direction_hold: 0.1,
        }
    }
}

/// Spawn position search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Candidate positions tried before giving up
    pub max_attempts: u32,

    /// Required distance from static obstacles
    pub obstacle_clearance: f32,

    /// Search radius around a replication's reference position
    pub replication_radius: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            obstacle_clearance: 1.0,
            replication_radius: 5.0,
        }
    }
}

/// Pooled visual effects
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub explosion_pool_size: usize,
    pub spawn_pool_size: usize,

    /// Natural playback length of each effect
    pub explosion_duration: f32,
    pub spawn_duration: f32,

    /// Extra time before an effect is reclaimed
    pub return_padding: f32,

    /// Upper bound on effect instances per pool
    pub max_pool_size: Option<usize>,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            explosion_pool_size: 10,
            spawn_pool_size: 10,
            explosion_duration: 1.0,
            spawn_duration: 1.0,
            return_padding: 0.2,
            max_pool_size: None,
        }
    }
}

/// Per-kind elf behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElfConfig {
    pub kind: ElfKind,

    #[serde(default = "ElfConfig::default_move_speed")]
    pub move_speed: f32,

    #[serde(default = "ElfConfig::default_direction_change_interval")]
    pub direction_change_interval: f32,

    /// Time spent in `Replicating` after a same-kind collision
    #[serde(default = "ElfConfig::default_replication_cooldown")]
    pub replication_cooldown: f32,

    /// Safety-net sweep interval for the dedup set
    #[serde(default = "ElfConfig::default_collision_cleanup_interval")]
    pub collision_cleanup_interval: f32,

    #[serde(default = "ElfConfig::default_color")]
    pub color: Color,

    #[serde(default = "ElfConfig::default_initial_pool_size")]
    pub initial_pool_size: usize,

    /// Bound on instances constructed by this kind's pool
    #[serde(default)]
    pub max_pool_size: Option<usize>,

    #[serde(default)]
    pub movement: MovementStrategy,
}

impl ElfConfig {
    pub const DEFAULT_COLLISION_CLEANUP_INTERVAL: f32 = 5.0;

    /// Default settings for a kind
    pub fn for_kind(kind: ElfKind) -> Self {
        Self {
            kind,
            move_speed: Self::default_move_speed(),
            direction_change_interval: Self::default_direction_change_interval(),
            replication_cooldown: Self::default_replication_cooldown(),
            collision_cleanup_interval: Self::default_collision_cleanup_interval(),
            color: kind.default_color(),
            initial_pool_size: Self::default_initial_pool_size(),
            max_pool_size: None,
            movement: MovementStrategy::default(),
        }
    }

    fn default_move_speed() -> f32 {
        4.0
    }

    fn default_direction_change_interval() -> f32 {
        1.0
    }

    fn default_replication_cooldown() -> f32 {
        20.0
    }

    fn default_collision_cleanup_interval() -> f32 {
        Self::DEFAULT_COLLISION_CLEANUP_INTERVAL
    }

    fn default_color() -> Color {
        Color::WHITE
    }

    fn default_initial_pool_size() -> usize {
        10
    }
}

/// Per-kind spawner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnerConfig {
    pub kind: ElfKind,

    #[serde(default)]
    pub name: String,

    /// Centre of the spawn area
    #[serde(default)]
    pub location: Vec3,

    #[serde(default = "SpawnerConfig::default_spawn_interval")]
    pub spawn_interval: f32,

    /// Full extent of the spawn area (Y ignored)
    #[serde(default = "SpawnerConfig::default_spawn_area_size")]
    pub spawn_area_size: Vec3,

    /// Population cap for this kind
    #[serde(default = "SpawnerConfig::default_max_entities")]
    pub max_entities: u32,

    /// Periodic spawning on/off; replication still uses the cap
    #[serde(default = "SpawnerConfig::default_enabled")]
    pub enabled: bool,
}

impl SpawnerConfig {
    pub fn for_kind(kind: ElfKind, location: Vec3) -> Self {
        Self {
            kind,
            name: format!("{:?} spawner", kind),
            location,
            spawn_interval: Self::default_spawn_interval(),
            spawn_area_size: Self::default_spawn_area_size(),
            max_entities: Self::default_max_entities(),
            enabled: Self::default_enabled(),
        }
    }

    fn default_spawn_interval() -> f32 {
        2.0
    }

    fn default_spawn_area_size() -> Vec3 {
        Vec3::new(5.0, 0.0, 5.0)
    }

    fn default_max_entities() -> u32 {
        100
    }

    fn default_enabled() -> bool {
        true
    }
}
