// src/pool/particle_effects.rs
//! Pooled transient visual effects
//!
//! Elves never touch effect pools directly. The factory hands each elf an
//! [`EffectChannel`] (a sender into the shared effect pools) when it is drawn;
//! playing an effect is a fire-and-forget message. Once per tick the world
//! drains the channel: each request draws an effect from its pool, starts it
//! at the requested position and schedules its return after the effect's
//! natural duration plus padding.

use crate::interfaces::EffectPlayer;
use crate::pool::object_pool::{InstanceId, ObjectPool, PoolConfig, PoolId, PoolStats, Poolable};
use crate::utils::config::EffectsConfig;
use crate::utils::errors::{EngineError, Result};
use crate::utils::math::Vec3;
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Kinds of pooled effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Explosion,
    Spawn,
}

/// A pooled particle effect instance
#[derive(Debug, Clone)]
pub struct ParticleEffect {
    id: InstanceId,
    pool: Option<PoolId>,
    pub kind: EffectKind,
    pub position: Vec3,
    pub playing: bool,

    /// Times this instance has been played
    pub plays: u32,
}

impl ParticleEffect {
    fn new(id: InstanceId, kind: EffectKind) -> Self {
        Self {
            id,
            pool: None,
            kind,
            position: Vec3::ZERO,
            playing: false,
            plays: 0,
        }
    }

    fn play(&mut self, position: Vec3) {
        self.position = position;
        self.playing = true;
        self.plays += 1;
    }
}

impl Poolable for ParticleEffect {
    fn instance_id(&self) -> InstanceId {
        self.id
    }

    fn attach_pool(&mut self, pool: PoolId) {
        self.pool = Some(pool);
    }

    fn pool(&self) -> Option<PoolId> {
        self.pool
    }

    fn on_return(&mut self) {
        // stop and clear
        self.playing = false;
        self.position = Vec3::ZERO;
    }
}

/// Effect playback request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectRequest {
    pub kind: EffectKind,
    pub position: Vec3,
}

/// Cloneable handle for requesting effects
#[derive(Debug, Clone)]
pub struct EffectChannel {
    tx: Sender<EffectRequest>,
}

impl EffectChannel {
    /// Queue an effect
    pub fn play(&self, kind: EffectKind, position: Vec3) -> Result<()> {
        self.tx
            .send(EffectRequest { kind, position })
            .map_err(|e| EngineError::EffectFailed(format!("effect pools are gone: {}", e)))
    }
}

impl EffectPlayer for EffectChannel {
    fn play_explosion(&self, position: Vec3) {
        if let Err(e) = self.play(EffectKind::Explosion, position) {
            warn!("Explosion effect dropped: {}", e);
        }
    }

    fn play_spawn(&self, position: Vec3) {
        if let Err(e) = self.play(EffectKind::Spawn, position) {
            warn!("Spawn effect dropped: {}", e);
        }
    }
}

/// Explosion and spawn effect pools fed by an [`EffectChannel`]
pub struct ParticleEffects {
    config: EffectsConfig,
    explosion: ObjectPool<ParticleEffect>,
    spawn: ObjectPool<ParticleEffect>,
    tx: Sender<EffectRequest>,
    rx: Receiver<EffectRequest>,
    played: u64,
    dropped: u64,
}

impl ParticleEffects {
    pub fn new(explosion_pool: PoolId, spawn_pool: PoolId, config: EffectsConfig) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();

        let explosion = ObjectPool::new(
            explosion_pool,
            PoolConfig::new("explosion effects", config.explosion_pool_size)
                .with_max_size(config.max_pool_size),
            |id| ParticleEffect::new(id, EffectKind::Explosion),
        );
        let spawn = ObjectPool::new(
            spawn_pool,
            PoolConfig::new("spawn effects", config.spawn_pool_size)
                .with_max_size(config.max_pool_size),
            |id| ParticleEffect::new(id, EffectKind::Spawn),
        );

        debug!(
            "Effect pools ready ({} explosion, {} spawn)",
            config.explosion_pool_size, config.spawn_pool_size
        );

        Self {
            config,
            explosion,
            spawn,
            tx,
            rx,
            played: 0,
            dropped: 0,
        }
    }

    /// New sender for injection into an elf
    pub fn channel(&self) -> EffectChannel {
        EffectChannel {
            tx: self.tx.clone(),
        }
    }

    fn duration(&self, kind: EffectKind) -> f32 {
        let natural = match kind {
            EffectKind::Explosion => self.config.explosion_duration,
            EffectKind::Spawn => self.config.spawn_duration,
        };
        natural + self.config.return_padding
    }

    /// Start queued effects and reclaim finished ones
    pub fn process(&mut self, now: f64) -> usize {
        let mut started = 0;

        while let Ok(request) = self.rx.try_recv() {
            let duration = self.duration(request.kind);
            let pool = match request.kind {
                EffectKind::Explosion => &mut self.explosion,
                EffectKind::Spawn => &mut self.spawn,
            };

            match pool.get() {
                Some(mut effect) => {
                    effect.play(request.position);
                    pool.release_after(effect, duration, now);
                    started += 1;
                }
                None => {
                    self.dropped += 1;
                    debug!("No {:?} effect available, skipping", request.kind);
                }
            }
        }

        self.explosion.tick(now);
        self.spawn.tick(now);
        self.played += started as u64;
        started
    }

    /// Effects currently playing
    pub fn playing(&self) -> impl Iterator<Item = &ParticleEffect> {
        self.explosion.pending().chain(self.spawn.pending())
    }

    pub fn stats(&self) -> EffectStats {
        EffectStats {
            played: self.played,
            dropped: self.dropped,
            explosion_pool: self.explosion.stats(),
            spawn_pool: self.spawn.stats(),
        }
    }
}

/// Effect subsystem statistics
#[derive(Debug, Clone)]
pub struct EffectStats {
    pub played: u64,
    pub dropped: u64,
    pub explosion_pool: PoolStats,
    pub spawn_pool: PoolStats,
}
