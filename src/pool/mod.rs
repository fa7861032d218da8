// src/pool/mod.rs
//! Reusable-instance pools
//!
//! - **Object Pool**: generic FIFO pool with checkout tracking, optional
//!   capacity bound and deferred returns
//! - **Particle Effects**: explosion/spawn effect pools fed through a
//!   fire-and-forget channel
//!
//! # Performance
//!
//! - No allocation on the steady-state get/return path
//! - Effects return on their own after their natural duration

pub mod object_pool;
pub mod particle_effects;

// Re-export commonly used types
pub use object_pool::{InstanceId, ObjectPool, PoolConfig, PoolId, PoolStats, Poolable};
pub use particle_effects::{EffectChannel, EffectKind, EffectRequest, EffectStats, ParticleEffect, ParticleEffects};
