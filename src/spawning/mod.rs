// src/spawning/mod.rs
//! Bringing elves into the world
//!
//! - **Factory**: kind-to-pool mapping, effect injection on draw
//! - **Placement**: bounded random search for a valid spawn position
//! - **Spawner**: periodic per-kind spawning under the population cap
//! - **Replication**: event-driven spawning from same-kind collisions
//!
//! # Architecture
//!
//! ```text
//! Spawner (timer) ──┐
//!                   ├──► spawn_elf ──► PopulationCounter::can_admit
//! Replication  ─────┘        │
//! (inbox)                    ├──► ElfFactory::create ──► ObjectPool<Elf>
//!                            ├──► find_spawn_position ──► Terrain
//!                            └──► activate + on_admitted
//! ```

pub mod factory;
pub mod placement;
pub mod replication;
pub mod spawner;

// Re-export commonly used types
pub use factory::ElfFactory;
pub use placement::{find_spawn_position, PlacementRequest};
pub use replication::{ReplicationDispatcher, ReplicationRequest, ReplicationResult, ReplicationStats};
pub use spawner::{spawn_elf, SpawnContext, SpawnOutcome, Spawner, SpawnerStats};
