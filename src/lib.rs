// src/lib.rs
//! Exploding Elves Engine Library
//!
//! Entity lifecycle and collision engine for an arena where four kinds of
//! elves wander, replicate when they meet their own kind and explode when
//! they meet any other.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **pool**: Reusable elf and effect instances
//! - **simulation**: Lifecycle state machine, population, collision dedup, world
//! - **spawning**: Factory, periodic spawners, replication dispatch, placement
//! - **movement**: Movement policies, arena boundary, ground following
//! - **interfaces**: Terrain, view and effect seams toward the host
//! - **observability**: Tracing and metrics setup
//! - **utils**: Configuration, errors, math

// Public module exports
pub mod interfaces;
pub mod movement;
pub mod observability;
pub mod pool;
pub mod simulation;
pub mod spawning;
pub mod utils;

// Re-export commonly used types
pub use simulation::elf::{Elf, ElfKind};
pub use simulation::events::{TimedEvent, WorldEvent};
pub use simulation::world::{CollisionOutcome, TickSummary, World, WorldStats};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};
pub use utils::math::Vec3;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_world_runs() {
        let mut config = EngineConfig::default();
        config.session.seed = Some(3);
        let mut world = World::new(config).unwrap();

        for _ in 0..120 {
            world.tick(1.0 / 60.0);
        }
        assert_eq!(world.frame(), 120);
        assert!(world.live_count() >= 4);
        assert!(!world.drain_events().is_empty());
    }
}
