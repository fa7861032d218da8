// src/simulation/mod.rs
//! Entity lifecycle and collision engine
//!
//! - **Elf**: pooled agent carrying kind, colour, motion and lifecycle state
//! - **State Machine**: Spawning/Idle/Replicating/Exploding with timed exits
//! - **Population**: live count per kind behind the spawn admission gate
//! - **Collision**: once-per-pair dedup with timed eviction and periodic sweep
//! - **Scheduler**: simulation-time timer queue for deferred work
//! - **Events**: bounded queue of lifecycle events for the host
//! - **World**: the session context tying it all together
//!
//! # Lifecycle
//!
//! ```text
//! pool ──get──► Spawning ──timer──► Idle ──same kind──► Replicating ──timer──► Idle
//!                                    │
//!                                    └──other kind──► Exploding ──delay──► pool
//! ```

pub mod collision;
pub mod elf;
pub mod events;
pub mod population;
pub mod scheduler;
pub mod state_machine;
pub mod world;

// Re-export commonly used types
pub use collision::{CollisionRegistry, CollisionStats, PairClaim, PairKey};
pub use elf::{Elf, ElfKind};
pub use events::{EventQueue, QueueStats, SkipReason, TimedEvent, WorldEvent};
pub use population::PopulationCounter;
pub use scheduler::TimerQueue;
pub use state_machine::{ElfState, ElfStateMachine, StateVisuals, Transition};
pub use world::{CollisionOutcome, IgnoreReason, TickSummary, World, WorldStats};
