// src/movement/mod.rs
//! Elf locomotion
//!
//! - **Strategy**: pluggable movement policies (default, erratic, zigzag, attack)
//! - **Boundary**: arena walls, ground following, rock bounces
//! - **Motion**: per-elf heading state and the per-frame update
//!
//! Movement is cosmetic as far as the lifecycle is concerned: it decides
//! where elves meet, never what happens when they do.

pub mod boundary;
pub mod motion;
pub mod strategy;

// Re-export commonly used types
pub use boundary::{align_to_ground, bounce_off_obstacle, ArenaBounds, BoundaryCheck};
pub use motion::{MotionContext, MotionParams, MotionState, MotionStep};
pub use strategy::{MovementInput, MovementMemory, MovementResult, MovementStrategy};
