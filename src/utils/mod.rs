// src/utils/mod.rs
//! Common utilities shared across the engine
//!
//! - **config**: Layered engine configuration (defaults, file, environment)
//! - **errors**: Engine error type and `Result` alias
//! - **math**: Small vector and colour types used by the simulation

pub mod config;
pub mod errors;
pub mod math;

pub use config::EngineConfig;
pub use errors::{EngineError, Result};
pub use math::{Color, Vec3};
