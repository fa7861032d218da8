// src/interfaces/mod.rs
//! Collaborator interfaces consumed by the simulation core
//!
//! The core never renders, raycasts or plays particles itself. Hosts plug in:
//!
//! - **Terrain**: ground height probe and obstacle proximity query
//! - **ElfView**: cosmetic state mirrors (walking, emission glow, scale)
//! - **EffectPlayer**: fire-and-forget effect playback
//!
//! Simple implementations are provided for headless runs and tests.

use crate::pool::object_pool::InstanceId;
use crate::utils::math::{Color, Vec3};
#[cfg(test)]
use parking_lot::Mutex;
#[cfg(test)]
use std::sync::Arc;

/// Ground and obstacle queries
pub trait Terrain: Send {
    /// Height of the walkable surface under `position`, or `None` for no ground
    fn probe_ground_height(&self, position: Vec3) -> Option<f32>;

    /// Whether a static obstacle lies within `radius` of `position`
    fn is_obstacle_near(&self, position: Vec3, radius: f32) -> bool;
}

/// Presentation-layer mirror of an elf's state
pub trait ElfView: Send {
    fn set_walking(&mut self, id: InstanceId, walking: bool);
    fn set_emission(&mut self, id: InstanceId, enabled: bool, color: Color);
    fn set_scale(&mut self, id: InstanceId, full_size: bool);
}

/// Fire-and-forget effect playback
pub trait EffectPlayer {
    fn play_explosion(&self, position: Vec3);
    fn play_spawn(&self, position: Vec3);
}

/// Circular static obstacle ("rock")
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub center: Vec3,
    pub radius: f32,
}

/// Flat ground, optionally limited to a rectangle, with circular obstacles
#[derive(Debug, Clone, Default)]
pub struct FlatTerrain {
    height: f32,
    extent: Option<(Vec3, Vec3)>,
    obstacles: Vec<Obstacle>,
}

impl FlatTerrain {
    /// Unbounded ground at `height`
    pub fn new(height: f32) -> Self {
        Self {
            height,
            extent: None,
            obstacles: Vec::new(),
        }
    }

    /// Only report ground inside the XZ rectangle `min..=max`
    pub fn with_extent(mut self, min: Vec3, max: Vec3) -> Self {
        self.extent = Some((min, max));
        self
    }

    pub fn with_obstacle(mut self, center: Vec3, radius: f32) -> Self {
        self.obstacles.push(Obstacle { center, radius });
        self
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }
}

impl Terrain for FlatTerrain {
    fn probe_ground_height(&self, position: Vec3) -> Option<f32> {
        match self.extent {
            Some((min, max))
                if position.x < min.x
                    || position.x > max.x
                    || position.z < min.z
                    || position.z > max.z =>
            {
                None
            }
            _ => Some(self.height),
        }
    }

    fn is_obstacle_near(&self, position: Vec3, radius: f32) -> bool {
        self.obstacles
            .iter()
            .any(|rock| rock.center.planar_distance(position) < rock.radius + radius)
    }
}

/// View that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullView;

impl ElfView for NullView {
    fn set_walking(&mut self, _id: InstanceId, _walking: bool) {}
    fn set_emission(&mut self, _id: InstanceId, _enabled: bool, _color: Color) {}
    fn set_scale(&mut self, _id: InstanceId, _full_size: bool) {}
}

#[cfg(test)]
/// View command captured by [`RecordingView`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewCommand {
    Walking(InstanceId, bool),
    Emission(InstanceId, bool, Color),
    Scale(InstanceId, bool),
}

#[cfg(test)]
/// View that records every command; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    log: Arc<Mutex<Vec<ViewCommand>>>,
}

#[cfg(test)]
impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<ViewCommand> {
        self.log.lock().clone()
    }

    /// Latest command of the same shape for `id`
    pub fn last_for(&self, id: InstanceId, matches: impl Fn(&ViewCommand) -> bool) -> Option<ViewCommand> {
        self.log
            .lock()
            .iter()
            .rev()
            .find(|cmd| {
                let cmd_id = match cmd {
                    ViewCommand::Walking(id, _)
                    | ViewCommand::Emission(id, _, _)
                    | ViewCommand::Scale(id, _) => *id,
                };
                cmd_id == id && matches(cmd)
            })
            .copied()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

#[cfg(test)]
impl ElfView for RecordingView {
    fn set_walking(&mut self, id: InstanceId, walking: bool) {
        self.log.lock().push(ViewCommand::Walking(id, walking));
    }

    fn set_emission(&mut self, id: InstanceId, enabled: bool, color: Color) {
        self.log.lock().push(ViewCommand::Emission(id, enabled, color));
    }

    fn set_scale(&mut self, id: InstanceId, full_size: bool) {
        self.log.lock().push(ViewCommand::Scale(id, full_size));
    }
}
