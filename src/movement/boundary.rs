// src/movement/boundary.rs
//! Arena walls, ground following and obstacle bounces
//!
//! None of this goes through the lifecycle state machine: hitting a wall or a
//! rock only changes where an elf is and where it is heading.

use crate::interfaces::Terrain;
use crate::utils::config::ArenaConfig;
use crate::utils::math::Vec3;

/// Distance an elf is pushed out of a rock it touched
const OBSTACLE_NUDGE: f32 = 0.1;

/// Walkable rectangle with the boundary margin already applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

/// Result of constraining a position to the arena
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryCheck {
    pub position: Vec3,
    pub direction: Vec3,
    pub bounced: bool,
}

impl ArenaBounds {
    pub fn from_config(arena: &ArenaConfig) -> Self {
        Self {
            min_x: arena.min_x + arena.boundary_margin,
            max_x: arena.max_x - arena.boundary_margin,
            min_z: arena.min_z + arena.boundary_margin,
            max_z: arena.max_z - arena.boundary_margin,
        }
    }

    pub fn contains(&self, position: Vec3) -> bool {
        position.x >= self.min_x
            && position.x <= self.max_x
            && position.z >= self.min_z
            && position.z <= self.max_z
    }

    /// Clamp into the arena, reflecting the heading off every wall crossed
    pub fn constrain(&self, mut position: Vec3, direction: Vec3) -> BoundaryCheck {
        if self.contains(position) {
            return BoundaryCheck {
                position,
                direction,
                bounced: false,
            };
        }

        let mut normal = Vec3::ZERO;

        if position.x < self.min_x {
            normal.x = 1.0;
            position.x = self.min_x;
        } else if position.x > self.max_x {
            normal.x = -1.0;
            position.x = self.max_x;
        }

        if position.z < self.min_z {
            normal.z = 1.0;
            position.z = self.min_z;
        } else if position.z > self.max_z {
            normal.z = -1.0;
            position.z = self.max_z;
        }

        BoundaryCheck {
            position,
            direction: direction.reflect(normal.normalized()),
            bounced: true,
        }
    }
}

/// Follow the ground under `candidate`.
///
/// A probe hit puts the elf `offset` above the ground, but only when that is
/// within `max_step` of where it stands now. A miss or a cliff keeps the
/// current height.
pub fn align_to_ground(
    terrain: &dyn Terrain,
    mut candidate: Vec3,
    current_height: f32,
    offset: f32,
    max_step: f32,
) -> Vec3 {
    candidate.y = match terrain.probe_ground_height(candidate) {
        Some(ground) => {
            let target = ground + offset;
            if (target - current_height).abs() <= max_step {
                target
            } else {
                current_height
            }
        }
        None => current_height,
    };
    candidate
}

/// Bounce an elf off a static obstacle it touched.
///
/// A heading into the rock is reflected about the rock-to-elf normal, keeping
/// the vertical component; the elf is nudged outward along that normal.
/// Returns the new position and heading.
pub fn bounce_off_obstacle(position: Vec3, direction: Vec3, obstacle: Vec3) -> (Vec3, Vec3) {
    let normal = (position - obstacle).horizontal().normalized();
    if normal.is_zero() {
        let reversed = -direction;
        return (position + reversed.horizontal() * OBSTACLE_NUDGE, reversed);
    }

    let mut heading = direction;
    if direction.dot(normal) < 0.0 {
        heading = direction.reflect(normal);
        heading.y = direction.y;
    }
    (position + normal * OBSTACLE_NUDGE, heading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::FlatTerrain;

    fn bounds() -> ArenaBounds {
        ArenaBounds::from_config(&ArenaConfig {
            min_x: -10.0,
            max_x: 10.0,
            min_z: -10.0,
            max_z: 10.0,
            boundary_margin: 0.5,
            ..Default::default()
        })
    }

    #[test]
    fn test_margin_applied() {
        let b = bounds();
        assert_eq!(b.min_x, -9.5);
        assert_eq!(b.max_z, 9.5);
        assert!(b.contains(Vec3::flat(9.5, -9.5)));
        assert!(!b.contains(Vec3::flat(9.6, 0.0)));
    }

    #[test]
    fn test_inside_untouched() {
        let check = bounds().constrain(Vec3::flat(1.0, 1.0), Vec3::flat(1.0, 0.0));
        assert!(!check.bounced);
        assert_eq!(check.direction, Vec3::flat(1.0, 0.0));
    }

    #[test]
    fn test_wall_clamps_and_reflects() {
        let heading = Vec3::flat(1.0, 1.0).normalized();
        let check = bounds().constrain(Vec3::flat(12.0, 3.0), heading);
        assert!(check.bounced);
        assert_eq!(check.position, Vec3::flat(9.5, 3.0));
        assert!(check.direction.x < 0.0);
        assert!(check.direction.z > 0.0);
    }

    #[test]
    fn test_corner_reverses() {
        let heading = Vec3::flat(1.0, 1.0).normalized();
        let check = bounds().constrain(Vec3::flat(11.0, 11.0), heading);
        assert_eq!(check.position, Vec3::flat(9.5, 9.5));
        assert!(check.direction.x < 0.0 && check.direction.z < 0.0);
    }

    #[test]
    fn test_ground_following() {
        let terrain = FlatTerrain::new(0.3);
        let aligned = align_to_ground(&terrain, Vec3::flat(1.0, 1.0), 0.1, 0.1, 0.5);
        assert!((aligned.y - 0.4).abs() < 1e-5);

        let cliff = FlatTerrain::new(5.0);
        let held = align_to_ground(&cliff, Vec3::flat(1.0, 1.0), 0.1, 0.1, 0.5);
        assert_eq!(held.y, 0.1);

        let void = FlatTerrain::new(0.0).with_extent(Vec3::flat(-1.0, -1.0), Vec3::flat(0.0, 0.0));
        let held = align_to_ground(&void, Vec3::flat(1.0, 1.0), 0.7, 0.1, 0.5);
        assert_eq!(held.y, 0.7);
    }

    #[test]
    fn test_obstacle_bounce() {
        let (position, direction) =
            bounce_off_obstacle(Vec3::flat(1.0, 0.0), Vec3::flat(-1.0, 0.0), Vec3::ZERO);
        assert_eq!(direction, Vec3::flat(1.0, 0.0));
        assert!((position.x - 1.1).abs() < 1e-5);
    }

    #[test]
    fn test_obstacle_bounce_keeps_outward_heading() {
        let (position, direction) =
            bounce_off_obstacle(Vec3::flat(1.0, 0.0), Vec3::flat(1.0, 0.0), Vec3::ZERO);
        assert_eq!(direction, Vec3::flat(1.0, 0.0));
        assert!((position.x - 1.1).abs() < 1e-5);
    }
}
