// src/spawning/placement.rs
//! Spawn position search
//!
//! A candidate is valid when the ground probe finds walkable surface under it,
//! no obstacle lies within the clearance radius, and it sits inside the
//! arena. Candidates are drawn uniformly from a rectangle around a centre; the
//! search gives up after a fixed number of attempts.

use crate::interfaces::Terrain;
use crate::movement::boundary::ArenaBounds;
use crate::utils::math::Vec3;
use rand::Rng;
use tracing::trace;

/// Where and how hard to look
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRequest {
    pub center: Vec3,

    /// Half the search rectangle along X and Z
    pub half_extent_x: f32,
    pub half_extent_z: f32,

    pub clearance: f32,
    pub max_attempts: u32,

    /// Height above the ground probe hit
    pub ground_offset: f32,
}

impl PlacementRequest {
    /// Search a full-size rectangle (`size.x` by `size.z`) around `center`
    pub fn area(center: Vec3, size: Vec3) -> Self {
        Self {
            center,
            half_extent_x: size.x.abs() * 0.5,
            half_extent_z: size.z.abs() * 0.5,
            clearance: 0.0,
            max_attempts: 1,
            ground_offset: 0.0,
        }
    }

    /// Search a square of half-width `radius` around `center`
    pub fn around(center: Vec3, radius: f32) -> Self {
        Self {
            half_extent_x: radius.abs(),
            half_extent_z: radius.abs(),
            ..Self::area(center, Vec3::ZERO)
        }
    }

    pub fn with_clearance(mut self, clearance: f32) -> Self {
        self.clearance = clearance;
        self
    }

    pub fn with_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_ground_offset(mut self, offset: f32) -> Self {
        self.ground_offset = offset;
        self
    }
}

/// Largest half-extent sampled; anything wider is far outside any arena
const MAX_HALF_EXTENT: f32 = 1.0e6;

fn offset<R: Rng + ?Sized>(rng: &mut R, half_extent: f32) -> f32 {
    if half_extent > 0.0 {
        let half_extent = half_extent.min(MAX_HALF_EXTENT);
        rng.gen_range(-half_extent..=half_extent)
    } else {
        0.0
    }
}

/// Find a valid spawn position, or `None` once the attempt budget is spent
pub fn find_spawn_position<R: Rng + ?Sized>(
    terrain: &dyn Terrain,
    bounds: &ArenaBounds,
    request: &PlacementRequest,
    rng: &mut R,
) -> Option<Vec3> {
    for attempt in 1..=request.max_attempts {
        let candidate = Vec3::flat(
            request.center.x + offset(rng, request.half_extent_x),
            request.center.z + offset(rng, request.half_extent_z),
        );

        if !bounds.contains(candidate) {
            trace!("Attempt {}: {:?} outside arena", attempt, candidate);
            continue;
        }

        let Some(ground) = terrain.probe_ground_height(candidate) else {
            trace!("Attempt {}: no ground at {:?}", attempt, candidate);
            continue;
        };

        let placed = Vec3::new(candidate.x, ground + request.ground_offset, candidate.z);
        if terrain.is_obstacle_near(placed, request.clearance) {
            trace!("Attempt {}: obstacle near {:?}", attempt, placed);
            continue;
        }

        return Some(placed);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::FlatTerrain;
    use crate::utils::config::ArenaConfig;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn bounds() -> ArenaBounds {
        ArenaBounds::from_config(&ArenaConfig::default())
    }

    #[test]
    fn test_places_on_ground_inside_area() {
        let terrain = FlatTerrain::new(1.0);
        let mut rng = SmallRng::seed_from_u64(11);
        let request = PlacementRequest::area(Vec3::flat(5.0, 5.0), Vec3::new(4.0, 0.0, 2.0))
            .with_attempts(10)
            .with_ground_offset(0.1);

        for _ in 0..20 {
            let position = find_spawn_position(&terrain, &bounds(), &request, &mut rng).unwrap();
            assert!((position.x - 5.0).abs() <= 2.0);
            assert!((position.z - 5.0).abs() <= 1.0);
            assert!((position.y - 1.1).abs() < 1e-5);
        }
    }

    #[test]
    fn test_no_ground_exhausts_attempts() {
        let terrain = FlatTerrain::new(0.0).with_extent(Vec3::flat(100.0, 100.0), Vec3::flat(101.0, 101.0));
        let mut rng = SmallRng::seed_from_u64(11);
        let request = PlacementRequest::around(Vec3::ZERO, 5.0).with_attempts(10);
        assert!(find_spawn_position(&terrain, &bounds(), &request, &mut rng).is_none());
    }

    #[test]
    fn test_obstacle_saturated_area() {
        let terrain = FlatTerrain::new(0.0).with_obstacle(Vec3::ZERO, 20.0);
        let mut rng = SmallRng::seed_from_u64(11);
        let request = PlacementRequest::around(Vec3::ZERO, 5.0)
            .with_clearance(1.0)
            .with_attempts(10);
        assert!(find_spawn_position(&terrain, &bounds(), &request, &mut rng).is_none());
    }

    #[test]
    fn test_clearance_rejects_close_rock() {
        // zero-size area: the only candidate is the centre, 1.5 from a 0.2 rock
        let terrain = FlatTerrain::new(0.0).with_obstacle(Vec3::flat(1.5, 0.0), 0.2);
        let mut rng = SmallRng::seed_from_u64(11);

        let tight = PlacementRequest::around(Vec3::ZERO, 0.0).with_clearance(1.0);
        assert!(find_spawn_position(&terrain, &bounds(), &tight, &mut rng).is_some());

        let wide = PlacementRequest::around(Vec3::ZERO, 0.0).with_clearance(2.0);
        assert!(find_spawn_position(&terrain, &bounds(), &wide, &mut rng).is_none());
    }

    #[test]
    fn test_unbounded_extent_does_not_panic() {
        let terrain = FlatTerrain::new(0.0);
        let mut rng = SmallRng::seed_from_u64(11);
        let area = PlacementRequest::area(Vec3::ZERO, Vec3::new(f32::MAX, 0.0, f32::MAX)).with_attempts(50);
        let around = PlacementRequest::around(Vec3::ZERO, f32::INFINITY).with_attempts(50);

        for request in [area, around] {
            if let Some(position) = find_spawn_position(&terrain, &bounds(), &request, &mut rng) {
                assert!(position.x.is_finite() && position.z.is_finite());
            }
        }
    }
}
