// src/movement/motion.rs
//! Per-elf heading and position update
//!
//! One call to [`MotionState::advance`] is one frame of locomotion: re-roll
//! the heading when its interval is up, let the policy move the elf, keep it
//! inside the arena and on the ground.

use crate::interfaces::Terrain;
use crate::movement::boundary::{align_to_ground, bounce_off_obstacle, ArenaBounds};
use crate::movement::strategy::{MovementInput, MovementMemory, MovementStrategy};
use crate::utils::math::Vec3;
use rand::Rng;

/// Squared distance below which an elf counts as standing still
const WALKING_EPSILON_SQ: f32 = 0.0001;

/// Heading, re-roll timer and policy memory of one elf
#[derive(Debug, Clone, Default)]
pub struct MotionState {
    pub direction: Vec3,

    /// Absolute time of the next heading re-roll
    pub next_direction_change: f64,

    pub memory: MovementMemory,
}

/// Shared per-frame context for every elf's locomotion
pub struct MotionContext<'a> {
    pub now: f64,
    pub dt: f32,
    pub bounds: &'a ArenaBounds,
    pub terrain: &'a dyn Terrain,
    pub ground_offset: f32,
    pub max_step_height: f32,

    /// Direction-change hold after a wall bounce
    pub boundary_hold: f32,
}

/// Per-elf movement parameters
pub struct MotionParams<'a> {
    pub strategy: &'a MovementStrategy,
    pub speed: f32,
    pub direction_change_interval: f32,
    pub target: Option<Vec3>,
}

/// Result of one locomotion frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStep {
    pub position: Vec3,
    pub walking: bool,
    pub bounced: bool,
}

impl MotionState {
    /// Fresh state for a newly activated elf
    pub fn reset(&mut self) {
        *self = MotionState::default();
    }

    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        position: Vec3,
        params: &MotionParams<'_>,
        ctx: &MotionContext<'_>,
        rng: &mut R,
    ) -> MotionStep {
        if self.direction.is_zero() || ctx.now >= self.next_direction_change {
            self.direction = params
                .strategy
                .next_direction(&mut self.memory, self.direction, rng);
            self.next_direction_change = ctx.now + f64::from(params.direction_change_interval);
        }

        let result = params.strategy.step(
            &mut self.memory,
            &MovementInput {
                position,
                direction: self.direction,
                speed: params.speed,
                dt: ctx.dt,
                target: params.target,
                terrain: ctx.terrain,
            },
        );
        self.direction = result.direction;

        let check = ctx.bounds.constrain(result.position, self.direction);
        if check.bounced {
            self.direction = check.direction;
            self.next_direction_change = ctx.now + f64::from(ctx.boundary_hold);
        }

        let next = align_to_ground(
            ctx.terrain,
            check.position,
            position.y,
            ctx.ground_offset,
            ctx.max_step_height,
        );

        MotionStep {
            position: next,
            walking: (next - position).length_squared() > WALKING_EPSILON_SQ,
            bounced: check.bounced,
        }
    }

    /// Bounce off a rock; returns the nudged position
    pub fn bounce(&mut self, position: Vec3, obstacle: Vec3, now: f64, hold: f32) -> Vec3 {
        let (nudged, direction) = bounce_off_obstacle(position, self.direction, obstacle);
        self.direction = direction;
        self.next_direction_change = now + f64::from(hold);
        nudged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::FlatTerrain;
    use crate::utils::config::ArenaConfig;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn context<'a>(bounds: &'a ArenaBounds, terrain: &'a FlatTerrain, now: f64) -> MotionContext<'a> {
        MotionContext {
            now,
            dt: 0.5,
            bounds,
            terrain,
            ground_offset: 0.1,
            max_step_height: 0.5,
            boundary_hold: 0.1,
        }
    }

    #[test]
    fn test_first_step_picks_heading_and_walks() {
        let bounds = ArenaBounds::from_config(&ArenaConfig::default());
        let terrain = FlatTerrain::new(0.0);
        let mut rng = SmallRng::seed_from_u64(3);
        let mut motion = MotionState::default();
        let strategy = MovementStrategy::Default;
        let params = MotionParams {
            strategy: &strategy,
            speed: 4.0,
            direction_change_interval: 1.0,
            target: None,
        };

        let step = motion.advance(Vec3::new(0.0, 0.1, 0.0), &params, &context(&bounds, &terrain, 0.0), &mut rng);
        assert!(step.walking);
        assert!((motion.direction.length() - 1.0).abs() < 1e-4);
        assert_eq!(motion.next_direction_change, 1.0);
        assert!((step.position.y - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_stationary_elf_is_not_walking() {
        let bounds = ArenaBounds::from_config(&ArenaConfig::default());
        let terrain = FlatTerrain::new(0.0);
        let mut rng = SmallRng::seed_from_u64(3);
        let mut motion = MotionState::default();
        let strategy = MovementStrategy::Default;
        let params = MotionParams {
            strategy: &strategy,
            speed: 0.0,
            direction_change_interval: 1.0,
            target: None,
        };
        let step = motion.advance(Vec3::new(0.0, 0.1, 0.0), &params, &context(&bounds, &terrain, 0.0), &mut rng);
        assert!(!step.walking);
    }

    #[test]
    fn test_wall_bounce_holds_direction_change() {
        let bounds = ArenaBounds::from_config(&ArenaConfig::default());
        let terrain = FlatTerrain::new(0.0);
        let mut rng = SmallRng::seed_from_u64(3);
        let mut motion = MotionState {
            direction: Vec3::flat(1.0, 0.0),
            next_direction_change: 100.0,
            ..Default::default()
        };
        let strategy = MovementStrategy::Default;
        let params = MotionParams {
            strategy: &strategy,
            speed: 4.0,
            direction_change_interval: 1.0,
            target: None,
        };

        let step = motion.advance(Vec3::new(24.4, 0.1, 0.0), &params, &context(&bounds, &terrain, 5.0), &mut rng);
        assert!(step.bounced);
        assert_eq!(step.position.x, bounds.max_x);
        assert_eq!(motion.direction, Vec3::flat(-1.0, 0.0));
        assert!((motion.next_direction_change - 5.1).abs() < 1e-6);
    }

    #[test]
    fn test_rock_bounce() {
        let mut motion = MotionState {
            direction: Vec3::flat(0.0, -1.0),
            ..Default::default()
        };
        let nudged = motion.bounce(Vec3::flat(0.0, 1.0), Vec3::ZERO, 2.0, 1.0);
        assert_eq!(motion.direction, Vec3::flat(0.0, 1.0));
        assert!((nudged.z - 1.1).abs() < 1e-5);
        assert_eq!(motion.next_direction_change, 3.0);
    }
}
