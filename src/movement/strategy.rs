// src/movement/strategy.rs
//! Pluggable movement policies
//!
//! A policy is a plain value shared by every elf of a kind. Anything a policy
//! needs to remember between frames lives in the elf's [`MovementMemory`], so
//! one policy value can drive any number of elves.

use crate::interfaces::Terrain;
use crate::simulation::elf::ElfKind;
use crate::utils::math::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Probe radius for "is the step I'm about to take blocked"
const STEP_PROBE_RADIUS: f32 = 0.1;

/// Distance at which a remembered target position counts as reached
const TARGET_REACHED_DISTANCE: f32 = 0.5;

/// Movement policy selected per elf kind
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovementStrategy {
    /// Straight-line wandering, new random heading every interval
    #[default]
    Default,

    /// Random jitter that turns back from obstacles
    Erratic {
        #[serde(default = "defaults::one")]
        strength: f32,
        #[serde(default = "defaults::one")]
        lookahead: f32,
    },

    /// Alternates left and right of a base heading
    ZigZag {
        #[serde(default = "defaults::zigzag_angle")]
        angle_degrees: f32,
        #[serde(default = "defaults::one")]
        lookahead: f32,
        #[serde(default = "defaults::wall_avoidance")]
        wall_avoidance: f32,
    },

    /// Hunts the nearest elf of another kind in charge/cooldown bursts
    Attack {
        target: ElfKind,
        #[serde(default = "defaults::charge_speed")]
        charge_speed: f32,
        #[serde(default = "defaults::one")]
        charge_duration: f32,
        #[serde(default = "defaults::cooldown_duration")]
        cooldown_duration: f32,
        #[serde(default = "defaults::detection_radius")]
        detection_radius: f32,
        #[serde(default = "defaults::fallback_delay")]
        fallback_delay: f32,
    },
}

mod defaults {
    pub fn one() -> f32 {
        1.0
    }
    pub fn zigzag_angle() -> f32 {
        45.0
    }
    pub fn wall_avoidance() -> f32 {
        0.5
    }
    pub fn charge_speed() -> f32 {
        8.0
    }
    pub fn cooldown_duration() -> f32 {
        2.0
    }
    pub fn detection_radius() -> f32 {
        15.0
    }
    pub fn fallback_delay() -> f32 {
        3.0
    }
}

/// Per-elf scratch state owned on behalf of the policy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementMemory {
    zig: bool,
    base_direction: Option<Vec3>,
    charging: bool,
    charge_time: f32,
    last_known_target: Option<Vec3>,
    no_target_time: f32,
}

impl MovementMemory {
    pub fn is_charging(&self) -> bool {
        self.charging
    }

    pub fn last_known_target(&self) -> Option<Vec3> {
        self.last_known_target
    }
}

/// Inputs to one movement step
pub struct MovementInput<'a> {
    pub position: Vec3,
    pub direction: Vec3,
    pub speed: f32,
    pub dt: f32,

    /// Position of the nearest target, for policies that hunt
    pub target: Option<Vec3>,

    pub terrain: &'a dyn Terrain,
}

/// Outcome of one movement step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementResult {
    pub position: Vec3,
    pub direction: Vec3,
}

/// Largest sampling spread used for random headings
const MAX_SPREAD: f32 = 1.0e6;

/// Random unit heading on the ground plane
pub fn random_heading<R: Rng + ?Sized>(rng: &mut R, strength: f32) -> Vec3 {
    let strength = if strength.is_finite() {
        strength.abs().clamp(f32::EPSILON, MAX_SPREAD)
    } else {
        1.0
    };
    loop {
        let candidate = Vec3::flat(
            rng.gen_range(-strength..=strength),
            rng.gen_range(-strength..=strength),
        )
        .normalized();
        if !candidate.is_zero() {
            return candidate;
        }
    }
}

impl MovementStrategy {
    /// Numeric parameters by name, for validation
    pub fn parameters(&self) -> Vec<(&'static str, f32)> {
        match self {
            MovementStrategy::Default => Vec::new(),
            MovementStrategy::Erratic { strength, lookahead } => {
                vec![("strength", *strength), ("lookahead", *lookahead)]
            }
            MovementStrategy::ZigZag {
                angle_degrees,
                lookahead,
                wall_avoidance,
            } => vec![
                ("angle_degrees", *angle_degrees),
                ("lookahead", *lookahead),
                ("wall_avoidance", *wall_avoidance),
            ],
            MovementStrategy::Attack {
                charge_speed,
                charge_duration,
                cooldown_duration,
                detection_radius,
                fallback_delay,
                ..
            } => vec![
                ("charge_speed", *charge_speed),
                ("charge_duration", *charge_duration),
                ("cooldown_duration", *cooldown_duration),
                ("detection_radius", *detection_radius),
                ("fallback_delay", *fallback_delay),
            ],
        }
    }

    /// Kind and radius to search for, if this policy hunts
    pub fn target_query(&self) -> Option<(ElfKind, f32)> {
        match self {
            MovementStrategy::Attack {
                target,
                detection_radius,
                ..
            } => Some((*target, *detection_radius)),
            _ => None,
        }
    }

    /// Heading chosen when the elf's direction-change interval elapses
    pub fn next_direction<R: Rng + ?Sized>(
        &self,
        memory: &mut MovementMemory,
        current: Vec3,
        rng: &mut R,
    ) -> Vec3 {
        match self {
            MovementStrategy::Default => random_heading(rng, 1.0),
            MovementStrategy::Erratic { strength, .. } => random_heading(rng, *strength),
            MovementStrategy::ZigZag { angle_degrees, .. } => {
                let base = *memory
                    .base_direction
                    .get_or_insert_with(|| fallback_heading(current, rng));
                memory.zig = !memory.zig;
                zigzag_heading(base, memory.zig, *angle_degrees)
            }
            MovementStrategy::Attack { .. } => {
                if memory.last_known_target.is_some() {
                    current
                } else {
                    random_heading(rng, 1.0)
                }
            }
        }
    }

    /// Advance one frame
    pub fn step(&self, memory: &mut MovementMemory, input: &MovementInput<'_>) -> MovementResult {
        match self {
            MovementStrategy::Default => straight_step(input, input.direction, input.speed),

            MovementStrategy::Erratic { lookahead, .. } => {
                let mut direction = input.direction;
                let ahead = input.position + direction * *lookahead;
                if input.terrain.is_obstacle_near(ahead, STEP_PROBE_RADIUS) {
                    direction = -direction;
                }
                blocked_step(input, direction, input.speed)
            }

            MovementStrategy::ZigZag {
                angle_degrees,
                lookahead,
                wall_avoidance,
            } => {
                let base = *memory
                    .base_direction
                    .get_or_insert_with(|| input.direction.horizontal().normalized());
                let mut heading = zigzag_heading(base, memory.zig, *angle_degrees);
                let mut position = input.position;

                let ahead = position + heading * *lookahead;
                if input.terrain.is_obstacle_near(ahead, STEP_PROBE_RADIUS) {
                    memory.zig = !memory.zig;
                    memory.base_direction = Some(-base);
                    position += -heading * *wall_avoidance;
                    heading = zigzag_heading(-base, memory.zig, *angle_degrees);
                }

                let moved = MovementInput { position, ..*input };
                blocked_step(&moved, heading, input.speed)
            }

            MovementStrategy::Attack {
                charge_speed,
                charge_duration,
                cooldown_duration,
                fallback_delay,
                ..
            } => {
                if let Some(target) = input.target {
                    memory.last_known_target = Some(target);
                    memory.no_target_time = 0.0;
                } else if memory.last_known_target.is_none() {
                    memory.no_target_time += input.dt;
                    if memory.no_target_time >= *fallback_delay {
                        return straight_step(input, input.direction, input.speed);
                    }
                }

                let direction = match memory.last_known_target {
                    Some(target) if input.position.planar_distance(target) < TARGET_REACHED_DISTANCE => {
                        memory.last_known_target = None;
                        input.direction
                    }
                    Some(target) => {
                        let toward = (target - input.position).horizontal().normalized();
                        if toward.is_zero() {
                            input.direction
                        } else {
                            toward
                        }
                    }
                    None => input.direction,
                };

                let speed = if memory.charging {
                    *charge_speed
                } else {
                    input.speed
                };

                memory.charge_time += input.dt;
                let phase = if memory.charging {
                    *charge_duration
                } else {
                    *cooldown_duration
                };
                if memory.charge_time >= phase {
                    memory.charging = !memory.charging;
                    memory.charge_time = 0.0;
                }

                straight_step(input, direction, speed)
            }
        }
    }
}

fn fallback_heading<R: Rng + ?Sized>(current: Vec3, rng: &mut R) -> Vec3 {
    let flat = current.horizontal().normalized();
    if flat.is_zero() {
        random_heading(rng, 1.0)
    } else {
        flat
    }
}

fn zigzag_heading(base: Vec3, zig: bool, angle: f32) -> Vec3 {
    base.rotate_y(if zig { angle } else { -angle })
}

fn straight_step(input: &MovementInput<'_>, direction: Vec3, speed: f32) -> MovementResult {
    MovementResult {
        position: input.position + direction.horizontal() * (speed * input.dt),
        direction,
    }
}

/// Step that refuses to land on an obstacle
fn blocked_step(input: &MovementInput<'_>, direction: Vec3, speed: f32) -> MovementResult {
    let next = straight_step(input, direction, speed);
    if input.terrain.is_obstacle_near(next.position, STEP_PROBE_RADIUS) {
        MovementResult {
            position: input.position,
            direction,
        }
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::FlatTerrain;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn input<'a>(terrain: &'a FlatTerrain, position: Vec3, direction: Vec3) -> MovementInput<'a> {
        MovementInput {
            position,
            direction,
            speed: 2.0,
            dt: 0.5,
            target: None,
            terrain,
        }
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_default_moves_along_heading() {
        let terrain = FlatTerrain::new(0.0);
        let mut memory = MovementMemory::default();
        let result = MovementStrategy::Default.step(
            &mut memory,
            &input(&terrain, Vec3::ZERO, Vec3::flat(1.0, 0.0)),
        );
        assert!(approx(result.position, Vec3::flat(1.0, 0.0)));
        assert_eq!(result.direction, Vec3::flat(1.0, 0.0));
    }

    #[test]
    fn test_random_heading_is_unit_and_flat() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..50 {
            let heading = random_heading(&mut rng, 1.0);
            assert!((heading.length() - 1.0).abs() < 1e-4);
            assert_eq!(heading.y, 0.0);
        }
    }

    #[test]
    fn test_random_heading_tolerates_extreme_strength() {
        let mut rng = SmallRng::seed_from_u64(11);
        for strength in [f32::MAX, f32::INFINITY, f32::NAN, -3.0, 0.0] {
            let heading = random_heading(&mut rng, strength);
            assert!((heading.length() - 1.0).abs() < 1e-4);
            assert_eq!(heading.y, 0.0);
        }
    }

    #[test]
    fn test_erratic_turns_back_from_rock() {
        let terrain = FlatTerrain::new(0.0).with_obstacle(Vec3::flat(1.0, 0.0), 0.3);
        let mut memory = MovementMemory::default();
        let strategy = MovementStrategy::Erratic {
            strength: 1.0,
            lookahead: 1.0,
        };
        let result = strategy.step(&mut memory, &input(&terrain, Vec3::ZERO, Vec3::flat(1.0, 0.0)));
        assert_eq!(result.direction, Vec3::flat(-1.0, 0.0));
        assert!(approx(result.position, Vec3::flat(-1.0, 0.0)));
    }

    #[test]
    fn test_erratic_holds_when_step_lands_on_rock() {
        // Rock sits between the elf and its lookahead probe
        let terrain = FlatTerrain::new(0.0).with_obstacle(Vec3::flat(1.0, 0.0), 0.3);
        let mut memory = MovementMemory::default();
        let strategy = MovementStrategy::Erratic {
            strength: 1.0,
            lookahead: 3.0,
        };
        let result = strategy.step(&mut memory, &input(&terrain, Vec3::ZERO, Vec3::flat(1.0, 0.0)));
        assert_eq!(result.position, Vec3::ZERO);
    }

    #[test]
    fn test_zigzag_alternates_sides() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut memory = MovementMemory::default();
        let strategy = MovementStrategy::ZigZag {
            angle_degrees: 45.0,
            lookahead: 1.0,
            wall_avoidance: 0.5,
        };
        let base = Vec3::flat(0.0, 1.0);
        let first = strategy.next_direction(&mut memory, base, &mut rng);
        let second = strategy.next_direction(&mut memory, first, &mut rng);
        assert!(first.x * second.x < 0.0);
        assert!(first.z > 0.0 && second.z > 0.0);
    }

    #[test]
    fn test_attack_heads_for_target_and_charges() {
        let terrain = FlatTerrain::new(0.0);
        let mut memory = MovementMemory::default();
        let strategy = MovementStrategy::Attack {
            target: ElfKind::Blue,
            charge_speed: 8.0,
            charge_duration: 1.0,
            cooldown_duration: 0.5,
            detection_radius: 15.0,
            fallback_delay: 3.0,
        };

        let mut step_input = input(&terrain, Vec3::ZERO, Vec3::flat(1.0, 0.0));
        step_input.target = Some(Vec3::flat(0.0, 10.0));

        // cooldown phase: normal speed, phase flips after 0.5s
        let result = strategy.step(&mut memory, &step_input);
        assert!(approx(result.direction, Vec3::flat(0.0, 1.0)));
        assert!(approx(result.position, Vec3::flat(0.0, 1.0)));
        assert!(memory.is_charging());

        // charging: 8 * 0.5
        step_input.position = result.position;
        let result = strategy.step(&mut memory, &step_input);
        assert!(approx(result.position, Vec3::flat(0.0, 5.0)));
    }

    #[test]
    fn test_attack_forgets_reached_target() {
        let terrain = FlatTerrain::new(0.0);
        let mut memory = MovementMemory::default();
        let strategy = MovementStrategy::Attack {
            target: ElfKind::Blue,
            charge_speed: 8.0,
            charge_duration: 1.0,
            cooldown_duration: 2.0,
            detection_radius: 15.0,
            fallback_delay: 3.0,
        };
        let mut step_input = input(&terrain, Vec3::ZERO, Vec3::flat(1.0, 0.0));
        step_input.target = Some(Vec3::flat(0.2, 0.0));
        strategy.step(&mut memory, &step_input);
        assert!(memory.last_known_target().is_none());
        assert_eq!(strategy.target_query(), Some((ElfKind::Blue, 15.0)));
    }
}
