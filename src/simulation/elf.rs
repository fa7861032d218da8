// src/simulation/elf.rs
//! The pooled elf entity
//!
//! An [`Elf`] is built once by its kind's pool and reused for as long as the
//! pool lives. While checked out it carries a position, a heading and a
//! lifecycle state; once returned it is inert until the next activation.

use crate::interfaces::{EffectPlayer, ElfView};
use crate::movement::motion::MotionState;
use crate::pool::object_pool::{InstanceId, PoolId, Poolable};
use crate::pool::particle_effects::EffectChannel;
use crate::simulation::state_machine::{ElfState, ElfStateMachine, Transition};
use crate::utils::math::{Color, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of elf kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElfKind {
    Black,
    Red,
    White,
    Blue,
}

impl ElfKind {
    pub const ALL: [ElfKind; 4] = [ElfKind::Black, ElfKind::Red, ElfKind::White, ElfKind::Blue];

    pub fn as_str(self) -> &'static str {
        match self {
            ElfKind::Black => "black",
            ElfKind::Red => "red",
            ElfKind::White => "white",
            ElfKind::Blue => "blue",
        }
    }

    pub fn default_color(self) -> Color {
        match self {
            ElfKind::Black => Color::new(0.15, 0.15, 0.15),
            ElfKind::Red => Color::RED,
            ElfKind::White => Color::WHITE,
            ElfKind::Blue => Color::BLUE,
        }
    }
}

impl fmt::Display for ElfKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A simulated elf
#[derive(Debug, Clone)]
pub struct Elf {
    id: InstanceId,
    pool: Option<PoolId>,
    kind: ElfKind,
    color: Color,

    pub position: Vec3,

    /// Heading and movement-policy memory
    pub motion: MotionState,

    machine: ElfStateMachine,

    /// Injected by the factory on every draw
    effects: Option<EffectChannel>,
}

impl Elf {
    pub fn new(id: InstanceId, kind: ElfKind, color: Color) -> Self {
        Self {
            id,
            pool: None,
            kind,
            color,
            position: Vec3::ZERO,
            motion: MotionState::default(),
            machine: ElfStateMachine::new(),
            effects: None,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn kind(&self) -> ElfKind {
        self.kind
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn state(&self) -> ElfState {
        self.machine.state()
    }

    /// Generation of the current activation
    pub fn activation(&self) -> u32 {
        self.machine.activation()
    }

    pub fn is_active(&self) -> bool {
        self.machine.is_active()
    }

    pub fn can_collide(&self) -> bool {
        self.machine.can_collide()
    }

    pub fn has_effects(&self) -> bool {
        self.effects.is_some()
    }

    pub fn bind_effects(&mut self, channel: EffectChannel) {
        self.effects = Some(channel);
    }

    /// Place in the world and start spawning
    pub fn activate(&mut self, position: Vec3, spawn_duration: f32) -> Transition {
        self.position = position;
        self.motion.reset();
        self.machine.activate(spawn_duration)
    }

    /// Advance the lifecycle timer
    pub fn update(&mut self, dt: f32) -> Option<Transition> {
        self.machine.update(dt)
    }

    pub fn replicate(&mut self, cooldown: f32) -> Option<Transition> {
        self.machine.begin_replication(cooldown)
    }

    /// Start exploding and fire the explosion effect. No-op when already exploding.
    pub fn explode(&mut self) -> Option<Transition> {
        let transition = self.machine.begin_explosion()?;
        if let Some(effects) = &self.effects {
            effects.play_explosion(self.position);
        }
        Some(transition)
    }

    pub fn play_spawn_effect(&self) {
        if let Some(effects) = &self.effects {
            effects.play_spawn(self.position);
        }
    }

    /// Push the current state's look to the view
    pub fn apply_visuals(&self, view: &mut dyn ElfView) {
        if let Some(visuals) = self.state().visuals(self.color) {
            view.set_emission(self.id, visuals.emission, visuals.emission_color);
            view.set_scale(self.id, visuals.full_scale);
        }
    }
}

impl Poolable for Elf {
    fn instance_id(&self) -> InstanceId {
        self.id
    }

    fn attach_pool(&mut self, pool: PoolId) {
        self.pool = Some(pool);
    }

    fn pool(&self) -> Option<PoolId> {
        self.pool
    }

    fn on_return(&mut self) {
        self.machine.deactivate();
        self.motion.reset();
        self.effects = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::{RecordingView, ViewCommand};
    use crate::pool::particle_effects::ParticleEffects;
    use crate::utils::config::EffectsConfig;

    fn elf() -> Elf {
        Elf::new(InstanceId::new(PoolId(4), 0), ElfKind::Red, Color::RED)
    }

    #[test]
    fn test_kind_serde_names() {
        let kind: ElfKind = serde_json::from_str("\"white\"").unwrap();
        assert_eq!(kind, ElfKind::White);
        assert_eq!(serde_json::to_string(&ElfKind::Blue).unwrap(), "\"blue\"");
        assert_eq!(ElfKind::Red.default_color(), Color::RED);
    }

    #[test]
    fn test_activation_places_and_spawns() {
        let mut elf = elf();
        assert!(!elf.is_active());

        elf.activate(Vec3::new(1.0, 0.1, 2.0), 2.0);
        assert_eq!(elf.state(), ElfState::Spawning);
        assert_eq!(elf.position, Vec3::new(1.0, 0.1, 2.0));
        assert_eq!(elf.activation(), 1);
    }

    #[test]
    fn test_explode_plays_effect_once() {
        let mut effects = ParticleEffects::new(PoolId(0), PoolId(1), EffectsConfig::default());
        let mut elf = elf();
        elf.bind_effects(effects.channel());
        elf.activate(Vec3::ZERO, 0.0);
        elf.update(0.0);

        assert!(elf.explode().is_some());
        assert!(elf.explode().is_none());
        assert_eq!(effects.process(0.0), 1);
    }

    #[test]
    fn test_explode_without_effects_still_transitions() {
        let mut elf = elf();
        elf.activate(Vec3::ZERO, 0.0);
        elf.update(0.0);
        assert!(elf.explode().is_some());
        assert_eq!(elf.state(), ElfState::Exploding);
    }

    #[test]
    fn test_return_goes_inert() {
        let effects = ParticleEffects::new(PoolId(0), PoolId(1), EffectsConfig::default());
        let mut elf = elf();
        elf.bind_effects(effects.channel());
        elf.activate(Vec3::ZERO, 2.0);

        elf.on_return();
        assert_eq!(elf.state(), ElfState::Inactive);
        assert!(!elf.has_effects());
    }

    #[test]
    fn test_visuals_follow_state() {
        let mut view = RecordingView::new();
        let mut elf = elf();
        elf.activate(Vec3::ZERO, 1.0);
        elf.apply_visuals(&mut view);

        assert_eq!(
            view.last_for(elf.id(), |c| matches!(c, ViewCommand::Scale(..))),
            Some(ViewCommand::Scale(elf.id(), false))
        );

        elf.update(1.0);
        elf.apply_visuals(&mut view);
        assert_eq!(
            view.last_for(elf.id(), |c| matches!(c, ViewCommand::Emission(..))),
            Some(ViewCommand::Emission(elf.id(), false, Color::BLACK))
        );
    }
}
