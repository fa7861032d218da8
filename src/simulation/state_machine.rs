// src/simulation/state_machine.rs
//! Elf lifecycle state machine
//!
//! ```text
//!            activate                 timer                    same kind
//! Inactive ───────────► Spawning ─────────────► Idle ──────────────────► Replicating
//!     ▲                                         │  ▲                         │
//!     │ pool return                  other kind │  └──────── timer ──────────┘
//!     └─────────────── Exploding ◄──────────────┘
//! ```
//!
//! `Spawning` and `Replicating` are timed and fall back to `Idle` on their
//! own. `Exploding` never returns to `Idle` within one activation: the only
//! way out is the pool. Only an `Idle` elf takes part in collisions.
//!
//! Every activation bumps a generation counter so deferred work aimed at a
//! previous activation can recognise that its target has been recycled.

use crate::utils::math::Color;
use serde::Serialize;
use tracing::trace;

/// Emission multiplier while an elf is not collision-eligible
const GLOW_INTENSITY: f32 = 2.0;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElfState {
    /// Sitting in its pool
    Inactive,
    Spawning,
    Idle,
    Replicating,
    Exploding,
}

impl ElfState {
    pub fn is_timed(self) -> bool {
        matches!(self, ElfState::Spawning | ElfState::Replicating)
    }

    /// Presentation for this state, `None` when the view is left alone
    pub fn visuals(self, color: Color) -> Option<StateVisuals> {
        match self {
            ElfState::Spawning | ElfState::Replicating => Some(StateVisuals {
                emission: true,
                emission_color: color.scaled(GLOW_INTENSITY),
                full_scale: false,
            }),
            ElfState::Idle => Some(StateVisuals {
                emission: false,
                emission_color: Color::BLACK,
                full_scale: true,
            }),
            ElfState::Inactive | ElfState::Exploding => None,
        }
    }
}

/// View settings mirroring a state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVisuals {
    pub emission: bool,
    pub emission_color: Color,
    pub full_scale: bool,
}

/// A state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ElfState,
    pub to: ElfState,
}

/// Current state, its remaining time and the activation generation
#[derive(Debug, Clone)]
pub struct ElfStateMachine {
    state: ElfState,

    /// Time left in a timed state (seconds)
    remaining: f32,

    activation: u32,
}

impl Default for ElfStateMachine {
    fn default() -> Self {
        Self {
            state: ElfState::Inactive,
            remaining: 0.0,
            activation: 0,
        }
    }
}

impl ElfStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ElfState {
        self.state
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn activation(&self) -> u32 {
        self.activation
    }

    pub fn is_active(&self) -> bool {
        self.state != ElfState::Inactive
    }

    /// Only idle elves react to contacts
    pub fn can_collide(&self) -> bool {
        self.state == ElfState::Idle
    }

    /// Drawn from the pool and placed: enter `Spawning`
    pub fn activate(&mut self, spawn_duration: f32) -> Transition {
        self.activation = self.activation.wrapping_add(1);
        self.enter(ElfState::Spawning, spawn_duration)
    }

    /// Advance the state timer; reports the fall back to `Idle`
    pub fn update(&mut self, dt: f32) -> Option<Transition> {
        if !self.state.is_timed() {
            return None;
        }

        self.remaining -= dt;
        if self.remaining <= 0.0 {
            Some(self.enter(ElfState::Idle, 0.0))
        } else {
            None
        }
    }

    /// Same-kind collision
    pub fn begin_replication(&mut self, cooldown: f32) -> Option<Transition> {
        if !self.can_collide() {
            return None;
        }
        Some(self.enter(ElfState::Replicating, cooldown))
    }

    /// Cross-kind collision or forced destruction. A second call is a no-op.
    pub fn begin_explosion(&mut self) -> Option<Transition> {
        match self.state {
            ElfState::Inactive | ElfState::Exploding => None,
            _ => Some(self.enter(ElfState::Exploding, 0.0)),
        }
    }

    /// Back in the pool
    pub fn deactivate(&mut self) {
        if self.state != ElfState::Inactive {
            self.enter(ElfState::Inactive, 0.0);
        }
    }

    fn enter(&mut self, state: ElfState, duration: f32) -> Transition {
        let transition = Transition {
            from: self.state,
            to: state,
        };
        trace!("{:?} -> {:?} ({:.2}s)", transition.from, state, duration);
        self.state = state;
        self.remaining = duration;
        transition
    }
}
