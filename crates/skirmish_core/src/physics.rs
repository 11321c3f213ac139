//! # Physics
//!
//! Physics is consumed through [`PhysicsSolver`]: "advance this entity by
//! Δt", "start moving", "jump". Tile collision lives outside this crate.
//!
//! [`PlatformerPhysics`] is the reference solver: flat ground, constant
//! gravity, horizontal velocity with exponential damping. It integrates in
//! closed form, so advancing by `a + b` gives the same state as advancing
//! by `a` then by `b`. Replay on the server and resimulation on the client
//! split time at different points and still agree.

use serde::{Deserialize, Serialize};

use crate::action::PlayerActionType;
use crate::entity::{EntityState, HorizontalDirection};

/// Physics collaborator used by the client predictor and the server.
pub trait PhysicsSolver {
    /// Advances `entity` by `dt` seconds. Non-positive `dt` is a no-op.
    fn apply_physics_update(&self, entity: &mut EntityState, dt: f64);

    /// Starts moving `entity` towards `direction`.
    fn move_entity(&self, entity: &mut EntityState, direction: HorizontalDirection);

    /// Makes `entity` jump if it is allowed to.
    fn jump(&self, entity: &mut EntityState);

    /// Applies the movement effect of one player action.
    ///
    /// Abilities and idle inputs leave the entity untouched.
    fn apply_action(&self, entity: &mut EntityState, kind: PlayerActionType) {
        match kind {
            PlayerActionType::MoveLeft => self.move_entity(entity, HorizontalDirection::Left),
            PlayerActionType::MoveRight => self.move_entity(entity, HorizontalDirection::Right),
            PlayerActionType::Jump => self.jump(entity),
            PlayerActionType::Spell1
            | PlayerActionType::Spell2
            | PlayerActionType::Spell3
            | PlayerActionType::Spell4 => {
                tracing::debug!("Entity {} cast {:?} (no movement effect)", entity.id, kind);
            }
            PlayerActionType::Idle => {}
        }
    }
}

/// Tunables for [`PlatformerPhysics`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Downward acceleration, units/s².
    pub gravity: f32,
    /// Upward speed given by a jump, units/s.
    pub jump_velocity: f32,
    /// Horizontal speed given by a move, units/s.
    pub move_speed: f32,
    /// Exponential horizontal damping rate, 1/s. Zero disables damping.
    pub horizontal_damping: f32,
    /// Height of the floor.
    pub ground_level: f32,
}

impl PhysicsConfig {
    /// Reference gravity.
    pub const DEFAULT_GRAVITY: f32 = 1200.0;
    /// Reference jump velocity.
    pub const DEFAULT_JUMP_VELOCITY: f32 = 500.0;
    /// Reference move speed.
    pub const DEFAULT_MOVE_SPEED: f32 = 200.0;
    /// Reference damping rate.
    pub const DEFAULT_HORIZONTAL_DAMPING: f32 = 10.0;
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Self::DEFAULT_GRAVITY,
            jump_velocity: Self::DEFAULT_JUMP_VELOCITY,
            move_speed: Self::DEFAULT_MOVE_SPEED,
            horizontal_damping: Self::DEFAULT_HORIZONTAL_DAMPING,
            ground_level: 0.0,
        }
    }
}

/// Flat-ground platformer kinematics.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlatformerPhysics {
    config: PhysicsConfig,
}

impl PlatformerPhysics {
    /// Creates a solver with the given tunables.
    #[must_use]
    pub const fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    /// Current tunables.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// True if the entity stands on the floor.
    #[must_use]
    pub fn is_grounded(&self, entity: &EntityState) -> bool {
        entity.position.y <= self.config.ground_level && entity.velocity.y <= 0.0
    }

    fn integrate_horizontal(&self, entity: &mut EntityState, dt: f64) {
        let vx = f64::from(entity.velocity.x);
        if vx == 0.0 {
            return;
        }
        let k = f64::from(self.config.horizontal_damping);

        let (dx, new_vx) = if k > 0.0 {
            let decay = (-k * dt).exp();
            (vx * (1.0 - decay) / k, vx * decay)
        } else {
            (vx * dt, vx)
        };

        entity.position.x = (f64::from(entity.position.x) + dx) as f32;
        entity.velocity.x = new_vx as f32;
    }

    fn integrate_vertical(&self, entity: &mut EntityState, dt: f64) {
        let ground = f64::from(self.config.ground_level);
        let g = f64::from(self.config.gravity);
        let y = f64::from(entity.position.y);
        let vy = f64::from(entity.velocity.y);

        if self.is_grounded(entity) {
            entity.position.y = self.config.ground_level;
            entity.velocity.y = 0.0;
            return;
        }

        // Time until y(t) = ground for y(t) = y + vy*t - g*t²/2.
        let height = (y - ground).max(0.0);
        let landing = if g > 0.0 {
            Some((vy + (vy * vy + 2.0 * g * height).sqrt()) / g)
        } else if vy < 0.0 {
            Some(height / -vy)
        } else {
            None
        };

        if landing.is_some_and(|t| t <= dt) {
            entity.position.y = self.config.ground_level;
            entity.velocity.y = 0.0;
        } else {
            entity.position.y = (y + vy * dt - 0.5 * g * dt * dt) as f32;
            entity.velocity.y = (vy - g * dt) as f32;
        }
    }
}

impl PhysicsSolver for PlatformerPhysics {
    fn apply_physics_update(&self, entity: &mut EntityState, dt: f64) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        self.integrate_horizontal(entity, dt);
        self.integrate_vertical(entity, dt);
    }

    fn move_entity(&self, entity: &mut EntityState, direction: HorizontalDirection) {
        entity.direction = direction;
        entity.velocity.x = direction.sign() * self.config.move_speed;
    }

    fn jump(&self, entity: &mut EntityState) {
        if self.is_grounded(entity) {
            entity.velocity.y = self.config.jump_velocity;
        }
    }
}
