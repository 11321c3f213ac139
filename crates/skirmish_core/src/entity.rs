//! # Entity State
//!
//! The per-entity record stored in every world snapshot.
//!
//! `EntityState` is `Copy`: a snapshot never shares sub-structure with
//! another snapshot or with the live match, so rewriting history in place
//! cannot leak into the present by accident.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// Identifier of a player entity.
///
/// Ids are allocated by the server, starting at 1, and travel on the wire
/// as `u32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates an id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw wire value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for EntityId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Horizontal facing / movement direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HorizontalDirection {
    /// Towards negative x.
    Left,
    /// Towards positive x.
    #[default]
    Right,
}

impl HorizontalDirection {
    /// `-1.0` for left, `1.0` for right.
    #[inline]
    #[must_use]
    pub const fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

/// Full simulated state of one entity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Entity id.
    pub id: EntityId,
    /// World position (y up).
    pub position: Vec2,
    /// Velocity in units per second.
    pub velocity: Vec2,
    /// Facing direction.
    pub direction: HorizontalDirection,
    /// Remaining health.
    pub health: u16,
}

impl EntityState {
    /// Health of a freshly spawned entity.
    pub const DEFAULT_HEALTH: u16 = 100;

    /// Creates an entity at rest at `position`.
    #[must_use]
    pub const fn new(id: EntityId, position: Vec2) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            direction: HorizontalDirection::Right,
            health: Self::DEFAULT_HEALTH,
        }
    }
}
