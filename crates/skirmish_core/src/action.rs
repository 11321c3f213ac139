//! # Player Actions
//!
//! A discrete player input, stamped with the client's clock and the
//! position the client believed it was at when acting.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::math::Vec2;

/// Identifier of an action, monotonic per sending client.
pub type ActionId = u64;

/// Kind of player input.
///
/// The discriminants are the wire codes and must never be reordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PlayerActionType {
    /// Start moving left.
    MoveLeft = 0,
    /// Start moving right.
    MoveRight = 1,
    /// Jump if grounded.
    Jump = 2,
    /// First ability slot.
    Spell1 = 3,
    /// Second ability slot.
    Spell2 = 4,
    /// Third ability slot.
    Spell3 = 5,
    /// Fourth ability slot.
    Spell4 = 6,
    /// No input; keeps the action stream alive.
    Idle = 7,
}

impl PlayerActionType {
    /// Every action kind, in wire-code order.
    pub const ALL: [Self; 8] = [
        Self::MoveLeft,
        Self::MoveRight,
        Self::Jump,
        Self::Spell1,
        Self::Spell2,
        Self::Spell3,
        Self::Spell4,
        Self::Idle,
    ];

    /// Wire code of this kind.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decodes a wire code.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownActionType`] for codes outside the enum.
    pub fn from_code(code: u8) -> CoreResult<Self> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or(CoreError::UnknownActionType(code))
    }

    /// True for the ability kinds, which carry no movement effect.
    #[inline]
    #[must_use]
    pub const fn is_spell(self) -> bool {
        matches!(self, Self::Spell1 | Self::Spell2 | Self::Spell3 | Self::Spell4)
    }
}

impl TryFrom<u8> for PlayerActionType {
    type Error = CoreError;

    fn try_from(code: u8) -> CoreResult<Self> {
        Self::from_code(code)
    }
}

/// A player input as claimed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerAction {
    /// Client-assigned id.
    pub id: ActionId,
    /// What the player did.
    pub kind: PlayerActionType,
    /// Client clock time of the action, in seconds.
    pub time: f64,
    /// Position the client claims it was at.
    pub position: Vec2,
}

impl PlayerAction {
    /// Creates an action.
    #[must_use]
    pub const fn new(id: ActionId, kind: PlayerActionType, time: f64, position: Vec2) -> Self {
        Self {
            id,
            kind,
            time,
            position,
        }
    }
}
