//! Error types for the core world model.

use thiserror::Error;

use crate::entity::EntityId;

/// Errors raised by the core world model.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A raw action code does not name any known action.
    #[error("Unknown action type code: {0}")]
    UnknownActionType(u8),

    /// The referenced entity is not part of the match.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
