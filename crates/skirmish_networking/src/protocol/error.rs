//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding a message.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The message ended before a required field.
    #[error("Message ended unexpectedly")]
    UnexpectedEnd,

    /// The leading command tag is not known.
    #[error("Unknown command tag: {0}")]
    UnknownCommand(u8),

    /// An action entry carries an unknown action type.
    #[error("Unknown action type: {0}")]
    UnknownActionType(u8),

    /// An id does not fit its wire representation.
    #[error("Id {0} does not fit on the wire")]
    IdOutOfRange(u64),

    /// A repeated section ends with a partial entry.
    #[error("Trailing partial entry of {remaining} bytes")]
    Truncated {
        /// Bytes left over.
        remaining: usize,
    },
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
