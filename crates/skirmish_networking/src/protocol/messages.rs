//! # Message Definitions
//!
//! Every message starts with a one-byte command tag. Server commands and
//! client commands use separate tag spaces.

use skirmish_core::{ActionId, EntityId, PlayerAction, Vec2};

use super::error::ProtocolError;

/// Tags of messages sent by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServerCommand {
    /// A player joined.
    NewPlayer = 0,
    /// Periodic authoritative positions.
    StateUpdate = 1,
    /// An action package was handled.
    AcknowledgeCommand = 2,
    /// A player left.
    PlayerLeft = 3,
}

impl TryFrom<u8> for ServerCommand {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, ProtocolError> {
        match tag {
            0 => Ok(Self::NewPlayer),
            1 => Ok(Self::StateUpdate),
            2 => Ok(Self::AcknowledgeCommand),
            3 => Ok(Self::PlayerLeft),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

/// Tags of messages sent by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientCommand {
    /// A batch of player actions.
    ActionPackage = 0,
}

impl TryFrom<u8> for ClientCommand {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, ProtocolError> {
        match tag {
            0 => Ok(Self::ActionPackage),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

/// How the transport should deliver a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeliveryMethod {
    /// Must arrive, in order.
    ReliableOrdered,
    /// May be lost; stale ones are discarded.
    UnreliableSequenced,
}

/// Position of one entity inside a [`StateUpdate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityPosition {
    /// Entity id.
    pub id: EntityId,
    /// Authoritative position.
    pub position: Vec2,
}

/// Periodic authoritative state sent to each client.
#[derive(Clone, Debug, PartialEq)]
pub struct StateUpdate {
    /// Server time the update was built at.
    pub timestamp: f64,
    /// Highest action id of the recipient the server has handled.
    pub last_acknowledged_action_id: ActionId,
    /// Every tracked entity.
    pub entities: Vec<EntityPosition>,
}

/// A player entity entering the match.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NewPlayer {
    /// Server time.
    pub time: f64,
    /// Entity id.
    pub id: EntityId,
    /// Spawn position.
    pub position: Vec2,
    /// True if the recipient controls this entity.
    pub owner: bool,
}

/// Decoded server message.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerMessage {
    /// See [`NewPlayer`].
    NewPlayer(NewPlayer),
    /// See [`StateUpdate`].
    StateUpdate(StateUpdate),
    /// One handled action package.
    AcknowledgeCommand {
        /// Last acknowledged action id at the time of sending.
        command_id: i32,
    },
    /// A player entity left the match.
    PlayerLeft {
        /// Entity id.
        id: EntityId,
    },
}

impl ServerMessage {
    /// Command tag of this message.
    #[must_use]
    pub const fn command(&self) -> ServerCommand {
        match self {
            Self::NewPlayer(_) => ServerCommand::NewPlayer,
            Self::StateUpdate(_) => ServerCommand::StateUpdate,
            Self::AcknowledgeCommand { .. } => ServerCommand::AcknowledgeCommand,
            Self::PlayerLeft { .. } => ServerCommand::PlayerLeft,
        }
    }

    /// Delivery method the server uses for this message.
    #[must_use]
    pub const fn delivery(&self) -> DeliveryMethod {
        match self {
            Self::StateUpdate(_) => DeliveryMethod::UnreliableSequenced,
            Self::NewPlayer(_) | Self::AcknowledgeCommand { .. } | Self::PlayerLeft { .. } => {
                DeliveryMethod::ReliableOrdered
            }
        }
    }
}

/// Decoded client message.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientMessage {
    /// A batch of actions.
    ActionPackage {
        /// Every entry that decoded cleanly, in wire order.
        actions: Vec<PlayerAction>,
        /// Problems with entries that were dropped.
        rejected: Vec<ProtocolError>,
    },
}
