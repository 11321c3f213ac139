//! # Network Protocol
//!
//! Binary messages exchanged between client and server.
//!
//! ## Message Structure
//!
//! ```text
//! ┌─────────────┬─────────────────────────────────────────────┐
//! │ Command (1) │ Body (little-endian, layout per command)    │
//! └─────────────┴─────────────────────────────────────────────┘
//! ```
//!
//! Client → server: `ActionPackage`.
//! Server → client: `NewPlayer`, `StateUpdate`, `AcknowledgeCommand`,
//! `PlayerLeft`.

mod error;
mod messages;
mod serialization;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    ClientCommand, ClientMessage, DeliveryMethod, EntityPosition, NewPlayer, ServerCommand,
    ServerMessage, StateUpdate,
};
pub use serialization::{
    decode_client_message, decode_server_message, encode_server_message, PacketDeserializer,
    PacketSerializer, ACTION_ENTRY_SIZE, ENTITY_ENTRY_SIZE,
};
