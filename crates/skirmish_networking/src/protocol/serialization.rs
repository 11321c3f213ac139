//! # Message Serialization
//!
//! Little-endian encoding of every message.
//!
//! ## Layouts
//!
//! ```text
//! StateUpdate         tag | timestamp f64 | last_ack u32 | { id u32, x f32, y f32 }*
//! ActionPackage       tag | { id u32, time f32, type u8, x f32, y f32 }*
//! AcknowledgeCommand  tag | command_id i32
//! NewPlayer           tag | time f64 | id u32 | x f32 | y f32 | owner u8
//! PlayerLeft          tag | id u32
//! ```
//!
//! Repeated sections run until the message is exhausted.

use skirmish_core::{EntityId, PlayerAction, PlayerActionType, Vec2};

use super::error::{ProtocolError, ProtocolResult};
use super::messages::{
    ClientCommand, ClientMessage, EntityPosition, NewPlayer, ServerCommand, ServerMessage,
    StateUpdate,
};

/// Wire size of one action package entry.
pub const ACTION_ENTRY_SIZE: usize = 4 + 4 + 1 + 4 + 4;

/// Wire size of one state update entry.
pub const ENTITY_ENTRY_SIZE: usize = 4 + 4 + 4;

/// Message serializer - writes messages to a reusable buffer.
///
/// Each `serialize_*` call resets the buffer first.
pub struct PacketSerializer {
    buffer: Vec<u8>,
}

impl PacketSerializer {
    /// Creates a serializer with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(crate::MAX_PACKET_SIZE),
        }
    }

    /// Resets the serializer for reuse.
    #[inline]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the written data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Copies the written data out.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.clone()
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an i32 in little-endian format.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a f32 in little-endian format.
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a f64 in little-endian format.
    #[inline]
    pub fn write_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a position as two f32.
    #[inline]
    pub fn write_vec2(&mut self, value: Vec2) {
        for component in bytemuck::cast::<Vec2, [f32; 2]>(value) {
            self.write_f32(component);
        }
    }

    /// Serializes any server message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::IdOutOfRange`] if an action id does not fit
    /// in `u32`.
    pub fn serialize_server_message(&mut self, message: &ServerMessage) -> ProtocolResult<()> {
        match message {
            ServerMessage::NewPlayer(new_player) => {
                self.serialize_new_player(new_player);
                Ok(())
            }
            ServerMessage::StateUpdate(update) => self.serialize_state_update(update),
            ServerMessage::AcknowledgeCommand { command_id } => {
                self.serialize_acknowledge(*command_id);
                Ok(())
            }
            ServerMessage::PlayerLeft { id } => {
                self.serialize_player_left(*id);
                Ok(())
            }
        }
    }

    /// Serializes a state update.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::IdOutOfRange`] if the acknowledged id does
    /// not fit in `u32`.
    pub fn serialize_state_update(&mut self, update: &StateUpdate) -> ProtocolResult<()> {
        let last_ack = u32::try_from(update.last_acknowledged_action_id)
            .map_err(|_| ProtocolError::IdOutOfRange(update.last_acknowledged_action_id))?;

        self.reset();
        self.write_u8(ServerCommand::StateUpdate as u8);
        self.write_f64(update.timestamp);
        self.write_u32(last_ack);
        for entity in &update.entities {
            self.write_u32(entity.id.raw());
            self.write_vec2(entity.position);
        }
        Ok(())
    }

    /// Serializes a batch of actions.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::IdOutOfRange`] if an action id does not fit
    /// in `u32`. Nothing is written in that case.
    pub fn serialize_action_package(&mut self, actions: &[PlayerAction]) -> ProtocolResult<()> {
        if let Some(bad) = actions.iter().find(|a| u32::try_from(a.id).is_err()) {
            return Err(ProtocolError::IdOutOfRange(bad.id));
        }

        self.reset();
        self.write_u8(ClientCommand::ActionPackage as u8);
        for action in actions {
            self.write_u32(action.id as u32);
            self.write_f32(f32_not_above(action.time));
            self.write_u8(action.kind.code());
            self.write_vec2(action.position);
        }
        Ok(())
    }

    /// Serializes an acknowledgement.
    pub fn serialize_acknowledge(&mut self, command_id: i32) {
        self.reset();
        self.write_u8(ServerCommand::AcknowledgeCommand as u8);
        self.write_i32(command_id);
    }

    /// Serializes a new player announcement.
    pub fn serialize_new_player(&mut self, new_player: &NewPlayer) {
        self.reset();
        self.write_u8(ServerCommand::NewPlayer as u8);
        self.write_f64(new_player.time);
        self.write_u32(new_player.id.raw());
        self.write_vec2(new_player.position);
        self.write_u8(u8::from(new_player.owner));
    }

    /// Serializes a player departure.
    pub fn serialize_player_left(&mut self, id: EntityId) {
        self.reset();
        self.write_u8(ServerCommand::PlayerLeft as u8);
        self.write_u32(id.raw());
    }
}

impl Default for PacketSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Message deserializer - reads messages from a buffer.
pub struct PacketDeserializer<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> PacketDeserializer<'a> {
    /// Creates a new deserializer from a buffer.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    fn take<const N: usize>(&mut self) -> ProtocolResult<[u8; N]> {
        let end = self.position + N;
        let bytes = self
            .buffer
            .get(self.position..end)
            .ok_or(ProtocolError::UnexpectedEnd)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.position = end;
        Ok(out)
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::UnexpectedEnd`] past the end of the buffer, as for
    /// every `read_*`.
    #[inline]
    pub fn read_u8(&mut self) -> ProtocolResult<u8> {
        self.take::<1>().map(|[b]| b)
    }

    /// Reads a u32 in little-endian format.
    #[inline]
    pub fn read_u32(&mut self) -> ProtocolResult<u32> {
        self.take().map(u32::from_le_bytes)
    }

    /// Reads an i32 in little-endian format.
    #[inline]
    pub fn read_i32(&mut self) -> ProtocolResult<i32> {
        self.take().map(i32::from_le_bytes)
    }

    /// Reads a f32 in little-endian format.
    #[inline]
    pub fn read_f32(&mut self) -> ProtocolResult<f32> {
        self.take().map(f32::from_le_bytes)
    }

    /// Reads a f64 in little-endian format.
    #[inline]
    pub fn read_f64(&mut self) -> ProtocolResult<f64> {
        self.take().map(f64::from_le_bytes)
    }

    /// Reads a position as two f32.
    #[inline]
    pub fn read_vec2(&mut self) -> ProtocolResult<Vec2> {
        let components = [self.read_f32()?, self.read_f32()?];
        Ok(bytemuck::cast(components))
    }

    /// Decodes a message sent by the server.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty buffer, an unknown tag, a missing
    /// field, or a state update ending in a partial entry.
    pub fn deserialize_server_message(&mut self) -> ProtocolResult<ServerMessage> {
        let command = ServerCommand::try_from(self.read_u8()?)?;

        match command {
            ServerCommand::NewPlayer => {
                let time = self.read_f64()?;
                let id = EntityId::new(self.read_u32()?);
                let position = self.read_vec2()?;
                let owner = self.read_u8()? != 0;
                Ok(ServerMessage::NewPlayer(NewPlayer {
                    time,
                    id,
                    position,
                    owner,
                }))
            }
            ServerCommand::StateUpdate => {
                let timestamp = self.read_f64()?;
                let last_acknowledged_action_id = u64::from(self.read_u32()?);

                let mut entities = Vec::with_capacity(self.remaining() / ENTITY_ENTRY_SIZE);
                while self.remaining() > 0 {
                    if self.remaining() < ENTITY_ENTRY_SIZE {
                        return Err(ProtocolError::Truncated {
                            remaining: self.remaining(),
                        });
                    }
                    let id = EntityId::new(self.read_u32()?);
                    let position = self.read_vec2()?;
                    entities.push(EntityPosition { id, position });
                }

                Ok(ServerMessage::StateUpdate(StateUpdate {
                    timestamp,
                    last_acknowledged_action_id,
                    entities,
                }))
            }
            ServerCommand::AcknowledgeCommand => Ok(ServerMessage::AcknowledgeCommand {
                command_id: self.read_i32()?,
            }),
            ServerCommand::PlayerLeft => Ok(ServerMessage::PlayerLeft {
                id: EntityId::new(self.read_u32()?),
            }),
        }
    }

    /// Decodes a message sent by a client.
    ///
    /// Entries of an action package with an unknown type are dropped and
    /// reported in `rejected`; a trailing partial entry is dropped the same
    /// way. The remaining entries are kept.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty buffer or an unknown tag.
    pub fn deserialize_client_message(&mut self) -> ProtocolResult<ClientMessage> {
        let command = ClientCommand::try_from(self.read_u8()?)?;

        match command {
            ClientCommand::ActionPackage => {
                let mut actions = Vec::with_capacity(self.remaining() / ACTION_ENTRY_SIZE);
                let mut rejected = Vec::new();

                while self.remaining() > 0 {
                    if self.remaining() < ACTION_ENTRY_SIZE {
                        rejected.push(ProtocolError::Truncated {
                            remaining: self.remaining(),
                        });
                        break;
                    }
                    let id = u64::from(self.read_u32()?);
                    let time = f64::from(self.read_f32()?);
                    let code = self.read_u8()?;
                    let position = self.read_vec2()?;

                    match PlayerActionType::try_from(code) {
                        Ok(kind) => actions.push(PlayerAction::new(id, kind, time, position)),
                        Err(_) => rejected.push(ProtocolError::UnknownActionType(code)),
                    }
                }

                Ok(ClientMessage::ActionPackage { actions, rejected })
            }
        }
    }
}

/// Narrows `value` to the nearest `f32` that is not greater than it.
///
/// Action times are compared against the server clock; rounding up would
/// make an honest claim look like it comes from the future.
fn f32_not_above(value: f64) -> f32 {
    let rounded = value as f32;
    if !rounded.is_finite() || f64::from(rounded) <= value {
        return rounded;
    }
    if rounded > 0.0 {
        f32::from_bits(rounded.to_bits() - 1)
    } else if rounded == 0.0 {
        -f32::from_bits(1)
    } else {
        f32::from_bits(rounded.to_bits() + 1)
    }
}

/// Encodes a server message into a fresh buffer.
///
/// # Errors
///
/// See [`PacketSerializer::serialize_server_message`].
pub fn encode_server_message(message: &ServerMessage) -> ProtocolResult<Vec<u8>> {
    let mut serializer = PacketSerializer::new();
    serializer.serialize_server_message(message)?;
    Ok(serializer.to_vec())
}

/// Decodes a server message.
///
/// # Errors
///
/// See [`PacketDeserializer::deserialize_server_message`].
pub fn decode_server_message(bytes: &[u8]) -> ProtocolResult<ServerMessage> {
    PacketDeserializer::new(bytes).deserialize_server_message()
}

/// Decodes a client message.
///
/// # Errors
///
/// See [`PacketDeserializer::deserialize_client_message`].
pub fn decode_client_message(bytes: &[u8]) -> ProtocolResult<ClientMessage> {
    PacketDeserializer::new(bytes).deserialize_client_message()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn action(id: u64, kind: PlayerActionType, time: f64) -> PlayerAction {
        PlayerAction::new(id, kind, time, Vec2::new(120.0, 0.0))
    }

    #[test]
    fn test_action_package_layout() {
        let mut serializer = PacketSerializer::new();
        serializer
            .serialize_action_package(&[
                action(1, PlayerActionType::MoveLeft, 1.5),
                action(2, PlayerActionType::Jump, 1.75),
            ])
            .unwrap();

        assert_eq!(serializer.len(), 1 + 2 * ACTION_ENTRY_SIZE);
        let bytes = serializer.as_slice();
        assert_eq!(bytes[0], ClientCommand::ActionPackage as u8);
        assert_eq!(&bytes[1..5], &1u32.to_le_bytes());
        assert_eq!(&bytes[5..9], &1.5f32.to_le_bytes());
        assert_eq!(bytes[9], PlayerActionType::MoveLeft.code());

        let ClientMessage::ActionPackage { actions, rejected } =
            decode_client_message(bytes).unwrap();
        assert!(rejected.is_empty());
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1].id, 2);
        assert_eq!(actions[1].kind, PlayerActionType::Jump);
        assert_eq!(actions[1].time, 1.75);
    }

    #[test]
    fn test_unknown_action_type_drops_only_that_entry() {
        let mut serializer = PacketSerializer::new();
        serializer
            .serialize_action_package(&[
                action(1, PlayerActionType::MoveLeft, 1.0),
                action(2, PlayerActionType::MoveRight, 1.1),
                action(3, PlayerActionType::Jump, 1.2),
            ])
            .unwrap();
        let mut bytes = serializer.to_vec();
        // Type byte of the second entry.
        bytes[1 + ACTION_ENTRY_SIZE + 8] = 99;

        let ClientMessage::ActionPackage { actions, rejected } =
            decode_client_message(&bytes).unwrap();
        assert_eq!(rejected, vec![ProtocolError::UnknownActionType(99)]);
        let ids: Vec<u64> = actions.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_trailing_partial_action_entry() {
        let mut serializer = PacketSerializer::new();
        serializer
            .serialize_action_package(&[action(1, PlayerActionType::Idle, 1.0)])
            .unwrap();
        let mut bytes = serializer.to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);

        let ClientMessage::ActionPackage { actions, rejected } =
            decode_client_message(&bytes).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(rejected, vec![ProtocolError::Truncated { remaining: 3 }]);
    }

    #[test]
    fn test_action_id_out_of_range() {
        let mut serializer = PacketSerializer::new();
        let too_big = u64::from(u32::MAX) + 1;
        assert_eq!(
            serializer.serialize_action_package(&[action(too_big, PlayerActionType::Idle, 0.0)]),
            Err(ProtocolError::IdOutOfRange(too_big))
        );
    }

    #[test]
    fn test_state_update_layout() {
        let update = StateUpdate {
            timestamp: 12.5,
            last_acknowledged_action_id: 41,
            entities: vec![
                EntityPosition {
                    id: EntityId::new(1),
                    position: Vec2::new(100.0, 0.0),
                },
                EntityPosition {
                    id: EntityId::new(2),
                    position: Vec2::new(250.0, 32.0),
                },
            ],
        };
        let bytes = encode_server_message(&ServerMessage::StateUpdate(update.clone())).unwrap();
        assert_eq!(bytes.len(), 1 + 8 + 4 + 2 * ENTITY_ENTRY_SIZE);
        assert_eq!(
            decode_server_message(&bytes).unwrap(),
            ServerMessage::StateUpdate(update)
        );
    }

    #[test]
    fn test_state_update_truncated() {
        let update = StateUpdate {
            timestamp: 1.0,
            last_acknowledged_action_id: 0,
            entities: vec![EntityPosition {
                id: EntityId::new(1),
                position: Vec2::ZERO,
            }],
        };
        let bytes = encode_server_message(&ServerMessage::StateUpdate(update)).unwrap();
        assert_eq!(
            decode_server_message(&bytes[..bytes.len() - 4]),
            Err(ProtocolError::Truncated { remaining: 8 })
        );
    }

    #[test]
    fn test_small_messages() {
        let messages = [
            ServerMessage::AcknowledgeCommand { command_id: 17 },
            ServerMessage::PlayerLeft {
                id: EntityId::new(4),
            },
            ServerMessage::NewPlayer(NewPlayer {
                time: 3.25,
                id: EntityId::new(2),
                position: Vec2::new(150.0, 0.0),
                owner: true,
            }),
        ];
        for message in messages {
            let bytes = encode_server_message(&message).unwrap();
            assert_eq!(bytes[0], message.command() as u8);
            assert_eq!(decode_server_message(&bytes).unwrap(), message);
        }
    }

    #[test]
    fn test_malformed_messages() {
        assert_eq!(decode_server_message(&[]), Err(ProtocolError::UnexpectedEnd));
        assert_eq!(decode_server_message(&[42]), Err(ProtocolError::UnknownCommand(42)));
        assert_eq!(
            decode_server_message(&[ServerCommand::AcknowledgeCommand as u8, 1]),
            Err(ProtocolError::UnexpectedEnd)
        );
        assert_eq!(decode_client_message(&[7]), Err(ProtocolError::UnknownCommand(7)));
    }

    #[test]
    fn test_action_time_never_rounds_up() {
        for time in [0.05, 0.1, 1.0 / 60.0, 0.7, 12.345_678_9, -0.3] {
            let narrowed = f32_not_above(time);
            assert!(f64::from(narrowed) <= time, "{time} -> {narrowed}");
            assert!(time - f64::from(narrowed) < 1e-6);
        }
    }

    proptest! {
        #[test]
        fn prop_decoding_arbitrary_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode_server_message(&bytes);
            if let Ok(ClientMessage::ActionPackage { actions, rejected }) = decode_client_message(&bytes) {
                let whole_entries = (bytes.len() - 1) / ACTION_ENTRY_SIZE;
                prop_assert!(actions.len() + rejected.len() <= whole_entries + 1);
                prop_assert!(actions.len() <= whole_entries);
            }
        }
    }
}
