//! # Game Client
//!
//! Client-side networking around the [`ClientPredictor`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      GAME CLIENT                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Prediction   │  │ Remote       │  │ Network I/O  │       │
//! │  │ (Local)      │  │ entities     │  │ (bytes)      │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │         │                 │                 │               │
//! │         └─────────────────┼─────────────────┘               │
//! │                           │                                 │
//! │              ┌────────────▼──────────┐                      │
//! │              │  Local World View     │                      │
//! │              │  (drawn positions)    │                      │
//! │              └───────────────────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The client does not own a socket: [`GameClient::handle_packet`] takes
//! received bytes and [`GameClient::update`] returns the bytes to send.

use std::collections::BTreeMap;

use skirmish_core::{Clock, EntityId, EntityState, PhysicsSolver, PlayerActionType, Vec2};

use crate::config::ClientConfig;
use crate::prediction::ClientPredictor;
use crate::protocol::{
    decode_server_message, ClientCommand, PacketSerializer, ServerMessage, StateUpdate,
};

/// Client state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Waiting for the server to assign our entity.
    Connecting,
    /// Controlling an entity.
    Connected,
}

/// Game client.
pub struct GameClient<C: Clock, P: PhysicsSolver + Clone> {
    config: ClientConfig,
    clock: C,
    physics: P,
    state: ClientState,
    predictor: Option<ClientPredictor<P>>,
    remote: BTreeMap<EntityId, Vec2>,
    since_last_send: f64,
    last_server_timestamp: f64,
    serializer: PacketSerializer,
}

impl<C: Clock, P: PhysicsSolver + Clone> GameClient<C, P> {
    /// Creates a disconnected client.
    #[must_use]
    pub fn new(config: ClientConfig, clock: C, physics: P) -> Self {
        Self {
            config,
            clock,
            physics,
            state: ClientState::Disconnected,
            predictor: None,
            remote: BTreeMap::new(),
            since_last_send: 0.0,
            last_server_timestamp: f64::NEG_INFINITY,
            serializer: PacketSerializer::new(),
        }
    }

    /// Marks the connection as open and returns the greeting to send.
    ///
    /// The greeting is an empty action package; the server answers with our
    /// entity.
    pub fn connect(&mut self) -> Vec<u8> {
        self.state = ClientState::Connecting;
        vec![ClientCommand::ActionPackage as u8]
    }

    /// Drops the controlled entity and every remote one.
    pub fn disconnect(&mut self) {
        self.state = ClientState::Disconnected;
        self.predictor = None;
        self.remote.clear();
        tracing::info!("Disconnected");
    }

    /// Returns the current client state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ClientState {
        self.state
    }

    /// Our entity id, once assigned.
    #[must_use]
    pub fn entity_id(&self) -> Option<EntityId> {
        self.predictor.as_ref().map(|p| p.entity().id)
    }

    /// The predictor of our entity, once assigned.
    #[inline]
    #[must_use]
    pub const fn predictor(&self) -> Option<&ClientPredictor<P>> {
        self.predictor.as_ref()
    }

    /// Last known position of another player.
    #[must_use]
    pub fn remote_position(&self, id: EntityId) -> Option<Vec2> {
        self.remote.get(&id).copied()
    }

    /// Other players currently known.
    pub fn remote_entities(&self) -> impl Iterator<Item = (EntityId, Vec2)> + '_ {
        self.remote.iter().map(|(id, pos)| (*id, *pos))
    }

    /// Server timestamp of the newest state update.
    #[inline]
    #[must_use]
    pub const fn last_server_timestamp(&self) -> f64 {
        self.last_server_timestamp
    }

    /// Performs `kind` now. Ignored until an entity is assigned.
    pub fn input(&mut self, kind: PlayerActionType) {
        let now = self.clock.now();
        match self.predictor.as_mut() {
            Some(predictor) => {
                let action = predictor.package_action(kind, now);
                tracing::debug!("Action {} ({:?}) at {:.3}", action.id, kind, now);
            }
            None => tracing::trace!("Input {:?} before entity assignment dropped", kind),
        }
    }

    /// Advances the prediction by `dt` and returns an action package when
    /// one is due.
    ///
    /// A package is due every `send_inputs_interval`; with no input since
    /// the last one an `Idle` action is sent so the server keeps
    /// acknowledging.
    pub fn update(&mut self, dt: f64) -> Option<Vec<u8>> {
        let now = self.clock.now();
        let predictor = self.predictor.as_mut()?;

        predictor.update(dt, now);

        self.since_last_send += dt;
        if self.since_last_send < self.config.send_inputs_interval {
            return None;
        }
        self.since_last_send = 0.0;

        if !predictor.has_outgoing() {
            predictor.package_action(PlayerActionType::Idle, now);
        }
        let actions = predictor.take_action_package();

        self.serializer.reset();
        match self.serializer.serialize_action_package(&actions) {
            Ok(()) => Some(self.serializer.to_vec()),
            Err(e) => {
                tracing::error!("Failed to encode action package: {}", e);
                None
            }
        }
    }

    /// Handles a received message.
    pub fn handle_packet(&mut self, data: &[u8]) {
        match decode_server_message(data) {
            Ok(message) => self.handle_message(message),
            Err(e) => tracing::error!("Malformed server message ({} bytes): {}", data.len(), e),
        }
    }

    /// Handles a decoded message.
    pub fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::NewPlayer(player) => {
                if player.owner {
                    let entity = EntityState::new(player.id, player.position);
                    self.predictor = Some(ClientPredictor::new(
                        self.physics.clone(),
                        entity,
                        self.config.blend_window,
                        self.config.position_distance_to_snap,
                    ));
                    self.remote.remove(&player.id);
                    self.state = ClientState::Connected;
                    tracing::info!("Controlling entity {} at {:?}", player.id, player.position);
                } else {
                    self.remote.insert(player.id, player.position);
                    tracing::info!("Player {} joined", player.id);
                }
            }
            ServerMessage::StateUpdate(update) => self.handle_state_update(update),
            ServerMessage::AcknowledgeCommand { command_id } => {
                if let (Some(predictor), Ok(id)) = (self.predictor.as_mut(), u64::try_from(command_id)) {
                    predictor.set_last_acknowledged_action_id(id);
                }
            }
            ServerMessage::PlayerLeft { id } => {
                self.remote.remove(&id);
                tracing::info!("Player {} left", id);
            }
        }
    }

    fn handle_state_update(&mut self, update: StateUpdate) {
        if update.timestamp < self.last_server_timestamp {
            tracing::trace!("Stale state update {:.3} dropped", update.timestamp);
            return;
        }
        self.last_server_timestamp = update.timestamp;

        let now = self.clock.now();
        let own = self.entity_id();

        if let Some(predictor) = self.predictor.as_mut() {
            predictor.set_last_acknowledged_action_id(update.last_acknowledged_action_id);
        }

        for entity in update.entities {
            if Some(entity.id) == own {
                if let Some(predictor) = self.predictor.as_mut() {
                    let velocity = predictor.velocity();
                    predictor.authoritative_change_position(entity.position, velocity, now);
                }
            } else {
                self.remote.insert(entity.id, entity.position);
            }
        }
    }
}
