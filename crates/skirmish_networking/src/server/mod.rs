//! # Game Server
//!
//! The authoritative server: owns the live match, the reconciler and the
//! connection table, and advances all of them once per tick.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        GAME SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Transport    │  │ Tick         │  │ Broadcast    │       │
//! │  │ (channels)   │──│ (fixed Δt)   │──│ (50ms)       │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │                           │                                 │
//! │              ┌────────────▼────────────┐                    │
//! │              │ Reconciler              │                    │
//! │              │ - world history         │                    │
//! │              │ - action history/player │                    │
//! │              └─────────────────────────┘                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tick order
//!
//! 1. Store a world snapshot (every `store_history_interval`)
//! 2. Drain transport events (connect, disconnect, data)
//! 3. Replay every pending action package
//! 4. Acknowledge each handled package
//! 5. Advance live physics by Δt
//! 6. Broadcast a `StateUpdate` (every `state_update_interval`)
//!
//! The tick never blocks: events are drained with `try_recv` and commands
//! are queued with `try_send`.

mod connection;
mod reconciler;
mod tick;

pub use connection::{ClientConnection, ConnectionId};
pub use reconciler::{ReconcilerConfig, Reconciler, ReplayOutcome, SkipReason};
pub use tick::{TickLoop, TickStats};

use std::collections::BTreeMap;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skirmish_core::{Clock, EntityId, EntityState, MatchState, PhysicsSolver, Vec2};

use crate::config::ServerConfig;
use crate::protocol::{
    decode_client_message, encode_server_message, ClientMessage, DeliveryMethod, EntityPosition,
    NewPlayer, ServerMessage, StateUpdate,
};

/// Event delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A client connected.
    Connected(ConnectionId),
    /// A client disconnected.
    Disconnected(ConnectionId),
    /// A client sent a message.
    Data {
        /// Sender.
        connection: ConnectionId,
        /// Raw message.
        payload: Vec<u8>,
    },
}

/// Command for the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkCommand {
    /// Send a message to one client.
    Send {
        /// Recipient.
        connection: ConnectionId,
        /// Delivery guarantee.
        delivery: DeliveryMethod,
        /// Raw message.
        payload: Vec<u8>,
    },
    /// Stop the transport.
    Shutdown,
}

/// The transport's side of the server channels.
#[derive(Clone, Debug)]
pub struct TransportHandle {
    /// Events into the server.
    pub events: Sender<NetworkEvent>,
    /// Commands out of the server.
    pub commands: Receiver<NetworkCommand>,
}

/// The authoritative game server.
pub struct GameServer<C: Clock, P: PhysicsSolver> {
    config: ServerConfig,
    clock: C,
    physics: P,
    live: MatchState,
    reconciler: Reconciler,
    connections: BTreeMap<ConnectionId, ClientConnection>,
    next_entity_id: u32,
    rng: ChaCha8Rng,
    time_since_history: f64,
    time_since_update: f64,
    tick: u64,
    running: bool,
    event_rx: Receiver<NetworkEvent>,
    command_tx: Sender<NetworkCommand>,
    transport: TransportHandle,
}

impl<C: Clock, P: PhysicsSolver> GameServer<C, P> {
    /// Creates a server. Connect a transport through
    /// [`transport_handle`](Self::transport_handle).
    #[must_use]
    pub fn new(config: ServerConfig, clock: C, physics: P) -> Self {
        let (event_tx, event_rx) = bounded(config.channel_capacity);
        let (command_tx, command_rx) = bounded(config.channel_capacity);

        let reconciler = Reconciler::new(ReconcilerConfig {
            max_age: config.history_max_age(),
            max_tolerated_off_distance: config.max_tolerated_off_distance,
            policy: config.suspicion_policy,
            flag_threshold: config.suspicion_flag_threshold,
        });

        Self {
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            // Due on the first tick so history exists before any action.
            time_since_history: config.store_history_interval,
            time_since_update: 0.0,
            config,
            clock,
            physics,
            live: MatchState::new(),
            reconciler,
            connections: BTreeMap::new(),
            next_entity_id: 1,
            tick: 0,
            running: true,
            event_rx,
            command_tx,
            transport: TransportHandle {
                events: event_tx,
                commands: command_rx,
            },
        }
    }

    /// Channels for the transport.
    #[must_use]
    pub fn transport_handle(&self) -> TransportHandle {
        self.transport.clone()
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Live match state.
    #[inline]
    #[must_use]
    pub const fn match_state(&self) -> &MatchState {
        &self.live
    }

    /// The reconciler and its histories.
    #[inline]
    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Ticks run so far.
    #[inline]
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Number of connected clients.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// A connected client.
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<&ClientConnection> {
        self.connections.get(&id)
    }

    /// Entity controlled by a connection.
    #[must_use]
    pub fn entity_of(&self, id: ConnectionId) -> Option<EntityId> {
        self.connections.get(&id).map(|c| c.entity_id)
    }

    /// Suspicious claims recorded for a player.
    #[must_use]
    pub fn suspicion_count(&self, player: EntityId) -> u32 {
        self.reconciler.suspicion().count(player)
    }

    /// Returns false once [`shutdown`](Self::shutdown) was called.
    #[inline]
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Stops the server and tells the transport to stop.
    pub fn shutdown(&mut self) {
        self.running = false;
        if self.command_tx.try_send(NetworkCommand::Shutdown).is_err() {
            tracing::warn!("Transport did not receive shutdown command");
        }
        tracing::info!("Server shut down after {} ticks", self.tick);
    }

    /// Runs one server tick of `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        self.store_game_state(dt);

        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_event(event);
        }

        self.handle_actions();

        self.live.apply_physics_update_all(dt, &self.physics);

        self.send_state_changes(dt);

        self.tick += 1;
    }

    fn store_game_state(&mut self, dt: f64) {
        if self.time_since_history >= self.config.store_history_interval {
            self.reconciler
                .store_snapshot(self.live.clone(), self.clock.now());
            self.time_since_history = 0.0;
        }
        self.time_since_history += dt;
    }

    fn handle_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Connected(id) => self.add_client(id),
            NetworkEvent::Disconnected(id) => self.remove_client(id),
            NetworkEvent::Data {
                connection,
                payload,
            } => self.on_data_received(connection, &payload),
        }
    }

    fn add_client(&mut self, id: ConnectionId) {
        if self.connections.contains_key(&id) {
            tracing::warn!("Duplicate connect from {}", id);
            return;
        }

        let now = self.clock.now();
        let entity_id = EntityId::new(self.next_entity_id);
        self.next_entity_id += 1;

        let x = self
            .rng
            .gen_range(self.config.spawn_min_x..self.config.spawn_max_x);
        let spawn = Vec2::new(x, self.config.physics.ground_level);
        let entity = EntityState::new(entity_id, spawn);

        self.live.add_entity(entity);
        self.reconciler.add_player(entity_id);

        self.send(
            id,
            &ServerMessage::NewPlayer(new_player(&entity, now, true)),
        );
        let others: Vec<(ConnectionId, EntityId)> = self
            .connections
            .values()
            .map(|c| (c.id, c.entity_id))
            .collect();
        for (other_conn, other_entity) in others {
            if let Some(existing) = self.live.entity(other_entity).copied() {
                self.send(id, &ServerMessage::NewPlayer(new_player(&existing, now, false)));
            }
            self.send(
                other_conn,
                &ServerMessage::NewPlayer(new_player(&entity, now, false)),
            );
        }

        self.connections
            .insert(id, ClientConnection::new(id, entity_id, now));

        tracing::info!(
            "Client connected: {} (entity {}, spawn x={:.1})",
            id,
            entity_id,
            x
        );
    }

    fn remove_client(&mut self, id: ConnectionId) {
        let Some(connection) = self.connections.remove(&id) else {
            tracing::warn!("Disconnect from unknown {}", id);
            return;
        };
        let entity_id = connection.entity_id;

        self.reconciler.remove_player(entity_id);
        self.live.remove_entity(entity_id);

        let remaining: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for other in remaining {
            self.send(other, &ServerMessage::PlayerLeft { id: entity_id });
        }

        tracing::info!("Client disconnected: {} (entity {})", id, entity_id);
    }

    fn on_data_received(&mut self, id: ConnectionId, payload: &[u8]) {
        let Some(connection) = self.connections.get_mut(&id) else {
            tracing::warn!("Data from unknown {} ({} bytes) dropped", id, payload.len());
            return;
        };
        connection.packets_received += 1;

        match decode_client_message(payload) {
            Ok(ClientMessage::ActionPackage { actions, rejected }) => {
                for problem in &rejected {
                    tracing::error!("Action package from {} badly formatted: {}", id, problem);
                }
                connection.dropped_entries += rejected.len() as u64;
                tracing::trace!("Action package from {}: {} actions", id, actions.len());
                connection.push_package(actions);
            }
            Err(e) => {
                connection.malformed_packets += 1;
                tracing::error!("Malformed message from {}: {}", id, e);
            }
        }
    }

    fn handle_actions(&mut self) {
        let now = self.clock.now();
        let mut acks = Vec::new();

        for connection in self.connections.values_mut() {
            for package in connection.take_packages() {
                for action in package {
                    let outcome = self.reconciler.handle_action(
                        connection.entity_id,
                        action,
                        &mut self.live,
                        now,
                        &self.physics,
                    );
                    tracing::trace!("Action {}: {:?}", action.id, outcome);
                }
                acks.push((
                    connection.id,
                    self.reconciler.last_acknowledged(connection.entity_id),
                ));
            }
        }

        for (connection, last_ack) in acks {
            match i32::try_from(last_ack) {
                Ok(command_id) => {
                    self.send(connection, &ServerMessage::AcknowledgeCommand { command_id });
                }
                Err(_) => {
                    tracing::error!("Ack id {} for {} does not fit on the wire", last_ack, connection);
                }
            }
        }
    }

    fn send_state_changes(&mut self, dt: f64) {
        if self.time_since_update >= self.config.state_update_interval {
            let timestamp = self.clock.now();
            let entities: Vec<EntityPosition> = self
                .live
                .entities()
                .map(|e| EntityPosition {
                    id: e.id,
                    position: e.position,
                })
                .collect();

            let recipients: Vec<(ConnectionId, EntityId)> = self
                .connections
                .values()
                .map(|c| (c.id, c.entity_id))
                .collect();
            for (connection, entity_id) in recipients {
                let update = StateUpdate {
                    timestamp,
                    last_acknowledged_action_id: self.reconciler.last_acknowledged(entity_id),
                    entities: entities.clone(),
                };
                self.send(connection, &ServerMessage::StateUpdate(update));
            }
            self.time_since_update = 0.0;
        }
        self.time_since_update += dt;
    }

    fn send(&self, connection: ConnectionId, message: &ServerMessage) {
        let payload = match encode_server_message(message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode {:?} for {}: {}", message.command(), connection, e);
                return;
            }
        };

        let command = NetworkCommand::Send {
            connection,
            delivery: message.delivery(),
            payload,
        };
        match self.command_tx.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Command queue full, {:?} to {} dropped", message.command(), connection);
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("Transport gone, {:?} to {} dropped", message.command(), connection);
            }
        }
    }
}

fn new_player(entity: &EntityState, time: f64, owner: bool) -> NewPlayer {
    NewPlayer {
        time,
        id: entity.id,
        position: entity.position,
        owner,
    }
}
