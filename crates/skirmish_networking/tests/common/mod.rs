//! In-memory session: one server and its clients wired through the
//! transport channels, sharing a manual clock.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use skirmish_core::{Clock, EntityId, ManualClock, PlatformerPhysics};
use skirmish_networking::protocol::decode_server_message;
use skirmish_networking::{
    ClientConfig, ConnectionId, GameClient, GameServer, NetworkCommand, NetworkEvent,
    ServerConfig, ServerMessage, TransportHandle,
};

pub const FRAME: f64 = 1.0 / 60.0;

pub type TestServer = GameServer<Arc<ManualClock>, PlatformerPhysics>;
pub type TestClient = GameClient<Arc<ManualClock>, PlatformerPhysics>;

pub struct Session {
    pub clock: Arc<ManualClock>,
    pub server: TestServer,
    pub handle: TransportHandle,
    pub clients: BTreeMap<ConnectionId, TestClient>,
    /// Every message the server sent, in order.
    pub sent: Vec<(ConnectionId, ServerMessage)>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let clock = Arc::new(ManualClock::new(0.0));
        let physics = PlatformerPhysics::new(config.physics);
        let server = GameServer::new(config, Arc::clone(&clock), physics);
        let handle = server.transport_handle();
        Self {
            clock,
            server,
            handle,
            clients: BTreeMap::new(),
            sent: Vec::new(),
        }
    }

    pub fn connect(&mut self, id: u32) -> ConnectionId {
        let connection = ConnectionId(id);
        let mut client = GameClient::new(
            ClientConfig::default(),
            Arc::clone(&self.clock),
            PlatformerPhysics::default(),
        );
        let greeting = client.connect();
        self.event(NetworkEvent::Connected(connection));
        self.data(connection, greeting);
        self.clients.insert(connection, client);
        connection
    }

    pub fn disconnect(&mut self, connection: ConnectionId) {
        self.clients.remove(&connection);
        self.event(NetworkEvent::Disconnected(connection));
    }

    pub fn event(&self, event: NetworkEvent) {
        self.handle.events.send(event).unwrap();
    }

    pub fn data(&self, connection: ConnectionId, payload: Vec<u8>) {
        self.event(NetworkEvent::Data {
            connection,
            payload,
        });
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn client(&mut self, connection: ConnectionId) -> &mut TestClient {
        self.clients.get_mut(&connection).unwrap()
    }

    pub fn entity_of(&self, connection: ConnectionId) -> EntityId {
        self.server.entity_of(connection).unwrap()
    }

    /// Advances the clock by one frame, lets every client send, ticks the
    /// server and delivers what it sent.
    pub fn step(&mut self) {
        self.clock.advance(FRAME);

        let mut outgoing = Vec::new();
        for (connection, client) in &mut self.clients {
            if let Some(bytes) = client.update(FRAME) {
                outgoing.push((*connection, bytes));
            }
        }
        for (connection, bytes) in outgoing {
            self.data(connection, bytes);
        }

        self.server.tick(FRAME);
        self.deliver();
    }

    pub fn run(&mut self, frames: usize) {
        for _ in 0..frames {
            self.step();
        }
    }

    pub fn deliver(&mut self) {
        let commands: Vec<NetworkCommand> = self.handle.commands.try_iter().collect();
        for command in commands {
            if let NetworkCommand::Send {
                connection,
                payload,
                ..
            } = command
            {
                self.sent
                    .push((connection, decode_server_message(&payload).unwrap()));
                if let Some(client) = self.clients.get_mut(&connection) {
                    client.handle_packet(&payload);
                }
            }
        }
    }

    /// Messages sent to `connection`, draining the log.
    pub fn take_sent_to(&mut self, connection: ConnectionId) -> Vec<ServerMessage> {
        let (mine, rest): (Vec<_>, Vec<_>) =
            self.sent.drain(..).partition(|(c, _)| *c == connection);
        self.sent = rest;
        mine.into_iter().map(|(_, m)| m).collect()
    }
}
