//! # SKIRMISH Networking
//!
//! Client-side prediction and server-side lag-compensated reconciliation
//! for a tick-driven 2D action game.
//!
//! ## Architecture
//!
//! - **Protocol**: one-byte command tag, little-endian body
//! - **Prediction**: the client applies input at once and resimulates
//!   unacknowledged actions on every authoritative correction
//! - **Reconciliation**: the server replays each action at the moment the
//!   client claims it happened and rewrites history forward to now
//! - **Authority**: the server is the single source of truth
//!
//! ## Message Flow
//!
//! ```text
//! CLIENT                                   SERVER
//!   |                                         |
//!   |--- ActionPackage (every 30ms) --------->| validate, replay, commit
//!   |<-- AcknowledgeCommand ------------------|
//!   |<-- StateUpdate (every 50ms) ------------|
//!   |                                         |
//!   | rewind to server position,              |
//!   | replay unacknowledged actions           |
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use skirmish_core::{MonotonicClock, PlatformerPhysics};
//! use skirmish_networking::{GameServer, ServerConfig};
//!
//! let config = ServerConfig::load("skirmish.toml")?;
//! let physics = PlatformerPhysics::new(config.physics);
//! let mut server = GameServer::new(config, MonotonicClock::new(), physics);
//! server.tick(1.0 / 60.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod client;
pub mod config;
pub mod interpolation;
pub mod prediction;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::{ClientState, GameClient};
pub use config::{ClientConfig, ConfigError, ConfigResult, ServerConfig};
pub use interpolation::PositionBlender;
pub use prediction::{AcknowledgeInfo, ClientPredictor, PredictorState};
pub use protocol::{ClientMessage, DeliveryMethod, ProtocolError, ProtocolResult, ServerMessage};
pub use server::{
    ConnectionId, GameServer, NetworkCommand, NetworkEvent, ReplayOutcome, Reconciler,
    TickLoop, TransportHandle,
};
pub use transport::{TransportBridge, UdpTransport};

/// Server tick rate (updates per second).
pub const SERVER_TICK_RATE: u32 = 60;

/// Seconds between two `StateUpdate` broadcasts.
pub const STATE_UPDATE_INTERVAL: f64 = 0.05;

/// Seconds between two stored world snapshots.
pub const STORE_HISTORY_INTERVAL: f64 = 0.05;

/// Seconds of world and action history the server keeps.
pub const HISTORY_MAX_AGE_SECS: f64 = 1.0;

/// Distance from which a claimed position is replaced by the server's.
pub const MAX_TOLERATED_OFF_DISTANCE: f32 = 50.0;

/// Seconds between two client action packages.
pub const SEND_INPUTS_INTERVAL: f64 = 0.03;

/// Distance at which the drawn position snaps instead of blending.
pub const POSITION_DISTANCE_TO_SNAP: f32 = 50.0;

/// Maximum datagram size.
///
/// 1200 bytes stays below the 1500 byte Ethernet MTU after headers.
pub const MAX_PACKET_SIZE: usize = 1200;
