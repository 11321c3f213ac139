//! # Configuration
//!
//! Server and client tunables. Every field has a reference default, so a
//! TOML file only needs the values it overrides:
//!
//! ```toml
//! tick_rate = 60
//! history_max_age = 1.0
//! suspicion_policy = "reject"
//!
//! [physics]
//! gravity = 1500.0
//! ```
//!
//! Times are in seconds.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use skirmish_core::PhysicsConfig;
use skirmish_security::{SuspicionPolicy, SuspicionTracker};
use thiserror::Error;

use crate::{
    HISTORY_MAX_AGE_SECS, MAX_TOLERATED_OFF_DISTANCE, POSITION_DISTANCE_TO_SNAP,
    SEND_INPUTS_INTERVAL, SERVER_TICK_RATE, STATE_UPDATE_INTERVAL, STORE_HISTORY_INTERVAL,
};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Server configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server tick rate (updates per second).
    pub tick_rate: u32,
    /// Address the transport binds to.
    pub bind_address: SocketAddr,
    /// Capacity of the transport channels.
    pub channel_capacity: usize,
    /// Seconds between two `StateUpdate` broadcasts.
    pub state_update_interval: f64,
    /// Seconds between two stored world snapshots.
    pub store_history_interval: f64,
    /// Seconds of world and action history kept.
    pub history_max_age: f64,
    /// Distance from which a claimed position is replaced.
    pub max_tolerated_off_distance: f32,
    /// What to do with suspicious actions.
    pub suspicion_policy: SuspicionPolicy,
    /// Consecutive suspicious claims before a player is flagged.
    pub suspicion_flag_threshold: u32,
    /// Spawn x range, inclusive lower bound.
    pub spawn_min_x: f32,
    /// Spawn x range, exclusive upper bound.
    pub spawn_max_x: f32,
    /// Seed of the spawn generator.
    pub rng_seed: u64,
    /// Seconds of silence before the transport drops a peer.
    pub client_timeout: f64,
    /// Physics tunables.
    pub physics: PhysicsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: SERVER_TICK_RATE,
            bind_address: SocketAddr::from(([0, 0, 0, 0], 7777)),
            channel_capacity: 10_000,
            state_update_interval: STATE_UPDATE_INTERVAL,
            store_history_interval: STORE_HISTORY_INTERVAL,
            history_max_age: HISTORY_MAX_AGE_SECS,
            max_tolerated_off_distance: MAX_TOLERATED_OFF_DISTANCE,
            suspicion_policy: SuspicionPolicy::Clamp,
            suspicion_flag_threshold: SuspicionTracker::DEFAULT_FLAG_THRESHOLD,
            spawn_min_x: 100.0,
            spawn_max_x: 400.0,
            rng_seed: 0x5EED,
            client_timeout: 5.0,
            physics: PhysicsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML, [`ConfigError::Invalid`]
    /// for out-of-range values.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks every value is usable.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate must be positive".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel_capacity must be positive".into()));
        }
        for (name, value) in [
            ("state_update_interval", self.state_update_interval),
            ("store_history_interval", self.store_history_interval),
            ("history_max_age", self.history_max_age),
            ("client_timeout", self.client_timeout),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number of seconds, got {value}"
                )));
            }
        }
        if !(self.max_tolerated_off_distance > 0.0) {
            return Err(ConfigError::Invalid(
                "max_tolerated_off_distance must be positive".into(),
            ));
        }
        if !(self.spawn_min_x < self.spawn_max_x) {
            return Err(ConfigError::Invalid(
                "spawn_min_x must be below spawn_max_x".into(),
            ));
        }
        Ok(())
    }

    /// History window as a duration.
    #[must_use]
    pub fn history_max_age(&self) -> Duration {
        Duration::from_secs_f64(self.history_max_age)
    }
}

/// Client configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Seconds between two action packages.
    pub send_inputs_interval: f64,
    /// Distance at which the drawn position snaps.
    pub position_distance_to_snap: f32,
    /// Seconds a correction takes to blend in.
    pub blend_window: f64,
    /// Physics tunables. Must match the server's.
    pub physics: PhysicsConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            send_inputs_interval: SEND_INPUTS_INTERVAL,
            position_distance_to_snap: POSITION_DISTANCE_TO_SNAP,
            blend_window: STATE_UPDATE_INTERVAL,
            physics: PhysicsConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML, [`ConfigError::Invalid`]
    /// for a non-positive send interval.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        if !(config.send_inputs_interval.is_finite() && config.send_inputs_interval > 0.0) {
            return Err(ConfigError::Invalid(
                "send_inputs_interval must be positive".into(),
            ));
        }
        Ok(config)
    }
}
