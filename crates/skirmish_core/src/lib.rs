//! # SKIRMISH Core
//!
//! World model shared by client and server:
//! - [`SnapshotHistory`]: time-indexed, self-pruning history
//! - [`MatchState`] / [`EntityState`]: the authoritative world
//! - [`PlayerAction`]: timestamped player input
//! - [`PhysicsSolver`]: the physics collaborator, with a reference solver
//! - [`Clock`]: injected monotonic time
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use skirmish_core::SnapshotHistory;
//!
//! let mut history = SnapshotHistory::new(Duration::from_secs(1));
//! history.add_snapshot(1, 0.0);
//! history.add_snapshot(2, 1.1);
//! assert_eq!(*history.get_closest_snapshot(0.0).unwrap().value(), 2);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod action;
pub mod clock;
pub mod entity;
pub mod error;
pub mod history;
pub mod match_state;
pub mod math;
pub mod physics;

pub use action::{ActionId, PlayerAction, PlayerActionType};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use entity::{EntityId, EntityState, HorizontalDirection};
pub use error::{CoreError, CoreResult};
pub use history::{Snapshot, SnapshotHistory};
pub use match_state::MatchState;
pub use math::Vec2;
pub use physics::{PhysicsConfig, PhysicsSolver, PlatformerPhysics};
