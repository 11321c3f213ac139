//! # SKIRMISH Security
//!
//! Server-side validation of player action claims.
//!
//! ## Features
//!
//! - **Time bounds**: claimed action times are clamped into the history window
//! - **Position bounds**: claimed positions far from the server's are replaced
//! - **Policy**: clamp (default) or reject suspicious actions
//! - **Tracking**: per-player suspicion counters with a flag threshold
//!
//! ## Architecture
//!
//! ```text
//! ActionPackage ──► validate_action_time ──────┐
//!                   validate_action_position ──┤
//!                                              ▼
//!                                     SuspicionPolicy::admits ──► replay
//!                                              │
//!                                              └──► SuspicionTracker
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod anti_cheat;
pub mod validation;

pub use anti_cheat::{SuspicionRecord, SuspicionTracker};
pub use validation::{
    validate_action_position, validate_action_time, Suspicion, SuspicionPolicy, Validated,
};
