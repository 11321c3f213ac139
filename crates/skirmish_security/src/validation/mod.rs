//! # Action Validation
//!
//! Server-side bounds on what a client claims about its own actions.
//!
//! ## Philosophy
//!
//! NEVER trust the client. The client says "I jumped at time T, standing at
//! position P". We verify:
//! 1. T lies inside the window the server still has history for.
//! 2. P is close enough to where the server last saw that player.
//!
//! A claim outside its bound is replaced by the nearest acceptable value and
//! flagged with a [`Suspicion`]. Whether a flagged claim is still replayed is
//! decided by the [`SuspicionPolicy`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skirmish_core::Vec2;

/// Why a claim was not taken at face value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Suspicion {
    /// Claimed time is older than the history window.
    TooOld {
        /// Time the client claimed.
        claimed: f64,
    },
    /// Claimed time is in the server's future.
    TooNew {
        /// Time the client claimed.
        claimed: f64,
    },
    /// Claimed position is too far from the server's.
    PositionOff {
        /// Squared distance between claim and server position.
        distance_squared: f32,
    },
}

impl fmt::Display for Suspicion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooOld { claimed } => write!(f, "action time {claimed:.3}s is too old"),
            Self::TooNew { claimed } => write!(f, "action time {claimed:.3}s is in the future"),
            Self::PositionOff { distance_squared } => write!(
                f,
                "claimed position is {:.1} units off",
                distance_squared.sqrt()
            ),
        }
    }
}

/// A value after validation, with the reason it was altered (if it was).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Validated<T> {
    /// The value to use.
    pub value: T,
    /// Set when `value` differs from the claim.
    pub suspicion: Option<Suspicion>,
}

impl<T> Validated<T> {
    /// A claim accepted as is.
    #[must_use]
    pub const fn accepted(value: T) -> Self {
        Self {
            value,
            suspicion: None,
        }
    }

    /// A claim replaced by `value`.
    #[must_use]
    pub const fn clamped(value: T, suspicion: Suspicion) -> Self {
        Self {
            value,
            suspicion: Some(suspicion),
        }
    }

    /// Returns true if the claim had to be altered.
    #[inline]
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        self.suspicion.is_some()
    }
}

/// What to do with an action whose claims were altered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuspicionPolicy {
    /// Replay the action with the clamped values.
    #[default]
    Clamp,
    /// Drop the action.
    Reject,
}

impl SuspicionPolicy {
    /// Returns true if an action with these validation results is replayed.
    #[must_use]
    pub fn admits(self, time: &Validated<f64>, position: &Validated<Vec2>) -> bool {
        match self {
            Self::Clamp => true,
            Self::Reject => !time.is_suspicious() && !position.is_suspicious(),
        }
    }
}

/// Bounds a claimed action time to `[now - max_age, now]`.
#[must_use]
pub fn validate_action_time(claimed: f64, now: f64, max_age: Duration) -> Validated<f64> {
    let oldest = now - max_age.as_secs_f64();

    if claimed.is_nan() || claimed < oldest {
        Validated::clamped(oldest, Suspicion::TooOld { claimed })
    } else if claimed > now {
        Validated::clamped(now, Suspicion::TooNew { claimed })
    } else {
        Validated::accepted(claimed)
    }
}

/// Replaces a claimed position with `server_known` if they are at least
/// `tolerance` apart.
#[must_use]
pub fn validate_action_position(claimed: Vec2, server_known: Vec2, tolerance: f32) -> Validated<Vec2> {
    let distance_squared = claimed.distance_squared(server_known);

    if distance_squared.is_nan() || distance_squared >= tolerance * tolerance {
        Validated::clamped(server_known, Suspicion::PositionOff { distance_squared })
    } else {
        Validated::accepted(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MAX_AGE: Duration = Duration::from_secs(1);

    #[test]
    fn test_time_inside_window() {
        let v = validate_action_time(9.5, 10.0, MAX_AGE);
        assert_eq!(v, Validated::accepted(9.5));
    }

    #[test]
    fn test_time_too_old() {
        let v = validate_action_time(3.0, 10.0, MAX_AGE);
        assert_eq!(v.value, 9.0);
        assert_eq!(v.suspicion, Some(Suspicion::TooOld { claimed: 3.0 }));
    }

    #[test]
    fn test_time_in_future() {
        let v = validate_action_time(12.0, 10.0, MAX_AGE);
        assert_eq!(v.value, 10.0);
        assert_eq!(v.suspicion, Some(Suspicion::TooNew { claimed: 12.0 }));
    }

    #[test]
    fn test_time_window_edges_accepted() {
        assert!(!validate_action_time(9.0, 10.0, MAX_AGE).is_suspicious());
        assert!(!validate_action_time(10.0, 10.0, MAX_AGE).is_suspicious());
    }

    #[test]
    fn test_position_within_tolerance() {
        let claimed = Vec2::new(110.0, 0.0);
        let v = validate_action_position(claimed, Vec2::new(100.0, 0.0), 50.0);
        assert_eq!(v, Validated::accepted(claimed));
    }

    #[test]
    fn test_position_beyond_tolerance_uses_server() {
        let server = Vec2::new(100.0, 0.0);
        let v = validate_action_position(Vec2::new(200.0, 0.0), server, 50.0);
        assert_eq!(v.value, server);
        assert!(matches!(v.suspicion, Some(Suspicion::PositionOff { .. })));
    }

    #[test]
    fn test_position_exactly_at_tolerance_is_off() {
        let server = Vec2::new(0.0, 0.0);
        let v = validate_action_position(Vec2::new(30.0, 40.0), server, 50.0);
        assert_eq!(v.value, server);
    }

    #[test]
    fn test_policy() {
        let ok_time = Validated::accepted(1.0);
        let ok_pos = Validated::accepted(Vec2::ZERO);
        let bad_pos = Validated::clamped(Vec2::ZERO, Suspicion::PositionOff { distance_squared: 1e6 });

        assert!(SuspicionPolicy::Clamp.admits(&ok_time, &bad_pos));
        assert!(SuspicionPolicy::Reject.admits(&ok_time, &ok_pos));
        assert!(!SuspicionPolicy::Reject.admits(&ok_time, &bad_pos));
    }

    proptest! {
        #[test]
        fn prop_validated_time_in_window(claimed in -1e6f64..1e6, now in 0.0f64..1e5) {
            let v = validate_action_time(claimed, now, MAX_AGE);
            prop_assert!(v.value >= now - 1.0 && v.value <= now);
        }

        #[test]
        fn prop_validated_position_within_tolerance(
            cx in -1e4f32..1e4, cy in -1e4f32..1e4,
            sx in -1e4f32..1e4, sy in -1e4f32..1e4,
        ) {
            let server = Vec2::new(sx, sy);
            let v = validate_action_position(Vec2::new(cx, cy), server, 50.0);
            prop_assert!(v.value.distance_squared(server) < 50.0 * 50.0);
        }
    }
}
