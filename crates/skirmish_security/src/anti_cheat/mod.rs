//! # Suspicion Tracking
//!
//! One altered claim is usually lag. A steady stream of them is a player
//! worth looking at. The tracker counts [`Suspicion`]s per player and
//! flags players whose consecutive count reaches a threshold.

use std::collections::HashMap;

use skirmish_core::EntityId;

use crate::validation::Suspicion;

/// Per-player counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SuspicionRecord {
    /// Suspicious claims since the player joined.
    pub total: u32,
    /// Suspicious claims since the last clean one.
    pub consecutive: u32,
    /// Altered timestamps.
    pub timing: u32,
    /// Altered positions.
    pub position: u32,
}

/// Counts suspicious claims per player.
#[derive(Debug)]
pub struct SuspicionTracker {
    records: HashMap<EntityId, SuspicionRecord>,
    flag_threshold: u32,
}

impl SuspicionTracker {
    /// Consecutive suspicious claims before a player is flagged.
    pub const DEFAULT_FLAG_THRESHOLD: u32 = 10;

    /// Creates a tracker flagging at `flag_threshold` consecutive claims.
    #[must_use]
    pub fn new(flag_threshold: u32) -> Self {
        Self {
            records: HashMap::new(),
            flag_threshold: flag_threshold.max(1),
        }
    }

    /// Records the outcome of validating one claim.
    ///
    /// Returns true when this record makes the player cross the flag
    /// threshold.
    pub fn record(&mut self, player: EntityId, suspicion: Option<&Suspicion>) -> bool {
        let record = self.records.entry(player).or_default();

        let Some(suspicion) = suspicion else {
            record.consecutive = 0;
            return false;
        };

        record.total += 1;
        record.consecutive += 1;
        match suspicion {
            Suspicion::TooOld { .. } | Suspicion::TooNew { .. } => record.timing += 1,
            Suspicion::PositionOff { .. } => record.position += 1,
        }

        let crossed = record.consecutive == self.flag_threshold;
        if crossed {
            tracing::warn!(
                "Player {} flagged: {} consecutive suspicious claims ({} total)",
                player,
                record.consecutive,
                record.total
            );
        }
        crossed
    }

    /// Total suspicious claims of a player.
    #[must_use]
    pub fn count(&self, player: EntityId) -> u32 {
        self.records.get(&player).map_or(0, |r| r.total)
    }

    /// Full counters of a player.
    #[must_use]
    pub fn record_of(&self, player: EntityId) -> Option<&SuspicionRecord> {
        self.records.get(&player)
    }

    /// Returns true if the player is currently at or past the threshold.
    #[must_use]
    pub fn is_flagged(&self, player: EntityId) -> bool {
        self.records
            .get(&player)
            .is_some_and(|r| r.consecutive >= self.flag_threshold)
    }

    /// Forgets a player.
    pub fn remove_player(&mut self, player: EntityId) {
        self.records.remove(&player);
    }
}

impl Default for SuspicionTracker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FLAG_THRESHOLD)
    }
}
