//! # Lag-Compensated Reconciliation
//!
//! A client acts at time `t` on its own clock; the action reaches the
//! server some time later. The reconciler rewinds to the stored world
//! snapshot closest to `t`, replays the player's actions from there, and
//! rewrites every later snapshot so that future replays start from
//! corrected history. The result, advanced to now, becomes the live state.
//!
//! ```text
//! world history:   S0 ─────── S1 ─────── S2 ─────── S3        now
//!                   │  a1         a2                           │
//!                   └──●──────────●────────────────────────────┘
//!                     replay     replay   rewrite S1..S3, commit
//! ```
//!
//! One world history is shared by all players. Each player has an action
//! history with the same age bound.

use std::collections::HashMap;
use std::time::Duration;

use skirmish_core::{
    ActionId, EntityId, MatchState, PhysicsSolver, PlayerAction, SnapshotHistory, Vec2,
};
use skirmish_security::{
    validate_action_position, validate_action_time, Suspicion, SuspicionPolicy, SuspicionTracker,
};

/// Why an action was not replayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The player has no action history (not connected).
    UnknownPlayer,
    /// No world snapshot has been stored yet.
    EmptyHistory,
    /// The player is absent from the snapshot closest to the action.
    NotInSnapshot,
}

/// What handling one action did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReplayOutcome {
    /// The action was recorded and history was replayed.
    Replayed {
        /// Recorded actions replayed, including this one.
        actions_replayed: usize,
        /// World snapshots rewritten.
        snapshots_rewritten: usize,
    },
    /// The action id was already acknowledged; nothing changed.
    Duplicate,
    /// The action was suspicious and the policy rejects such actions.
    Rejected(Suspicion),
    /// The action was recorded but could not be replayed.
    Skipped(SkipReason),
}

/// Validation bounds and policy used by the reconciler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconcilerConfig {
    /// Age bound of every history.
    pub max_age: Duration,
    /// Distance from which a claimed position is replaced.
    pub max_tolerated_off_distance: f32,
    /// What to do with suspicious actions.
    pub policy: SuspicionPolicy,
    /// Consecutive suspicious claims before a player is flagged.
    pub flag_threshold: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs_f64(crate::HISTORY_MAX_AGE_SECS),
            max_tolerated_off_distance: crate::MAX_TOLERATED_OFF_DISTANCE,
            policy: SuspicionPolicy::Clamp,
            flag_threshold: SuspicionTracker::DEFAULT_FLAG_THRESHOLD,
        }
    }
}

/// Per-player action log.
#[derive(Debug)]
struct PlayerLog {
    actions: SnapshotHistory<PlayerAction>,
    last_acknowledged: ActionId,
}

/// Owns the world history and every player's action history.
#[derive(Debug)]
pub struct Reconciler {
    config: ReconcilerConfig,
    world: SnapshotHistory<MatchState>,
    players: HashMap<EntityId, PlayerLog>,
    suspicion: SuspicionTracker,
}

impl Reconciler {
    /// Creates a reconciler with empty histories.
    #[must_use]
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            world: SnapshotHistory::new(config.max_age),
            players: HashMap::new(),
            suspicion: SuspicionTracker::new(config.flag_threshold),
            config,
        }
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Stores a copy of the world taken at `time`.
    pub fn store_snapshot(&mut self, state: MatchState, time: f64) {
        self.world.add_snapshot(state, time);
    }

    /// The shared world history.
    #[must_use]
    pub const fn world_history(&self) -> &SnapshotHistory<MatchState> {
        &self.world
    }

    /// A player's action history.
    #[must_use]
    pub fn action_history(&self, player: EntityId) -> Option<&SnapshotHistory<PlayerAction>> {
        self.players.get(&player).map(|log| &log.actions)
    }

    /// Starts tracking a player.
    pub fn add_player(&mut self, player: EntityId) {
        self.players.entry(player).or_insert_with(|| PlayerLog {
            actions: SnapshotHistory::new(self.config.max_age),
            last_acknowledged: 0,
        });
    }

    /// Forgets a player and their history.
    pub fn remove_player(&mut self, player: EntityId) {
        self.players.remove(&player);
        self.suspicion.remove_player(player);
    }

    /// Returns true if the player is tracked.
    #[must_use]
    pub fn has_player(&self, player: EntityId) -> bool {
        self.players.contains_key(&player)
    }

    /// Highest action id handled for a player (0 if none).
    #[must_use]
    pub fn last_acknowledged(&self, player: EntityId) -> ActionId {
        self.players.get(&player).map_or(0, |log| log.last_acknowledged)
    }

    /// Suspicion counters.
    #[must_use]
    pub const fn suspicion(&self) -> &SuspicionTracker {
        &self.suspicion
    }

    /// Validates, records and replays one action of `player`.
    ///
    /// The claimed position is checked against where the world history had
    /// the player at the action's time, or against `live` when history has
    /// nothing for the player yet. `live` is the present-day match; on success the player's entity in
    /// it is replaced by the replayed result advanced to `now`.
    pub fn handle_action<P: PhysicsSolver>(
        &mut self,
        player: EntityId,
        action: PlayerAction,
        live: &mut MatchState,
        now: f64,
        physics: &P,
    ) -> ReplayOutcome {
        let Some(log) = self.players.get_mut(&player) else {
            tracing::warn!("Action {} from untracked player {}", action.id, player);
            return ReplayOutcome::Skipped(SkipReason::UnknownPlayer);
        };

        if action.id <= log.last_acknowledged {
            tracing::trace!(
                "Action {} of player {} already acknowledged (last {})",
                action.id,
                player,
                log.last_acknowledged
            );
            return ReplayOutcome::Duplicate;
        }
        log.last_acknowledged = action.id;

        let Some(live_position) = live.entity(player).map(|e| e.position) else {
            return ReplayOutcome::Skipped(SkipReason::UnknownPlayer);
        };

        let time = validate_action_time(action.time, now, self.config.max_age);
        let reference =
            position_at(&self.world, player, time.value, physics).unwrap_or(live_position);
        let position = validate_action_position(
            action.position,
            reference,
            self.config.max_tolerated_off_distance,
        );

        for suspicion in [time.suspicion, position.suspicion].iter().flatten() {
            tracing::warn!(
                "Suspicious action {} from player {}: {} (server time {:.3})",
                action.id,
                player,
                suspicion,
                now
            );
        }
        let suspicion = time.suspicion.or(position.suspicion);
        self.suspicion.record(player, suspicion.as_ref());

        if !self.config.policy.admits(&time, &position) {
            if let Some(suspicion) = suspicion {
                return ReplayOutcome::Rejected(suspicion);
            }
        }

        let validated = PlayerAction {
            time: time.value,
            position: position.value,
            ..action
        };
        tracing::debug!(
            "Handling action {} ({:?}) of player {} at {:.3}",
            validated.id,
            validated.kind,
            player,
            validated.time
        );
        log.actions.add_snapshot(validated, validated.time);

        self.replay(player, validated.time, live, now, physics)
    }

    /// Replays every recorded action of `player` from the snapshot closest
    /// to `time` and commits the result into `live`.
    fn replay<P: PhysicsSolver>(
        &mut self,
        player: EntityId,
        time: f64,
        live: &mut MatchState,
        now: f64,
        physics: &P,
    ) -> ReplayOutcome {
        let Some(log) = self.players.get(&player) else {
            return ReplayOutcome::Skipped(SkipReason::UnknownPlayer);
        };
        let Some(start) = self.world.closest_index(time) else {
            tracing::trace!("No world history yet, action of player {} not replayed", player);
            return ReplayOutcome::Skipped(SkipReason::EmptyHistory);
        };
        let Some(origin) = self.world.get(start) else {
            return ReplayOutcome::Skipped(SkipReason::EmptyHistory);
        };
        let Some(mut working) = origin.value().entity(player).copied() else {
            tracing::trace!("Player {} not in snapshot at {:.3}", player, origin.timestamp());
            return ReplayOutcome::Skipped(SkipReason::NotInSnapshot);
        };
        let mut working_time = origin.timestamp();

        let from = working_time.min(time);
        let actions: Vec<PlayerAction> = log
            .actions
            .iter()
            .filter(|s| s.timestamp() >= from)
            .map(|s| *s.value())
            .collect();

        let mut cursor = start + 1;
        let mut snapshots_rewritten = 0;

        for (i, action) in actions.iter().enumerate() {
            physics.apply_physics_update(&mut working, action.time - working_time);
            working_time = working_time.max(action.time);

            working.position = action.position;
            physics.apply_action(&mut working, action.kind);
            tracing::trace!(
                "Replayed action {} at {:.3}: position ({:.2}, {:.2})",
                action.id,
                action.time,
                working.position.x,
                working.position.y
            );

            let limit = actions.get(i + 1).map_or(now, |next| next.time);
            while let Some(snapshot) = self.world.get_mut(cursor) {
                let timestamp = snapshot.timestamp();
                if timestamp > limit {
                    break;
                }
                physics.apply_physics_update(&mut working, timestamp - working_time);
                working_time = working_time.max(timestamp);

                if let Some(slot) = snapshot.value_mut().entity_mut(player) {
                    *slot = working;
                    snapshots_rewritten += 1;
                }
                cursor += 1;
            }
        }

        physics.apply_physics_update(&mut working, now - working_time);

        let Some(entity) = live.entity_mut(player) else {
            return ReplayOutcome::Skipped(SkipReason::UnknownPlayer);
        };
        entity.position = working.position;
        entity.velocity = working.velocity;
        entity.direction = working.direction;

        ReplayOutcome::Replayed {
            actions_replayed: actions.len(),
            snapshots_rewritten,
        }
    }
}

/// Where the world history had `player` at `time`: the snapshot closest
/// to `time`, advanced to it when the snapshot is older.
///
/// `None` when there is no history or the player is not in that snapshot.
fn position_at<P: PhysicsSolver>(
    world: &SnapshotHistory<MatchState>,
    player: EntityId,
    time: f64,
    physics: &P,
) -> Option<Vec2> {
    let snapshot = world.get_closest_snapshot(time)?;
    let mut entity = snapshot.value().entity(player).copied()?;
    physics.apply_physics_update(&mut entity, time - snapshot.timestamp());
    Some(entity.position)
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconcilerConfig::default())
    }
}
