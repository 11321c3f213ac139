//! # Client-Side Prediction
//!
//! Predict the local player's movement for instant response.
//!
//! ## How It Works
//!
//! 1. The player acts; the action is applied locally right away
//! 2. The action is queued for the server and kept as unacknowledged
//! 3. The server replays it and eventually sends its authoritative state
//! 4. The client snaps to that state, drops what the server has seen, and
//!    replays the rest
//!
//! ```text
//! Actions:     [1] [2] [3] [4] [5]
//!                   │
//! Server ack:  ─────[2]
//!                   │
//! Correction:  snap to server state, replay [3, 4, 5], catch up to now
//! ```
//!
//! Corrections never touch the simulation synchronously: they are recorded
//! and consumed by the next [`ClientPredictor::update`].

use std::collections::VecDeque;

use skirmish_core::{
    ActionId, EntityState, PhysicsSolver, PlayerAction, PlayerActionType, Vec2,
};

use crate::interpolation::PositionBlender;

/// Last authoritative correction received for the local entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AcknowledgeInfo {
    /// Local time the correction applies at.
    pub time: f64,
    /// Authoritative position.
    pub position: Vec2,
    /// Velocity to resume from.
    pub velocity: Vec2,
}

/// Predictor state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredictorState {
    /// Simulating forward from local input.
    Predicting,
    /// A correction is pending and will be applied on the next update.
    Correcting,
}

/// Owns and predicts the locally controlled entity.
pub struct ClientPredictor<P: PhysicsSolver> {
    physics: P,
    entity: EntityState,
    unacknowledged: VecDeque<PlayerAction>,
    outgoing: Vec<PlayerAction>,
    next_action_id: ActionId,
    last_acknowledged: ActionId,
    pending_correction: Option<AcknowledgeInfo>,
    blender: PositionBlender,
    corrections_applied: u64,
}

impl<P: PhysicsSolver> ClientPredictor<P> {
    /// Creates a predictor for `entity`.
    ///
    /// # Arguments
    /// * `blend_window` - Seconds a correction takes to blend in visually
    /// * `snap_distance` - Distance at which the drawn position snaps
    #[must_use]
    pub fn new(physics: P, entity: EntityState, blend_window: f64, snap_distance: f32) -> Self {
        Self {
            physics,
            blender: PositionBlender::new(entity.position, blend_window, snap_distance),
            entity,
            unacknowledged: VecDeque::new(),
            outgoing: Vec::new(),
            next_action_id: 1,
            last_acknowledged: 0,
            pending_correction: None,
            corrections_applied: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> PredictorState {
        if self.pending_correction.is_some() {
            PredictorState::Correcting
        } else {
            PredictorState::Predicting
        }
    }

    /// The simulated entity.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> &EntityState {
        &self.entity
    }

    /// Simulated position.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.entity.position
    }

    /// Simulated velocity.
    #[inline]
    #[must_use]
    pub const fn velocity(&self) -> Vec2 {
        self.entity.velocity
    }

    /// Position to render.
    #[inline]
    #[must_use]
    pub const fn drawn_position(&self) -> Vec2 {
        self.blender.drawn_position()
    }

    /// Highest action id the server has acknowledged.
    #[inline]
    #[must_use]
    pub const fn last_acknowledged_action_id(&self) -> ActionId {
        self.last_acknowledged
    }

    /// Actions the server has not acknowledged yet, oldest first.
    pub fn unacknowledged_actions(&self) -> impl Iterator<Item = &PlayerAction> {
        self.unacknowledged.iter()
    }

    /// Number of corrections applied so far.
    #[inline]
    #[must_use]
    pub const fn corrections_applied(&self) -> u64 {
        self.corrections_applied
    }

    /// Advances the prediction by one frame.
    ///
    /// With a pending correction the frame is spent applying it (which
    /// catches up to `now`); otherwise physics advances by `dt`. The drawn
    /// position is blended in both cases.
    pub fn update(&mut self, dt: f64, now: f64) {
        if let Some(ack) = self.pending_correction.take() {
            self.apply_correction(ack, now);
        } else {
            self.physics.apply_physics_update(&mut self.entity, dt);
        }

        self.blender.update(dt, self.entity.position);
    }

    /// Creates an action at `now`, queues it and applies it locally.
    pub fn package_action(&mut self, kind: PlayerActionType, now: f64) -> PlayerAction {
        let action = PlayerAction::new(self.next_action_id, kind, now, self.entity.position);
        self.package(action);
        action
    }

    /// Queues an action and applies it locally.
    pub fn package(&mut self, action: PlayerAction) {
        self.next_action_id = self.next_action_id.max(action.id + 1);
        self.outgoing.push(action);
        self.unacknowledged.push_back(action);
        self.physics.apply_action(&mut self.entity, action.kind);
    }

    /// Drains the actions waiting to be sent.
    pub fn take_action_package(&mut self) -> Vec<PlayerAction> {
        std::mem::take(&mut self.outgoing)
    }

    /// Returns true if actions are waiting to be sent.
    #[must_use]
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Records an authoritative correction for the next update.
    ///
    /// The simulated state is not touched here.
    pub fn authoritative_change_position(&mut self, position: Vec2, velocity: Vec2, time: f64) {
        self.pending_correction = Some(AcknowledgeInfo {
            time,
            position,
            velocity,
        });
        self.blender.begin_correction(self.entity.position);
    }

    /// Raises the acknowledged action id. Never moves it backwards.
    pub fn set_last_acknowledged_action_id(&mut self, id: ActionId) {
        self.last_acknowledged = self.last_acknowledged.max(id);
    }

    /// Rewinds to `ack` and replays every unacknowledged action up to `now`.
    pub fn apply_correction(&mut self, ack: AcknowledgeInfo, now: f64) {
        let before = self.entity.position;

        self.entity.position = ack.position;
        self.entity.velocity = ack.velocity;
        let mut running = ack.time;

        let last_acknowledged = self.last_acknowledged;
        self.unacknowledged.retain(|a| a.id > last_acknowledged);

        for action in &self.unacknowledged {
            let dt = action.time - running;
            if dt > 0.0 {
                self.physics.apply_physics_update(&mut self.entity, dt);
                running = action.time;
            }
            self.physics.apply_action(&mut self.entity, action.kind);
        }

        self.physics.apply_physics_update(&mut self.entity, now - running);
        self.corrections_applied += 1;

        tracing::trace!(
            "Correction applied: {} actions replayed, moved {:.2} units",
            self.unacknowledged.len(),
            before.distance_squared(self.entity.position).sqrt()
        );
    }
}
