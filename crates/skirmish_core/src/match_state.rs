//! # Match State
//!
//! The full world as the server sees it at one instant: every entity's
//! state, keyed by id. Cloning a `MatchState` produces an independent deep
//! copy, which is what each stored world snapshot holds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityState, HorizontalDirection};
use crate::error::{CoreError, CoreResult};
use crate::physics::PhysicsSolver;

/// Snapshot of all entities in a match.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    entities: BTreeMap<EntityId, EntityState>,
}

impl MatchState {
    /// Creates an empty match.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an entity.
    pub fn add_entity(&mut self, entity: EntityState) {
        self.entities.insert(entity.id, entity);
    }

    /// Removes an entity, returning its last state.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<EntityState> {
        self.entities.remove(&id)
    }

    /// Returns the entity with `id`.
    #[inline]
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&EntityState> {
        self.entities.get(&id)
    }

    /// Mutable access to the entity with `id`.
    #[inline]
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut EntityState> {
        self.entities.get_mut(&id)
    }

    /// Overwrites an existing entity with `state`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] if no entity has `state.id`.
    pub fn set_entity(&mut self, state: EntityState) -> CoreResult<()> {
        let slot = self
            .entities
            .get_mut(&state.id)
            .ok_or(CoreError::EntityNotFound(state.id))?;
        *slot = state;
        Ok(())
    }

    /// Returns true if the entity is part of the match.
    #[inline]
    #[must_use]
    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Iterates entities by ascending id.
    pub fn entities(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    /// Ids of all entities, ascending.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Number of entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the match has no entity.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Starts moving an entity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] for an unknown id.
    pub fn move_entity<P: PhysicsSolver>(
        &mut self,
        id: EntityId,
        direction: HorizontalDirection,
        physics: &P,
    ) -> CoreResult<()> {
        let entity = self.entity_mut(id).ok_or(CoreError::EntityNotFound(id))?;
        physics.move_entity(entity, direction);
        Ok(())
    }

    /// Makes an entity jump.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] for an unknown id.
    pub fn jump<P: PhysicsSolver>(&mut self, id: EntityId, physics: &P) -> CoreResult<()> {
        let entity = self.entity_mut(id).ok_or(CoreError::EntityNotFound(id))?;
        physics.jump(entity);
        Ok(())
    }

    /// Advances one entity by `dt`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] for an unknown id.
    pub fn apply_physics_update<P: PhysicsSolver>(
        &mut self,
        id: EntityId,
        dt: f64,
        physics: &P,
    ) -> CoreResult<()> {
        let entity = self.entity_mut(id).ok_or(CoreError::EntityNotFound(id))?;
        physics.apply_physics_update(entity, dt);
        Ok(())
    }

    /// Advances every entity by `dt`.
    pub fn apply_physics_update_all<P: PhysicsSolver>(&mut self, dt: f64, physics: &P) {
        for entity in self.entities.values_mut() {
            physics.apply_physics_update(entity, dt);
        }
    }
}
