//! The structure-of-arrays component store.
//!
//! [`ComponentStore`] pairs an [`EntityTable`] with one pre-sized
//! [`Column`] per data-bearing [`ComponentKind`]. Creation seeds default rows
//! for the requested kinds; deletion is deferred until [`compact`]
//! (`ComponentStore::compact`), which replays the table's swap moves across
//! every column and rewrites the entity ids stored inside attack rows.
//!
//! [`compact`]: ComponentStore::compact

use quickstep_ecs::prelude::*;

use crate::components::{Attack, Character, Collision, Physics};

/// Dense per-entity component storage with deferred deletion.
#[derive(Debug, Clone)]
pub struct ComponentStore {
    pub(crate) table: EntityTable,
    pub(crate) physics: Column<Physics>,
    pub(crate) collision: Column<Collision>,
    pub(crate) attack: Column<Attack>,
    pub(crate) character: Column<Character>,
}

impl ComponentStore {
    /// Allocate storage for `capacity` entities.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: EntityTable::with_capacity(capacity),
            physics: Column::with_capacity(capacity),
            collision: Column::with_capacity(capacity),
            attack: Column::with_capacity(capacity),
            character: Column::with_capacity(capacity),
        }
    }

    /// Append an entity carrying the kinds in `mask`, with default rows.
    ///
    /// # Panics
    ///
    /// Panics if the fixed capacity is exhausted.
    pub fn create(&mut self, mask: ComponentMask) -> EntityId {
        let id = self.table.create(mask);
        for kind in mask.iter() {
            self.seed(id, kind);
        }
        id
    }

    /// Queue `id` for deletion at the end of the tick. Idempotent.
    pub fn delete(&mut self, id: EntityId) -> bool {
        self.table.queue_delete(id)
    }

    /// Give a live entity an additional component with a default row.
    pub fn insert_component(&mut self, id: EntityId, kind: ComponentKind) -> Result<(), EcsError> {
        let mask = self.mask(id)?;
        if !mask.contains(kind) {
            self.table.set_mask(id, mask.with(kind));
            self.seed(id, kind);
        }
        Ok(())
    }

    /// Strip a component from a live entity and reset its row.
    pub fn remove_component(&mut self, id: EntityId, kind: ComponentKind) -> Result<(), EcsError> {
        let mask = self.mask(id)?;
        self.table.set_mask(id, mask.without(kind));
        self.seed(id, kind);
        Ok(())
    }

    fn seed(&mut self, id: EntityId, kind: ComponentKind) {
        match kind {
            ComponentKind::Physics => self.physics.reset(id),
            ComponentKind::Collision => self.collision.reset(id),
            ComponentKind::Attack => self.attack.set(id, Attack::following(id)),
            ComponentKind::Character => self.character.reset(id),
            ComponentKind::Sprite => {}
        }
    }

    /// Apply every queued deletion.
    ///
    /// Survivors keep their data under possibly new ids. Attack rows are
    /// fixed up: owners are remapped (an attack whose owner died becomes
    /// self-owned and is disabled). Hit registries on attacks and characters
    /// drop deleted targets.
    pub fn compact(&mut self) -> Compaction {
        let compaction = self.table.compact();
        if compaction.is_empty() {
            return compaction;
        }

        for step in &compaction.steps {
            let carried = step.moved_mask;
            self.physics
                .apply_step(step, carried.contains(ComponentKind::Physics));
            self.collision
                .apply_step(step, carried.contains(ComponentKind::Collision));
            self.attack
                .apply_step(step, carried.contains(ComponentKind::Attack));
            self.character
                .apply_step(step, carried.contains(ComponentKind::Character));
        }

        let attackers: Vec<EntityId> = self
            .table
            .iter_with(ComponentKind::Attack.into())
            .collect();
        for id in attackers {
            let attack = self.attack.get_mut(id);
            match compaction.remap(attack.source_id) {
                Some(owner) => attack.source_id = owner,
                None => {
                    tracing::debug!(entity = %id, "attack owner deleted; attack orphaned");
                    attack.source_id = id;
                    attack.is_enabled = false;
                    attack.armed_for = None;
                }
            }
            attack.hit_entities = attack
                .hit_entities
                .iter()
                .filter_map(|target| compaction.remap(*target))
                .collect();
        }

        let characters: Vec<EntityId> = self
            .table
            .iter_with(ComponentKind::Character.into())
            .collect();
        for id in characters {
            let character = self.character.get_mut(id);
            if character.hit_entities.is_empty() {
                continue;
            }
            character.hit_entities = character
                .hit_entities
                .iter()
                .filter_map(|target| compaction.remap(*target))
                .collect();
        }

        compaction
    }

    // -- queries ------------------------------------------------------------

    /// The mask of a live entity.
    pub fn mask(&self, id: EntityId) -> Result<ComponentMask, EcsError> {
        self.table.mask(id).ok_or(EcsError::StaleEntity {
            entity: id,
            live: self.table.len(),
        })
    }

    /// `true` if `id` is live and carries `kind`.
    pub fn has(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.table.mask(id).is_some_and(|mask| mask.contains(kind))
    }

    fn require(&self, id: EntityId, kind: ComponentKind) -> Result<(), EcsError> {
        if self.mask(id)?.contains(kind) {
            Ok(())
        } else {
            Err(EcsError::MissingComponent { entity: id, kind })
        }
    }

    /// `true` if `id` names a live row.
    pub fn contains(&self, id: EntityId) -> bool {
        self.table.contains(id)
    }

    /// `true` if `id` is queued for deletion this tick.
    pub fn is_queued_for_delete(&self, id: EntityId) -> bool {
        self.table.is_queued(id)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Live ids in row order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.table.iter()
    }

    /// Live ids carrying every kind in `mask`.
    pub fn iter_with(&self, mask: ComponentMask) -> impl Iterator<Item = EntityId> + '_ {
        self.table.iter_with(mask)
    }

    // -- row accessors ------------------------------------------------------

    pub fn physics(&self, id: EntityId) -> Result<&Physics, EcsError> {
        self.require(id, ComponentKind::Physics)?;
        Ok(self.physics.get(id))
    }

    pub fn physics_mut(&mut self, id: EntityId) -> Result<&mut Physics, EcsError> {
        self.require(id, ComponentKind::Physics)?;
        Ok(self.physics.get_mut(id))
    }

    pub fn collision(&self, id: EntityId) -> Result<&Collision, EcsError> {
        self.require(id, ComponentKind::Collision)?;
        Ok(self.collision.get(id))
    }

    pub fn collision_mut(&mut self, id: EntityId) -> Result<&mut Collision, EcsError> {
        self.require(id, ComponentKind::Collision)?;
        Ok(self.collision.get_mut(id))
    }

    pub fn attack(&self, id: EntityId) -> Result<&Attack, EcsError> {
        self.require(id, ComponentKind::Attack)?;
        Ok(self.attack.get(id))
    }

    pub fn attack_mut(&mut self, id: EntityId) -> Result<&mut Attack, EcsError> {
        self.require(id, ComponentKind::Attack)?;
        Ok(self.attack.get_mut(id))
    }

    pub fn character(&self, id: EntityId) -> Result<&Character, EcsError> {
        self.require(id, ComponentKind::Character)?;
        Ok(self.character.get(id))
    }

    pub fn character_mut(&mut self, id: EntityId) -> Result<&mut Character, EcsError> {
        self.require(id, ComponentKind::Character)?;
        Ok(self.character.get_mut(id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
