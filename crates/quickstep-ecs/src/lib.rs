//! Quickstep ECS -- dense entity table, component columns and state machines.
//!
//! This crate holds the game-agnostic half of the Quickstep simulation core:
//!
//! - [`entity`]: dense [`EntityId`](entity::EntityId)s and the fixed-capacity
//!   [`EntityTable`](entity::EntityTable) with deferred deletion and
//!   swap-compaction.
//! - [`component`]: the closed [`ComponentKind`](component::ComponentKind) set
//!   and per-entity [`ComponentMask`](component::ComponentMask)s.
//! - [`column`]: pre-sized structure-of-arrays [`Column`](column::Column)s.
//! - [`fsm`]: the reusable [`StateMachine`](fsm::StateMachine) engine.
//!
//! # Quick Start
//!
//! ```
//! use quickstep_ecs::prelude::*;
//!
//! let mut table = EntityTable::with_capacity(16);
//! let mut positions: Column<f32> = Column::with_capacity(16);
//!
//! let a = table.create(ComponentKind::Physics.into());
//! let b = table.create(ComponentKind::Physics.into());
//! positions.set(a, 1.0);
//! positions.set(b, 2.0);
//!
//! table.queue_delete(a);
//! let compaction = table.compact();
//! for step in &compaction.steps {
//!     positions.apply_step(step, step.moved_mask.contains(ComponentKind::Physics));
//! }
//!
//! // `b` now lives in row 0.
//! assert_eq!(compaction.remap(b), Some(EntityId::new(0)));
//! assert_eq!(*positions.get(EntityId::new(0)), 2.0);
//! ```

#![deny(unsafe_code)]

pub mod column;
pub mod component;
pub mod entity;
pub mod fsm;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EcsError {
    /// The id does not name a live row (never created, or invalidated by a
    /// compaction).
    #[error("entity {entity} is not live ({live} live entities)")]
    StaleEntity {
        entity: entity::EntityId,
        live: usize,
    },

    /// The entity is live but its mask lacks the requested component.
    #[error("entity {entity} has no {kind} component")]
    MissingComponent {
        entity: entity::EntityId,
        kind: component::ComponentKind,
    },

    /// A state machine was asked to enter a state that was never registered.
    #[error("state '{label}' is not registered")]
    UnknownState {
        label: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::column::Column;
    pub use crate::component::{ComponentKind, ComponentMask};
    pub use crate::entity::{CompactStep, Compaction, EntityId, EntityTable, Relocation};
    pub use crate::fsm::{Action, Predicate, StateMachine};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Tag(u32);

    struct Store {
        table: EntityTable,
        pos: Column<Pos>,
        tag: Column<Tag>,
    }

    impl Store {
        fn new(capacity: usize) -> Self {
            Self {
                table: EntityTable::with_capacity(capacity),
                pos: Column::with_capacity(capacity),
                tag: Column::with_capacity(capacity),
            }
        }

        fn spawn(&mut self, x: f32, tag: Option<u32>) -> EntityId {
            let mut mask = ComponentMask::from(ComponentKind::Physics);
            if tag.is_some() {
                mask |= ComponentKind::Sprite;
            }
            let id = self.table.create(mask);
            self.pos.set(id, Pos { x, y: 0.0 });
            if let Some(t) = tag {
                self.tag.set(id, Tag(t));
            }
            id
        }

        fn compact(&mut self) -> Compaction {
            let compaction = self.table.compact();
            for step in &compaction.steps {
                self.pos
                    .apply_step(step, step.moved_mask.contains(ComponentKind::Physics));
                self.tag
                    .apply_step(step, step.moved_mask.contains(ComponentKind::Sprite));
            }
            compaction
        }
    }

    #[test]
    fn delete_two_of_five_moves_tail_row() {
        let mut store = Store::new(8);
        for i in 0..5 {
            store.spawn(i as f32, Some(i));
        }

        store.table.queue_delete(EntityId::new(2));
        let compaction = store.compact();

        assert_eq!(store.table.len(), 4);
        assert_eq!(store.pos.get(EntityId::new(2)), &Pos { x: 4.0, y: 0.0 });
        assert_eq!(store.tag.get(EntityId::new(2)), &Tag(4));
        // The vacated tail row is reset.
        assert_eq!(store.pos.get(EntityId::new(4)), &Pos::default());
        assert!(!store.table.contains(EntityId::new(4)));
        assert_eq!(compaction.remap(EntityId::new(4)), Some(EntityId::new(2)));
    }

    #[test]
    fn moved_row_without_tag_clears_stale_tag() {
        let mut store = Store::new(8);
        store.spawn(0.0, Some(99));
        store.spawn(1.0, None);

        store.table.queue_delete(EntityId::new(0));
        store.compact();

        let survivor = EntityId::new(0);
        assert_eq!(store.pos.get(survivor).x, 1.0);
        assert_eq!(store.tag.get(survivor), &Tag::default());
        assert_eq!(
            store.table.mask(survivor),
            Some(ComponentMask::from(ComponentKind::Physics))
        );
    }

    #[test]
    fn delete_everything() {
        let mut store = Store::new(4);
        let ids: Vec<_> = (0..4).map(|i| store.spawn(i as f32, None)).collect();
        for id in ids {
            store.table.queue_delete(id);
        }
        let compaction = store.compact();
        assert!(store.table.is_empty());
        assert!(compaction.relocations.is_empty());
        assert_eq!(compaction.removed.len(), 4);
    }
}
