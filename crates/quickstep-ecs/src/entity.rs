//! Dense entity identifiers and the fixed-capacity entity table.
//!
//! An [`EntityId`] is nothing more than a row index into the component
//! columns. Ids are dense (`0..len`) and are *not* stable across ticks: when an
//! entity is deleted, the last live row is swapped into the hole so the
//! columns stay gap-free. Deletion is deferred; [`EntityTable::queue_delete`]
//! only records the request and [`EntityTable::compact`] applies every queued
//! request at a single well-defined point of the tick.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::component::ComponentMask;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A dense row index identifying a live entity for the duration of a tick.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Construct an `EntityId` from a raw row index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The row index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw `u32` representation.
    #[inline]
    pub const fn to_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Compaction records
// ---------------------------------------------------------------------------

/// One physical row move performed during compaction.
///
/// Steps must be replayed against every component column in order: move
/// `moved_from` into `vacated` for the kinds in `moved_mask`, then reset
/// `moved_from`. When `moved_from` is `None` the deleted row was already the
/// tail and only needs resetting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactStep {
    /// The row being overwritten (it held a deleted entity).
    pub vacated: EntityId,
    /// The tail row moved into `vacated`, if any.
    pub moved_from: Option<EntityId>,
    /// Component kinds carried by the moved row.
    pub moved_mask: ComponentMask,
}

/// The net effect of a compaction on one surviving entity: it was known as
/// `from` before the compaction and is known as `to` afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relocation {
    /// Id before compaction.
    pub from: EntityId,
    /// Id after compaction.
    pub to: EntityId,
}

/// Result of [`EntityTable::compact`].
#[derive(Debug, Clone, Default)]
pub struct Compaction {
    /// Physical row moves, in the order they must be applied.
    pub steps: Vec<CompactStep>,
    /// Net id changes of surviving entities.
    pub relocations: Vec<Relocation>,
    /// Ids (pre-compaction) that were deleted.
    pub removed: Vec<EntityId>,
    /// Pre-compaction id -> post-compaction id (`None` if deleted).
    remap: Vec<Option<EntityId>>,
}

impl Compaction {
    /// Translate a pre-compaction id into its post-compaction id.
    ///
    /// Returns `None` if the entity was deleted or the id was not live before
    /// the compaction.
    pub fn remap(&self, id: EntityId) -> Option<EntityId> {
        self.remap.get(id.index()).copied().flatten()
    }

    /// `true` if nothing was deleted.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EntityTable
// ---------------------------------------------------------------------------

/// Fixed-capacity table of live entities and their component masks.
///
/// Slots `0..len` are live. Creation appends at `len`; deletion is queued and
/// applied by [`compact`](Self::compact) via swap-with-last.
#[derive(Debug, Clone)]
pub struct EntityTable {
    /// Component mask per slot. Length is always `capacity`.
    masks: Vec<ComponentMask>,
    /// Number of live slots.
    len: usize,
    /// Ids queued for deletion this tick, in request order.
    pending: Vec<EntityId>,
}

impl EntityTable {
    /// Create an empty table that can hold at most `capacity` entities.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or does not fit in a `u32`.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "entity capacity must be positive");
        assert!(
            capacity <= u32::MAX as usize,
            "entity capacity {capacity} exceeds u32 range"
        );
        Self {
            masks: vec![ComponentMask::EMPTY; capacity],
            len: 0,
            pending: Vec::new(),
        }
    }

    /// Append a new entity with the given component mask.
    ///
    /// # Panics
    ///
    /// Exceeding the fixed capacity is a configuration error and panics.
    pub fn create(&mut self, mask: ComponentMask) -> EntityId {
        assert!(
            self.len < self.masks.len(),
            "entity capacity {} exceeded",
            self.masks.len()
        );
        let id = EntityId::new(self.len as u32);
        self.masks[self.len] = mask;
        self.len += 1;
        tracing::debug!(entity = %id, ?mask, "entity created");
        id
    }

    /// Queue `id` for deletion at the next [`compact`](Self::compact).
    ///
    /// Deleting an id that is not live, or that is already queued, is a silent
    /// no-op. Returns `true` if the request was newly queued.
    pub fn queue_delete(&mut self, id: EntityId) -> bool {
        if !self.contains(id) {
            tracing::warn!(entity = %id, live = self.len, "delete of non-live entity ignored");
            return false;
        }
        if self.pending.contains(&id) {
            return false;
        }
        self.pending.push(id);
        true
    }

    /// `true` if `id` is queued for deletion.
    pub fn is_queued(&self, id: EntityId) -> bool {
        self.pending.contains(&id)
    }

    /// Ids queued for deletion since the last compaction.
    pub fn pending_deletes(&self) -> &[EntityId] {
        &self.pending
    }

    /// `true` if `id` names a live slot.
    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        id.index() < self.len
    }

    /// The component mask of a live entity.
    pub fn mask(&self, id: EntityId) -> Option<ComponentMask> {
        self.contains(id).then(|| self.masks[id.index()])
    }

    /// Replace the component mask of a live entity.
    ///
    /// Returns `false` (and changes nothing) if `id` is not live.
    pub fn set_mask(&mut self, id: EntityId, mask: ComponentMask) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.masks[id.index()] = mask;
        true
    }

    /// Number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if no entity is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of entities.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.masks.len()
    }

    /// Iterate live ids in row order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        (0..self.len as u32).map(EntityId::new)
    }

    /// Iterate live ids whose mask contains every kind in `required`.
    pub fn iter_with(&self, required: ComponentMask) -> impl Iterator<Item = EntityId> + '_ {
        self.iter()
            .filter(move |id| self.masks[id.index()].contains_all(required))
    }

    /// Apply every queued deletion by swap-with-last compaction.
    ///
    /// Queued ids are processed from the highest row downwards so that the
    /// tail row moved into a hole is never itself awaiting deletion. The
    /// returned [`Compaction`] lists the physical moves the caller must replay
    /// against its component columns and the net id changes of survivors.
    pub fn compact(&mut self) -> Compaction {
        if self.pending.is_empty() {
            return Compaction::default();
        }

        let mut removed = std::mem::take(&mut self.pending);
        removed.sort_unstable_by(|a, b| b.cmp(a));

        let old_len = self.len;
        // slot -> pre-compaction id currently stored in it.
        let mut owner: Vec<u32> = (0..old_len as u32).collect();
        let mut steps = Vec::with_capacity(removed.len());

        for &dead in &removed {
            let last = self.len - 1;
            let slot = dead.index();
            if slot == last {
                steps.push(CompactStep {
                    vacated: dead,
                    moved_from: None,
                    moved_mask: ComponentMask::EMPTY,
                });
            } else {
                let moved_mask = self.masks[last];
                self.masks[slot] = moved_mask;
                owner[slot] = owner[last];
                steps.push(CompactStep {
                    vacated: dead,
                    moved_from: Some(EntityId::new(last as u32)),
                    moved_mask,
                });
            }
            self.masks[last] = ComponentMask::EMPTY;
            self.len -= 1;
        }
        owner.truncate(self.len);

        let mut remap = vec![None; old_len];
        let mut relocations = Vec::new();
        for (slot, &orig) in owner.iter().enumerate() {
            let to = EntityId::new(slot as u32);
            let from = EntityId::new(orig);
            remap[orig as usize] = Some(to);
            if from != to {
                relocations.push(Relocation { from, to });
            }
        }
        removed.sort_unstable();

        tracing::debug!(
            removed = removed.len(),
            relocated = relocations.len(),
            live = self.len,
            "entity table compacted"
        );

        Compaction {
            steps,
            relocations,
            removed,
            remap,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
