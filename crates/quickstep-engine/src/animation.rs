//! Read-only animation cursors supplied by the animation collaborator.
//!
//! Animation stepping happens outside the core. Each tick the host publishes
//! one [`AnimationCursor`] per sprite-bearing entity; attack activation and
//! clip-end transitions read it.

use std::collections::HashMap;

use quickstep_ecs::entity::{Compaction, EntityId};
use serde::{Deserialize, Serialize};

/// Where an entity's current clip is.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnimationCursor {
    pub frame_index: u32,
    /// The clip does not loop and is showing its last frame.
    pub is_at_last_frame_of_non_looping_clip: bool,
    /// Seconds per frame.
    pub frame_duration: f32,
}

/// Cursor table keyed by entity id.
#[derive(Debug, Clone, Default)]
pub struct AnimationCursors {
    cursors: HashMap<EntityId, AnimationCursor>,
}

impl AnimationCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, entity: EntityId, cursor: AnimationCursor) {
        self.cursors.insert(entity, cursor);
    }

    pub fn get(&self, entity: EntityId) -> Option<&AnimationCursor> {
        self.cursors.get(&entity)
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<AnimationCursor> {
        self.cursors.remove(&entity)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Rebind cursors to post-compaction ids, dropping deleted entities.
    pub fn apply_compaction(&mut self, compaction: &Compaction) {
        if compaction.is_empty() {
            return;
        }
        let old = std::mem::take(&mut self.cursors);
        self.cursors = old
            .into_iter()
            .filter_map(|(id, cursor)| compaction.remap(id).map(|new| (new, cursor)))
            .collect();
    }
}
