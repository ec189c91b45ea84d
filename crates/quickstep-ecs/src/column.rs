//! Fixed-capacity component columns.
//!
//! A [`Column`] is one array of a structure-of-arrays store: row `i` holds the
//! component value for the entity whose id is `i`. Columns are allocated once
//! at full capacity and never grow; rows whose entity lacks the component
//! simply hold `T::default()`.

use crate::entity::{CompactStep, EntityId};

/// A dense, pre-sized array of component values indexed by [`EntityId`].
#[derive(Debug, Clone)]
pub struct Column<T> {
    rows: Vec<T>,
}

impl<T: Default> Column<T> {
    /// Allocate `capacity` default rows.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut rows = Vec::with_capacity(capacity);
        rows.resize_with(capacity, T::default);
        Self { rows }
    }

    /// Reset a row to `T::default()`.
    #[inline]
    pub fn reset(&mut self, id: EntityId) {
        self.rows[id.index()] = T::default();
    }

    /// Move the value at `from` into `to`, leaving `from` defaulted.
    #[inline]
    pub fn relocate(&mut self, from: EntityId, to: EntityId) {
        if from == to {
            return;
        }
        let value = std::mem::take(&mut self.rows[from.index()]);
        self.rows[to.index()] = value;
    }

    /// Replay one compaction step against this column.
    ///
    /// `carries` says whether the moved row owns this component kind; when it
    /// does not, the vacated row is only reset.
    pub fn apply_step(&mut self, step: &CompactStep, carries: bool) {
        match step.moved_from {
            Some(from) if carries => self.relocate(from, step.vacated),
            Some(from) => {
                self.reset(step.vacated);
                self.reset(from);
            }
            None => self.reset(step.vacated),
        }
    }
}

impl<T> Column<T> {
    /// Number of rows (the store capacity).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.rows.len()
    }

    /// Shared access to a row.
    ///
    /// # Panics
    ///
    /// Panics if `id` is beyond the column capacity.
    #[inline]
    pub fn get(&self, id: EntityId) -> &T {
        &self.rows[id.index()]
    }

    /// Exclusive access to a row.
    ///
    /// # Panics
    ///
    /// Panics if `id` is beyond the column capacity.
    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> &mut T {
        &mut self.rows[id.index()]
    }

    /// Overwrite a row.
    #[inline]
    pub fn set(&mut self, id: EntityId, value: T) {
        self.rows[id.index()] = value;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
