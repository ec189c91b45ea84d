//! Sweep-and-prune broad phase with temporal coherence.
//!
//! Every tick the orchestrator rebuilds a flat list of [`AabbSource`]s from the
//! store: one per Collision box and one per enabled Attack hit-box. The
//! detector keeps, per axis, an array of interval endpoints sorted by value
//! and a reverse lookup from source index to sorted position. Because boxes
//! move little between ticks, re-sorting with insertion sort is near-linear,
//! and every adjacent swap it performs tells us exactly which pair changed
//! its relation on that axis:
//!
//! - a `Minimum` moving left past another source's `Maximum` may start an
//!   overlap; it is committed only if the other axis's sorted order agrees;
//! - a `Maximum` moving left past another source's `Minimum` ends the overlap
//!   (idempotent when the pair was not overlapping).
//!
//! On equal values `Minimum` sorts before `Maximum`, so boxes that share an
//! edge overlap, and a zero-size box overlaps anything touching its point.
//!
//! Source indices stay meaningful only while the `(entity, kind)` sequence is
//! unchanged. When it changes (an entity gained or lost a box, or ids were
//! relocated by compaction) the endpoints, lookups and overlap set are rebuilt
//! from scratch that tick; this is the only non-incremental path.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use quickstep_ecs::component::ComponentKind;
use quickstep_ecs::entity::EntityId;
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::store::ComponentStore;

// ---------------------------------------------------------------------------
// Sources and events
// ---------------------------------------------------------------------------

/// Which component a source box came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    Collision,
    Attack,
}

/// One world-space box fed to the broad phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AabbSource {
    pub entity: EntityId,
    pub kind: SourceKind,
    pub rect: Rect,
}

impl AabbSource {
    pub fn new(entity: EntityId, kind: SourceKind, rect: Rect) -> Self {
        Self { entity, kind, rect }
    }
}

/// A change to the overlap set, in source indices (`a < b`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapEvent {
    Begin(usize, usize),
    End(usize, usize),
}

/// A sort axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bound {
    Minimum = 0,
    Maximum = 1,
}

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    source: u32,
    value: f32,
    bound: Bound,
}

impl Endpoint {
    /// Sort order: value, then `Minimum` before `Maximum`.
    #[inline]
    fn cmp_key(&self, other: &Endpoint) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then(self.bound.cmp(&other.bound))
    }
}

/// Endpoint value of `rect` on `axis`. Adding `0.0` folds `-0.0` into `0.0`
/// so `total_cmp` treats them as equal.
#[inline]
fn endpoint_value(rect: &Rect, axis: usize, bound: Bound) -> f32 {
    let value = match bound {
        Bound::Minimum => rect.min_on(axis),
        Bound::Maximum => rect.max_on(axis),
    };
    value + 0.0
}

/// One axis: endpoints in sorted order plus the reverse lookup
/// `source -> [position of Minimum, position of Maximum]`.
#[derive(Debug, Clone, Default)]
struct AxisList {
    endpoints: Vec<Endpoint>,
    lookup: Vec<[u32; 2]>,
}

impl AxisList {
    fn rebuild(&mut self, sources: &[AabbSource], axis: usize) {
        self.endpoints.clear();
        for (index, source) in sources.iter().enumerate() {
            for bound in [Bound::Minimum, Bound::Maximum] {
                self.endpoints.push(Endpoint {
                    source: index as u32,
                    value: endpoint_value(&source.rect, axis, bound),
                    bound,
                });
            }
        }
        self.endpoints.sort_by(Endpoint::cmp_key);
        self.lookup.clear();
        self.lookup.resize(sources.len(), [0, 0]);
        for (position, endpoint) in self.endpoints.iter().enumerate() {
            self.lookup[endpoint.source as usize][endpoint.bound as usize] = position as u32;
        }
    }

    fn refresh_values(&mut self, sources: &[AabbSource], axis: usize) {
        for endpoint in &mut self.endpoints {
            let rect = &sources[endpoint.source as usize].rect;
            endpoint.value = endpoint_value(rect, axis, endpoint.bound);
        }
    }

    /// Overlap of `a` and `b` on this axis, derived from sorted positions.
    #[inline]
    fn overlaps(&self, a: u32, b: u32) -> bool {
        let [a_min, a_max] = self.lookup[a as usize];
        let [b_min, b_max] = self.lookup[b as usize];
        a_min < b_max && b_min < a_max
    }
}

#[inline]
fn ordered(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Insertion-sort `list`, translating swaps into overlap changes. `other` is
/// the perpendicular axis, consulted to confirm a candidate begin.
fn resort_axis(
    list: &mut AxisList,
    other: &AxisList,
    overlaps: &mut BTreeSet<(u32, u32)>,
    events: &mut Vec<OverlapEvent>,
) -> usize {
    let mut swaps = 0;
    for i in 1..list.endpoints.len() {
        let mut j = i;
        while j > 0 && list.endpoints[j].cmp_key(&list.endpoints[j - 1]) == Ordering::Less {
            let moving = list.endpoints[j];
            let passed = list.endpoints[j - 1];

            if moving.source != passed.source {
                let pair = ordered(moving.source, passed.source);
                match (moving.bound, passed.bound) {
                    (Bound::Minimum, Bound::Maximum) => {
                        if other.overlaps(moving.source, passed.source) && overlaps.insert(pair) {
                            tracing::trace!(a = pair.0, b = pair.1, "overlap begin");
                            events.push(OverlapEvent::Begin(pair.0 as usize, pair.1 as usize));
                        }
                    }
                    (Bound::Maximum, Bound::Minimum) => {
                        if overlaps.remove(&pair) {
                            tracing::trace!(a = pair.0, b = pair.1, "overlap end");
                            events.push(OverlapEvent::End(pair.0 as usize, pair.1 as usize));
                        }
                    }
                    _ => {}
                }
            }

            list.endpoints.swap(j, j - 1);
            list.lookup[moving.source as usize][moving.bound as usize] = (j - 1) as u32;
            list.lookup[passed.source as usize][passed.bound as usize] = j as u32;
            swaps += 1;
            j -= 1;
        }
    }
    swaps
}

// ---------------------------------------------------------------------------
// SweepAndPrune
// ---------------------------------------------------------------------------

/// Incremental two-axis sweep-and-prune over a per-tick list of boxes.
///
/// # Example
///
/// ```
/// use quickstep_engine::prelude::*;
///
/// let boxes = |ax: f32| {
///     vec![
///         AabbSource::new(EntityId::new(0), SourceKind::Collision,
///             Rect::from_center(Vec2::new(ax, 0.0), Vec2::new(1.0, 1.0))),
///         AabbSource::new(EntityId::new(1), SourceKind::Collision,
///             Rect::from_center(Vec2::new(5.0, 0.0), Vec2::new(1.0, 1.0))),
///     ]
/// };
///
/// let mut sap = SweepAndPrune::new();
/// sap.set_sources(boxes(0.0));
/// sap.update();
/// assert_eq!(sap.overlap_count(), 0);
///
/// sap.set_sources(boxes(4.0));
/// sap.update();
/// assert!(sap.contains_pair(0, 1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SweepAndPrune {
    sources: Vec<AabbSource>,
    x: AxisList,
    y: AxisList,
    overlaps: BTreeSet<(u32, u32)>,
    events: Vec<OverlapEvent>,
    needs_rebuild: bool,
    rebuilt: bool,
    swaps: usize,
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the source list from the store: every Collision box, then the
    /// entity's Attack hit-box when it is enabled and has a pattern.
    ///
    /// Boxes resolve against the entity's own Physics row. An attack on an
    /// entity without Physics resolves against its owner's.
    pub fn rebuild_sources(&mut self, store: &ComponentStore) {
        let mut sources = Vec::with_capacity(self.sources.len());
        for id in store.iter() {
            let Ok(mask) = store.mask(id) else {
                continue;
            };
            let body = store.physics.get(id);

            if mask.contains(ComponentKind::Collision) {
                let rect = store.collision.get(id).aabb.to_world(body.position, body.scale);
                sources.push(AabbSource::new(id, SourceKind::Collision, rect));
            }

            if mask.contains(ComponentKind::Attack) {
                let attack = store.attack.get(id);
                let Some(pattern) = attack.pattern.as_ref().filter(|_| attack.is_enabled) else {
                    continue;
                };
                let anchor = if mask.contains(ComponentKind::Physics) {
                    body
                } else if let Ok(owner) = store.physics(attack.source_id) {
                    owner
                } else {
                    continue;
                };
                let rect = pattern.aabb.to_world(anchor.position, anchor.scale);
                sources.push(AabbSource::new(id, SourceKind::Attack, rect));
            }
        }
        self.set_sources(sources);
    }

    /// Replace the source list. A change in the `(entity, kind)` sequence
    /// schedules a full rebuild on the next [`update`](Self::update).
    pub fn set_sources(&mut self, sources: Vec<AabbSource>) {
        let same_layout = sources.len() == self.sources.len()
            && sources
                .iter()
                .zip(&self.sources)
                .all(|(new, old)| new.entity == old.entity && new.kind == old.kind);
        if !same_layout {
            self.needs_rebuild = true;
        }
        self.sources = sources;
    }

    /// Bring the overlap set up to date with the current sources.
    pub fn update(&mut self) {
        self.events.clear();
        self.swaps = 0;
        self.rebuilt = self.needs_rebuild;
        if self.needs_rebuild {
            self.full_rebuild();
            self.needs_rebuild = false;
            return;
        }
        self.update_endpoint_values();
        self.resort(Axis::X);
        self.resort(Axis::Y);
    }

    /// Recompute every endpoint value from its source box, keeping the
    /// current array order.
    pub fn update_endpoint_values(&mut self) {
        self.x.refresh_values(&self.sources, 0);
        self.y.refresh_values(&self.sources, 1);
    }

    /// Insertion-sort one axis, recording begin/end events. Returns the
    /// number of adjacent swaps.
    pub fn resort(&mut self, axis: Axis) -> usize {
        let swaps = match axis {
            Axis::X => resort_axis(&mut self.x, &self.y, &mut self.overlaps, &mut self.events),
            Axis::Y => resort_axis(&mut self.y, &self.x, &mut self.overlaps, &mut self.events),
        };
        self.swaps += swaps;
        swaps
    }

    /// Discard all incremental state and recompute from scratch.
    fn full_rebuild(&mut self) {
        self.x.rebuild(&self.sources, Axis::X.index());
        self.y.rebuild(&self.sources, Axis::Y.index());

        let previous = std::mem::take(&mut self.overlaps);
        let mut active: Vec<u32> = Vec::new();
        for endpoint in &self.x.endpoints {
            match endpoint.bound {
                Bound::Minimum => {
                    for &other in &active {
                        if self.y.overlaps(endpoint.source, other) {
                            self.overlaps.insert(ordered(endpoint.source, other));
                        }
                    }
                    active.push(endpoint.source);
                }
                Bound::Maximum => {
                    if let Some(slot) = active.iter().position(|&s| s == endpoint.source) {
                        active.swap_remove(slot);
                    }
                }
            }
        }

        // Indices are renumbered by a rebuild, so every pair reads as new.
        for &(a, b) in &self.overlaps {
            self.events.push(OverlapEvent::Begin(a as usize, b as usize));
        }
        tracing::debug!(
            sources = self.sources.len(),
            overlaps = self.overlaps.len(),
            dropped = previous.len(),
            "broad phase rebuilt"
        );
    }

    // -- accessors ----------------------------------------------------------

    /// Current overlapping pairs as `(a, b)` source indices with `a < b`, in
    /// ascending order.
    pub fn overlaps(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.overlaps.iter().map(|&(a, b)| (a as usize, b as usize))
    }

    /// Current overlapping pairs as source boxes.
    pub fn overlapping_sources(&self) -> impl Iterator<Item = (&AabbSource, &AabbSource)> + '_ {
        self.overlaps
            .iter()
            .map(|&(a, b)| (&self.sources[a as usize], &self.sources[b as usize]))
    }

    pub fn overlap_count(&self) -> usize {
        self.overlaps.len()
    }

    /// `true` if sources `a` and `b` overlap (either order).
    pub fn contains_pair(&self, a: usize, b: usize) -> bool {
        let (Ok(a), Ok(b)) = (u32::try_from(a), u32::try_from(b)) else {
            return false;
        };
        self.overlaps.contains(&ordered(a, b))
    }

    pub fn sources(&self) -> &[AabbSource] {
        &self.sources
    }

    /// Overlap changes produced by the last [`update`](Self::update).
    pub fn last_events(&self) -> &[OverlapEvent] {
        &self.events
    }

    /// `true` if the last update took the full-rebuild path.
    pub fn rebuilt_last_update(&self) -> bool {
        self.rebuilt
    }

    /// Adjacent swaps performed by the last incremental update.
    pub fn last_swap_count(&self) -> usize {
        self.swaps
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
