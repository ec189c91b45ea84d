//! A reusable, condition-driven finite state machine.
//!
//! A [`StateMachine`] is a directed graph of labelled states. Each state has
//! optional update/enter/exit actions and an ordered list of outgoing edges
//! guarded by predicates. Actions and predicates are plain function pointers
//! that receive a caller-supplied context `C` and the [`EntityId`] the machine
//! is driving; they capture nothing, so a machine stays valid when its owning
//! entity is relocated by compaction.
//!
//! # Per-tick semantics
//!
//! [`StateMachine::update`] does, in order:
//!
//! 1. If the current state was entered since the last update, run its enter
//!    action once and clear the latch.
//! 2. Scan the current state's edges in insertion order. The first edge whose
//!    predicate holds *and* whose destination exists wins: the current
//!    state's exit action runs, the machine switches, and the latch is set.
//!    Edges to unknown destinations are skipped.
//! 3. Run the (possibly new) current state's update action.
//!
//! The new state's enter action therefore runs on the *next* update, never in
//! the same tick as the transition.
//!
//! # Example
//!
//! ```
//! use quickstep_ecs::prelude::*;
//!
//! #[derive(Default)]
//! struct Ctx { grounded: bool, jumps: u32 }
//!
//! let mut machine: StateMachine<Ctx> = StateMachine::new();
//! machine.add_state("idle", None, None, None);
//! machine.add_state("air", None, Some(|ctx: &mut Ctx, _| ctx.jumps += 1), None);
//! machine.add_edge("idle", "air", |ctx: &Ctx, _| !ctx.grounded);
//!
//! let mut ctx = Ctx::default();
//! let me = EntityId::new(0);
//! assert!(machine.update(&mut ctx, me));
//! assert_eq!(machine.current_label(), Some("air"));
//! assert_eq!(ctx.jumps, 0);
//! machine.update(&mut ctx, me);
//! assert_eq!(ctx.jumps, 1);
//! ```

use std::fmt;

use crate::entity::EntityId;
use crate::EcsError;

/// A state action: enter, update or exit.
pub type Action<C> = fn(&mut C, EntityId);

/// An edge guard.
pub type Predicate<C> = fn(&C, EntityId) -> bool;

// ---------------------------------------------------------------------------
// Edge / State
// ---------------------------------------------------------------------------

/// A conditional edge to a destination state, resolved by label at
/// transition time.
pub struct Edge<C> {
    to: String,
    predicate: Predicate<C>,
}

impl<C> Edge<C> {
    /// Destination label.
    pub fn destination(&self) -> &str {
        &self.to
    }
}

impl<C> Clone for Edge<C> {
    fn clone(&self) -> Self {
        Self {
            to: self.to.clone(),
            predicate: self.predicate,
        }
    }
}

/// A labelled state with its actions and outgoing edges.
pub struct State<C> {
    label: String,
    on_update: Option<Action<C>>,
    on_enter: Option<Action<C>>,
    on_exit: Option<Action<C>>,
    edges: Vec<Edge<C>>,
}

impl<C> State<C> {
    /// The state's label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Outgoing edges in evaluation order.
    pub fn edges(&self) -> &[Edge<C>] {
        &self.edges
    }
}

impl<C> Clone for State<C> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            on_update: self.on_update,
            on_enter: self.on_enter,
            on_exit: self.on_exit,
            edges: self.edges.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

/// A per-entity finite state machine.
///
/// At most one state is active and at most one transition is taken per
/// [`update`](Self::update).
pub struct StateMachine<C> {
    states: Vec<State<C>>,
    current: Option<usize>,
    previous: Option<usize>,
    /// Set on entering a state; cleared once the enter action has run.
    is_new_state: bool,
}

impl<C> StateMachine<C> {
    /// Create an empty machine.
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            current: None,
            previous: None,
            is_new_state: true,
        }
    }

    /// Register a state. The first state registered becomes the initial state.
    ///
    /// # Panics
    ///
    /// Panics if a state with the same label already exists.
    pub fn add_state(
        &mut self,
        label: &str,
        on_update: Option<Action<C>>,
        on_enter: Option<Action<C>>,
        on_exit: Option<Action<C>>,
    ) {
        assert!(
            self.index_of(label).is_none(),
            "duplicate state label: {label:?}"
        );
        self.states.push(State {
            label: label.to_owned(),
            on_update,
            on_enter,
            on_exit,
            edges: Vec::new(),
        });
        if self.current.is_none() {
            self.current = Some(0);
            self.is_new_state = true;
        }
    }

    /// Append an edge from `from` to `to`.
    ///
    /// Does nothing if `from` is unknown. `to` is resolved lazily, so it may
    /// name a state that is registered later.
    pub fn add_edge(&mut self, from: &str, to: &str, predicate: Predicate<C>) {
        let Some(src) = self.index_of(from) else {
            tracing::trace!(from, to, "edge from unknown state ignored");
            return;
        };
        self.states[src].edges.push(Edge {
            to: to.to_owned(),
            predicate,
        });
    }

    /// Advance the machine by one tick. Returns `true` if a transition was
    /// taken.
    pub fn update(&mut self, ctx: &mut C, entity: EntityId) -> bool {
        let Some(mut current) = self.current else {
            return false;
        };

        if self.is_new_state {
            self.is_new_state = false;
            if let Some(enter) = self.states[current].on_enter {
                enter(ctx, entity);
            }
        }

        let mut transitioned = false;
        let mut next = None;
        for edge in &self.states[current].edges {
            if !(edge.predicate)(ctx, entity) {
                continue;
            }
            match self.index_of(&edge.to) {
                Some(dest) => {
                    next = Some(dest);
                    break;
                }
                None => {
                    tracing::trace!(
                        %entity,
                        to = edge.to.as_str(),
                        "edge to unknown state skipped"
                    );
                }
            }
        }

        if let Some(dest) = next {
            if let Some(exit) = self.states[current].on_exit {
                exit(ctx, entity);
            }
            tracing::trace!(
                %entity,
                from = self.states[current].label.as_str(),
                to = self.states[dest].label.as_str(),
                "state transition"
            );
            self.previous = Some(current);
            self.current = Some(dest);
            self.is_new_state = true;
            current = dest;
            transitioned = true;
        }

        if let Some(update) = self.states[current].on_update {
            update(ctx, entity);
        }

        transitioned
    }

    /// Jump straight to `label`, bypassing edges. The exit action of the
    /// current state runs now; the enter action of `label` runs on the next
    /// update.
    pub fn force_state(&mut self, ctx: &mut C, entity: EntityId, label: &str) -> Result<(), EcsError> {
        let dest = self.index_of(label).ok_or_else(|| EcsError::UnknownState {
            label: label.to_owned(),
        })?;
        if let Some(current) = self.current {
            if let Some(exit) = self.states[current].on_exit {
                exit(ctx, entity);
            }
        }
        self.previous = self.current;
        self.current = Some(dest);
        self.is_new_state = true;
        Ok(())
    }

    /// Label of the active state.
    pub fn current_label(&self) -> Option<&str> {
        self.current.map(|i| self.states[i].label.as_str())
    }

    /// Label of the state active before the last transition.
    pub fn previous_label(&self) -> Option<&str> {
        self.previous.map(|i| self.states[i].label.as_str())
    }

    /// `true` if the active state's enter action has not run yet.
    pub fn is_new_state(&self) -> bool {
        self.is_new_state
    }

    /// `true` if a state with `label` exists.
    pub fn has_state(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }

    /// Registered states in registration order.
    pub fn states(&self) -> &[State<C>] {
        &self.states
    }

    /// Number of registered states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    fn index_of(&self, label: &str) -> Option<usize> {
        self.states.iter().position(|s| s.label == label)
    }
}

impl<C> Default for StateMachine<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for StateMachine<C> {
    fn clone(&self) -> Self {
        Self {
            states: self.states.clone(),
            current: self.current,
            previous: self.previous,
            is_new_state: self.is_new_state,
        }
    }
}

impl<C> fmt::Debug for StateMachine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("states", &self.states.iter().map(|s| &s.label).collect::<Vec<_>>())
            .field("current", &self.current_label())
            .field("is_new_state", &self.is_new_state)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
