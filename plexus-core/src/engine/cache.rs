//! Resolution Cache
//!
//! Per-node memoization state. A node with no slot is idle; otherwise it is
//! in progress, resolved, or failed:
//!
//! ```text
//!   Idle ──claim──▶ InProgress ──settle──▶ Resolved
//!                        │
//!                        └──────settle──▶ Failed   (poison policy)
//!                                         Idle     (retry policy)
//! ```
//!
//! Every transition for a name happens under that name's map shard lock, so
//! concurrent claims for one node coalesce onto a single in-progress task.
//!
//! Each started evaluation holds a ticket, and only the holder of the slot's
//! current ticket may settle it. Evicting a node (because it, or anything it
//! depends on, was redeclared) therefore discards whatever the evaluation in
//! flight at that moment produces, even if the node is reclaimed at the same
//! generation before it finishes.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::task::Task;
use crate::config::FailurePolicy;
use crate::error::GraphError;
use crate::graph::Generation;
use crate::value::Value;

/// Observable state of a node's cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    InProgress,
    Resolved,
    Failed,
}

#[derive(Debug, Clone)]
enum Slot {
    InProgress {
        task: Task,
        generation: Generation,
        ticket: Ticket,
    },
    Resolved { value: Value, generation: Generation },
    Failed { error: GraphError, generation: Generation },
}

impl Slot {
    fn generation(&self) -> Generation {
        match self {
            Slot::InProgress { generation, .. }
            | Slot::Resolved { generation, .. }
            | Slot::Failed { generation, .. } => *generation,
        }
    }

    fn state(&self) -> SlotState {
        match self {
            Slot::InProgress { .. } => SlotState::InProgress,
            Slot::Resolved { .. } => SlotState::Resolved,
            Slot::Failed { .. } => SlotState::Failed,
        }
    }
}

/// Identity of one started evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket(Generation);

impl Ticket {
    fn issue() -> Self {
        Ticket(Generation::next())
    }
}

/// How a claim on a node was answered.
#[derive(Debug)]
pub(crate) enum Claim {
    /// The caller started the node's evaluation.
    Started(Task),
    /// The node was already being evaluated; the caller shares that task.
    Joined(Task),
    /// The node's outcome was already cached.
    Cached(Task),
    /// The node could not be started.
    Rejected(GraphError),
}

/// Memoized node outcomes, keyed by node name.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    slots: DashMap<String, Slot>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, name: &str) -> SlotState {
        self.slots
            .get(name)
            .map(|slot| slot.state())
            .unwrap_or(SlotState::Idle)
    }

    /// Claim node `name` at `generation`.
    ///
    /// If the node is idle (or its slot belongs to an older generation, or
    /// it failed under the retry policy), `start` is called with a fresh
    /// ticket while the slot is locked, and its task is recorded as in
    /// progress. `start` must not touch this cache.
    pub(crate) fn claim<F>(
        &self,
        name: &str,
        generation: Generation,
        policy: FailurePolicy,
        start: F,
    ) -> Claim
    where
        F: FnOnce(Ticket) -> Result<Task, GraphError>,
    {
        let entry = self.slots.entry(name.to_string());

        if let Entry::Occupied(occupied) = &entry {
            let slot = occupied.get();
            if slot.generation() == generation {
                match slot {
                    Slot::InProgress { task, .. } => return Claim::Joined(task.clone()),
                    Slot::Resolved { value, .. } => return Claim::Cached(Task::ready(value.clone())),
                    Slot::Failed { error, .. } if policy.caches_failures() => {
                        return Claim::Cached(Task::failed(error.clone()))
                    }
                    Slot::Failed { .. } => {}
                }
            }
        }

        let ticket = Ticket::issue();
        match start(ticket) {
            Ok(task) => {
                entry.insert(Slot::InProgress {
                    task: task.clone(),
                    generation,
                    ticket,
                });
                Claim::Started(task)
            }
            Err(error) => {
                if policy.caches_failures() {
                    entry.insert(Slot::Failed {
                        error: error.clone(),
                        generation,
                    });
                } else if let Entry::Occupied(occupied) = entry {
                    occupied.remove();
                }
                Claim::Rejected(error)
            }
        }
    }

    /// Record the outcome of the evaluation holding `ticket`.
    ///
    /// Ignored if the slot has since been invalidated or reclaimed.
    pub(crate) fn settle(
        &self,
        name: &str,
        ticket: Ticket,
        outcome: &Result<Value, GraphError>,
        policy: FailurePolicy,
    ) {
        let Entry::Occupied(mut occupied) = self.slots.entry(name.to_string()) else {
            return;
        };
        let generation = match occupied.get() {
            Slot::InProgress {
                generation,
                ticket: current,
                ..
            } if *current == ticket => *generation,
            _ => return,
        };

        match outcome {
            Ok(value) => {
                occupied.insert(Slot::Resolved {
                    value: value.clone(),
                    generation,
                });
            }
            Err(error) if policy.caches_failures() => {
                occupied.insert(Slot::Failed {
                    error: error.clone(),
                    generation,
                });
            }
            Err(_) => {
                occupied.remove();
            }
        }
    }

    /// Release the slot held by `ticket` without recording an outcome.
    ///
    /// Used when an evaluation stops before it could settle, e.g. because
    /// the runtime driving it shut down.
    pub(crate) fn abandon(&self, name: &str, ticket: Ticket) {
        self.slots.remove_if(name, |_, slot| {
            matches!(slot, Slot::InProgress { ticket: current, .. } if *current == ticket)
        });
    }

    /// Forget the outcomes of the given nodes.
    pub fn invalidate<S: AsRef<str>>(&self, names: &[S]) -> usize {
        names
            .iter()
            .filter(|name| self.slots.remove(name.as_ref()).is_some())
            .count()
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
