//! Resolution Engine
//!
//! The engine resolves named nodes on demand. Resolving a computation
//! recursively resolves its dependencies, fanning out across siblings,
//! joins on all of them, then invokes the computation's callable.
//!
//! # Concepts
//!
//! ## Tasks
//!
//! Every outcome, whether produced synchronously or asynchronously, is a
//! shared [`Task`]. Callables answer with an [`Output`], which the engine
//! normalizes into a task, removing exactly one level of asynchrony.
//!
//! ## Memoization
//!
//! Each computation's outcome lives in a [`ResolutionCache`] slot. Callers
//! that ask for a node while it is being evaluated share the in-progress
//! task, so a callable runs at most once per declaration no matter how many
//! paths lead to it.
//!
//! ## Entry points
//!
//! Unnamed computations resolved straight from the caller. See
//! [`Graph::run_entry_point`](crate::Graph::run_entry_point).

mod cache;
mod entry;
mod resolver;
mod task;

pub use cache::{ResolutionCache, SlotState};
pub use entry::ENTRY_POINT;
pub use task::{Output, Task};

pub(crate) use entry::run_entry_point;
pub(crate) use resolver::Resolver;
pub(crate) use task::panic_message;
