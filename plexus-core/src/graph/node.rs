//! Graph Nodes
//!
//! This module defines the node types that live in the node store.

use std::fmt::{self, Debug};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::engine::{panic_message, Output};
use crate::error::{BoxError, GraphError};
use crate::value::{Args, Value};

/// A computation's callable. Receives its resolved dependencies positionally.
pub type Callable = Arc<dyn Fn(Args) -> Result<Output, BoxError> + Send + Sync>;

/// Ordered dependency names; most nodes have only a handful.
pub type DependencyNames = SmallVec<[String; 4]>;

/// Stamp given to every declaration.
///
/// Cached outcomes remember the generation they were computed for, so an
/// outcome from a definition that has since been replaced is never served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    /// Generate a new unique generation.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw generation value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The kind of node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A constant. Resolved from the moment it is declared.
    Value,

    /// A callable with declared dependencies. Resolved on demand.
    Computation,
}

/// A computation: a callable plus the names of the nodes it consumes.
#[derive(Clone)]
pub struct Computation {
    callable: Callable,
    dependencies: DependencyNames,
}

impl Computation {
    pub fn new(callable: Callable, dependencies: DependencyNames) -> Self {
        Self {
            callable,
            dependencies,
        }
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Invoke the callable on behalf of node `name`.
    ///
    /// Errors and panics raised by the callable are attributed to `name`.
    pub(crate) fn invoke(&self, name: &str, args: Args) -> Result<Output, GraphError> {
        match catch_unwind(AssertUnwindSafe(|| (self.callable)(args))) {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(cause)) => Err(GraphError::computation(name, cause)),
            Err(panic) => Err(GraphError::ComputationPanicked {
                name: name.to_string(),
                message: panic_message(panic.as_ref()),
            }),
        }
    }
}

impl Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// A node in the graph.
#[derive(Debug, Clone)]
pub enum Node {
    Value(Value),
    Computation(Computation),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Value(_) => NodeKind::Value,
            Node::Computation(_) => NodeKind::Computation,
        }
    }

    /// Names this node depends on. Empty for values.
    pub fn dependencies(&self) -> &[String] {
        match self {
            Node::Value(_) => &[],
            Node::Computation(computation) => computation.dependencies(),
        }
    }
}
