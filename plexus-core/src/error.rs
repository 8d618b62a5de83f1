//! Error types for the resolution engine.
//!
//! `GraphError` is cloned into every waiter of a shared handle, so all of
//! its variants hold cheaply cloneable data.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by computation callables.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors produced while resolving a node.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// A dependency name has no matching declared node.
    #[error("unknown dependency: '{name}'")]
    UnknownDependency { name: String },

    /// Resolution of a node re-enters itself through its own dependencies.
    #[error("dependency cycle detected: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// The node's callable returned an error or its pending result rejected.
    #[error("computation '{name}' failed: {cause}")]
    ComputationFailure {
        name: String,
        #[source]
        cause: Arc<dyn StdError + Send + Sync + 'static>,
    },

    /// The node's callable panicked.
    #[error("computation '{name}' panicked: {message}")]
    ComputationPanicked { name: String, message: String },

    /// The runtime driving the node's evaluation shut down before it finished.
    #[error("evaluation of '{name}' was cancelled")]
    Cancelled { name: String },
}

impl GraphError {
    /// Build a `ComputationFailure`, passing an inner `GraphError` through
    /// untouched so the originating node stays visible to the caller.
    pub(crate) fn computation(name: &str, cause: BoxError) -> Self {
        match cause.downcast::<GraphError>() {
            Ok(inner) => *inner,
            Err(cause) => GraphError::ComputationFailure {
                name: name.to_string(),
                cause: Arc::from(cause),
            },
        }
    }

    /// Name of the node the failure originated at.
    ///
    /// For cycles this is the node the cycle was detected from.
    pub fn node(&self) -> &str {
        match self {
            GraphError::UnknownDependency { name } => name,
            GraphError::CycleDetected { path } => path.first().map(String::as_str).unwrap_or(""),
            GraphError::ComputationFailure { name, .. } => name,
            GraphError::ComputationPanicked { name, .. } => name,
            GraphError::Cancelled { name } => name,
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, GraphError::CycleDetected { .. })
    }
}

/// Errors from typed access to a [`Value`](crate::Value) or [`Args`](crate::Args).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("missing argument {index} (only {len} supplied)")]
    MissingArgument { index: usize, len: usize },
}

/// Errors from loading a [`GraphConfig`](crate::GraphConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid graph config: {0}")]
    Parse(#[from] serde_json::Error),
}
