//! Entry Points
//!
//! An entry point is an unnamed computation run directly by a caller. Its
//! dependencies resolve like any node's, but the entry point itself is never
//! stored, cached, or referenceable, and its callable runs on every call.

use tracing::debug;

use super::resolver::Resolver;
use super::task::Output;
use crate::error::GraphError;
use crate::graph::Computation;

/// Name failures raised by an entry point's own callable are attributed to.
pub const ENTRY_POINT: &str = "<entry point>";

/// Resolve `computation`'s dependencies and invoke it once.
///
/// The callable's output is handed back as-is; a pending output is not
/// awaited.
pub(crate) async fn run_entry_point(
    resolver: &Resolver,
    computation: &Computation,
) -> Result<Output, GraphError> {
    debug!(dependencies = ?computation.dependencies(), "running entry point");
    let args = resolver.resolve_all(computation.dependencies()).await?;
    computation.invoke(ENTRY_POINT, args)
}
