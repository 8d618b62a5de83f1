//! Dependency Graph
//!
//! This module implements the declared graph and the [`Graph`] handle that
//! clients declare nodes on and resolve them through.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph where:
//!
//! - Nodes are named values (constants) or computations (callables)
//! - Edges are implied by each computation's ordered dependency names
//!
//! Dependency names are not checked when a node is declared. A name that
//! never gets a node only fails when something resolves through it.
//!
//! # Design Decisions
//!
//! 1. The graph is an explicitly owned value, not an ambient registry.
//!    Cloning a `Graph` clones a handle; all clones share nodes and cache.
//!
//! 2. Declaration takes `&self`. Nodes are expected to be declared before
//!    resolution starts. Redeclaring later evicts the replaced node and
//!    everything that depends on it from the cache. An evaluation already
//!    running at that point still answers the callers awaiting it, possibly
//!    with a value built from the old definition, but its result is never
//!    cached. The next resolve computes against the latest declarations.
//!
//! 3. Callers name dependencies explicitly. The engine never inspects a
//!    callable to discover what it needs.

mod node;
mod store;

pub use node::{Callable, Computation, DependencyNames, Generation, Node, NodeKind};
pub use store::NodeStore;

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::config::{CacheScope, GraphConfig};
use crate::engine::{run_entry_point, Output, ResolutionCache, Resolver, SlotState, Task};
use crate::error::{BoxError, GraphError};
use crate::value::{Args, Value};

/// A graph of named values and computations.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    store: Arc<NodeStore>,
    cache: Arc<ResolutionCache>,
    config: GraphConfig,
}

impl Graph {
    /// Create an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Declare a constant node.
    pub fn declare_value(&self, name: impl Into<String>, payload: impl Into<Value>) {
        self.declare(name.into(), Node::Value(payload.into()));
    }

    /// Declare a computation node.
    ///
    /// `callable` receives the resolved values of `dependencies`, in order.
    pub fn declare_computation<I, S, F>(&self, name: impl Into<String>, dependencies: I, callable: F)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Args) -> Result<Output, BoxError> + Send + Sync + 'static,
    {
        let computation = computation(dependencies, callable);
        self.declare(name.into(), Node::Computation(computation));
    }

    fn declare(&self, name: String, node: Node) {
        let kind = node.kind();
        let (generation, replaced) = self.store.declare(name.clone(), node);

        let stale = self.store.dependents_closure(&name);
        let evicted = self.cache.invalidate(&stale);

        debug!(
            node = %name,
            ?kind,
            generation = generation.raw(),
            replaced,
            evicted,
            "declared node"
        );
    }

    /// Get a handle to the eventual value of `name`.
    ///
    /// Concurrent and repeated calls for the same node share one evaluation.
    pub fn resolve(&self, name: &str) -> Task {
        self.resolver(Arc::clone(&self.cache)).resolve(name)
    }

    /// Resolve `dependencies`, then invoke `callable` with their values.
    ///
    /// The callable is never cached and runs on every call. Its output is
    /// returned as produced: a pending output is not awaited.
    pub fn run_entry_point<I, S, F>(
        &self,
        dependencies: I,
        callable: F,
    ) -> impl Future<Output = Result<Output, GraphError>> + Send + 'static
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Args) -> Result<Output, BoxError> + Send + Sync + 'static,
    {
        let computation = computation(dependencies, callable);
        let cache = match self.config.cache_scope {
            CacheScope::Graph => Arc::clone(&self.cache),
            CacheScope::EntryPoint => Arc::new(ResolutionCache::new()),
        };
        let resolver = self.resolver(cache);

        async move { run_entry_point(&resolver, &computation).await }
    }

    fn resolver(&self, cache: Arc<ResolutionCache>) -> Resolver {
        Resolver::new(Arc::clone(&self.store), cache, self.config)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.store.contains(name)
    }

    /// Declared node names, in declaration order.
    pub fn node_names(&self) -> Vec<String> {
        self.store.names()
    }

    pub fn dependencies_of(&self, name: &str) -> Option<Vec<String>> {
        self.store.dependencies_of(name)
    }

    /// The memoization state of `name`.
    ///
    /// Values are always resolved; undeclared names are idle.
    pub fn state(&self, name: &str) -> SlotState {
        match self.store.lookup(name) {
            Ok((Node::Value(_), _)) => SlotState::Resolved,
            Ok((Node::Computation(_), _)) => self.cache.state(name),
            Err(_) => SlotState::Idle,
        }
    }

    /// Forget every memoized outcome. Declarations are kept.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

fn computation<I, S, F>(dependencies: I, callable: F) -> Computation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    F: Fn(Args) -> Result<Output, BoxError> + Send + Sync + 'static,
{
    Computation::new(
        Arc::new(callable),
        dependencies.into_iter().map(Into::into).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counting(
        counter: &Arc<AtomicI32>,
    ) -> impl Fn(Args) -> Result<Output, BoxError> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Output::ready(n))
        }
    }

    #[test]
    fn declarations_are_introspectable() {
        let graph = Graph::new();
        graph.declare_value("x", 1i32);
        graph.declare_computation("f", ["x"], |args| Ok(Output::ready(args.get::<i32>(0)? + 1)));
        graph.declare_computation("c", ["missing"], |_| Ok(Output::ready(0i32)));

        assert!(graph.contains("f"));
        assert!(!graph.contains("missing"));
        assert_eq!(graph.node_names(), vec!["x", "f", "c"]);
        assert_eq!(graph.dependencies_of("f"), Some(vec!["x".to_string()]));
        assert_eq!(graph.dependencies_of("missing"), None);
    }

    #[test]
    fn values_are_resolved_on_declaration() {
        let graph = Graph::new();
        graph.declare_value("x", 1i32);
        graph.declare_computation("f", ["x"], |_| Ok(Output::ready(0i32)));

        assert_eq!(graph.state("x"), SlotState::Resolved);
        assert_eq!(graph.state("f"), SlotState::Idle);
        assert_eq!(graph.state("nope"), SlotState::Idle);
    }

    #[tokio::test]
    async fn resolve_memoizes() {
        let graph = Graph::new();
        let counter = Arc::new(AtomicI32::new(0));
        graph.declare_computation("n", Vec::<String>::new(), counting(&counter));

        assert_eq!(graph.resolve("n").await.unwrap().get::<i32>(), Ok(1));
        assert_eq!(graph.resolve("n").await.unwrap().get::<i32>(), Ok(1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(graph.state("n"), SlotState::Resolved);

        graph.clear_cache();
        assert_eq!(graph.resolve("n").await.unwrap().get::<i32>(), Ok(2));
    }

    #[tokio::test]
    async fn redeclaring_a_dependency_evicts_dependents() {
        let graph = Graph::new();
        graph.declare_value("x", 1i32);
        graph.declare_computation("f", ["x"], |args| Ok(Output::ready(args.get::<i32>(0)? * 10)));

        assert_eq!(graph.resolve("f").await.unwrap().get::<i32>(), Ok(10));
        assert_eq!(graph.state("f"), SlotState::Resolved);

        graph.declare_value("x", 2i32);
        assert_eq!(graph.state("f"), SlotState::Idle);
        assert_eq!(graph.resolve("f").await.unwrap().get::<i32>(), Ok(20));
    }

    #[tokio::test]
    async fn entry_point_scope_uses_fresh_cache() {
        let config = GraphConfig::default().with_cache_scope(CacheScope::EntryPoint);
        let graph = Graph::with_config(config);
        let counter = Arc::new(AtomicI32::new(0));
        graph.declare_computation("n", Vec::<String>::new(), counting(&counter));

        for expected in 1..=2 {
            let output = graph
                .run_entry_point(["n", "n"], |args| {
                    Ok(Output::ready(args.get::<i32>(0)? + args.get::<i32>(1)?))
                })
                .await
                .unwrap();
            let value = output.settle().await.unwrap();
            assert_eq!(value.get::<i32>(), Ok(expected * 2));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(graph.state("n"), SlotState::Idle);
    }
}
