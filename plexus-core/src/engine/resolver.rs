//! Resolver
//!
//! Turns a node name into a [`Task`] for its value.
//!
//! # Algorithm
//!
//! 1. Look the name up in the store. Unknown names fail immediately.
//! 2. Values resolve to a completed task; they never occupy the cache.
//! 3. Computations claim their cache slot. A cached outcome is replayed,
//!    an in-progress evaluation is shared, and an idle node is started.
//! 4. Starting checks the declared edges for a cycle through the node,
//!    then builds the evaluation: resolve every dependency at once, wait
//!    for all of them, invoke the callable with the values in declared
//!    order, normalize its output, and write the outcome back.
//!
//! Resolution is lazy: nothing runs until some clone of the returned task
//! is polled, unless the graph is configured to spawn evaluations.
//!
//! # Driving Evaluations
//!
//! When first polled inside a tokio runtime, an evaluation is moved onto a
//! task of its own and its waiters only hold the join handle. Polling a node
//! therefore never polls its dependencies on the same stack, and chains of
//! any depth resolve in constant stack space. Outside a runtime the
//! evaluation is polled inline by whoever awaits it, which nests one frame
//! per level of the chain.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::runtime::Handle;
use tokio::task::JoinError;
use tracing::{debug_span, trace, warn, Instrument};

use super::cache::{Claim, ResolutionCache, Ticket};
use super::task::{normalize, panic_message, Task};
use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::graph::{Computation, Node, NodeStore};
use crate::value::{Args, Value};

/// Resolves names against one store and one cache.
#[derive(Debug, Clone)]
pub(crate) struct Resolver {
    store: Arc<NodeStore>,
    cache: Arc<ResolutionCache>,
    config: GraphConfig,
}

impl Resolver {
    pub(crate) fn new(
        store: Arc<NodeStore>,
        cache: Arc<ResolutionCache>,
        config: GraphConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Get a handle to the eventual value of `name`.
    pub(crate) fn resolve(&self, name: &str) -> Task {
        let (node, generation) = match self.store.lookup(name) {
            Ok(found) => found,
            Err(error) => {
                trace!(node = name, "unknown dependency");
                return Task::failed(error);
            }
        };

        let computation = match node {
            Node::Value(value) => return Task::ready(value),
            Node::Computation(computation) => computation,
        };

        let claim = self.cache.claim(
            name,
            generation,
            self.config.failure_policy,
            |ticket| self.start(name, ticket, computation),
        );

        match claim {
            Claim::Started(task) => {
                if self.config.spawn_tasks {
                    if let Ok(runtime) = Handle::try_current() {
                        runtime.spawn(task.clone());
                    }
                }
                task
            }
            Claim::Joined(task) => {
                trace!(node = name, "joined in-progress evaluation");
                task
            }
            Claim::Cached(task) => {
                trace!(node = name, "cache hit");
                task
            }
            Claim::Rejected(error) => Task::failed(error),
        }
    }

    /// Build the evaluation task for an idle computation.
    ///
    /// Runs with the node's cache slot locked.
    fn start(
        &self,
        name: &str,
        ticket: Ticket,
        computation: Computation,
    ) -> Result<Task, GraphError> {
        if let Some(path) = self.store.find_cycle(name) {
            warn!(node = name, path = ?path, "dependency cycle");
            return Err(GraphError::CycleDetected { path });
        }

        let resolver = self.clone();
        let name = name.to_string();
        let span = debug_span!("resolve", node = %name);

        let evaluation = {
            let resolver = resolver.clone();
            let name = name.clone();
            async move {
                let outcome = resolver.evaluate(&name, &computation).await;
                if let Err(error) = &outcome {
                    warn!(%error, "resolution failed");
                }
                resolver
                    .cache
                    .settle(&name, ticket, &outcome, resolver.config.failure_policy);
                outcome
            }
            .instrument(span)
        };

        Ok(Task::from_future(async move {
            let Ok(runtime) = Handle::try_current() else {
                return evaluation.await;
            };
            match runtime.spawn(evaluation).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    resolver.cache.abandon(&name, ticket);
                    Err(join_failure(name, error))
                }
            }
        }))
    }

    async fn evaluate(&self, name: &str, computation: &Computation) -> Result<Value, GraphError> {
        let args = self.resolve_all(computation.dependencies()).await?;
        let output = computation.invoke(name, args)?;
        normalize(name, output).await
    }

    /// Resolve several names concurrently.
    ///
    /// Every dependency is requested before any is awaited, and all of them
    /// run to completion. The first failure in declared order wins.
    pub(crate) async fn resolve_all(&self, names: &[String]) -> Result<Args, GraphError> {
        let tasks: Vec<Task> = names.iter().map(|name| self.resolve(name)).collect();
        let values = join_all(tasks)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Args::new(values))
    }
}

/// Map a failed join on a spawned evaluation to the node's error.
fn join_failure(name: String, error: JoinError) -> GraphError {
    if error.is_panic() {
        let panic = error.into_panic();
        GraphError::ComputationPanicked {
            message: panic_message(panic.as_ref()),
            name,
        }
    } else {
        warn!(node = %name, "evaluation cancelled");
        GraphError::Cancelled { name }
    }
}
