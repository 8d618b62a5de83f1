//! Task Handles and Result Normalization
//!
//! Every node outcome travels through the engine as a [`Task`]: a shared,
//! cloneable future. Callables may answer synchronously or asynchronously,
//! so their [`Output`] is normalized into a task before anything downstream
//! sees it. That leaves the resolver with exactly one composition path.
//!
//! # Unboxing
//!
//! Normalization removes exactly one level of asynchrony. A pending output
//! that resolves to a [`Value`] holding another `Task` delivers that inner
//! task as the node's value; it is not awaited on the dependent's behalf.

use std::any::Any;
use std::fmt::{self, Debug};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture, Shared};
use futures_util::FutureExt;

use crate::error::{BoxError, GraphError};
use crate::value::Value;

type SharedOutcome = Shared<BoxFuture<'static, Result<Value, GraphError>>>;

/// A handle to the eventual value of a node.
///
/// Clones observe the same outcome; the underlying work runs once no matter
/// how many clones are awaited.
#[derive(Clone)]
pub struct Task {
    inner: SharedOutcome,
}

impl Task {
    /// A task that is already resolved.
    pub fn ready(value: Value) -> Self {
        Self::from_future(future::ready(Ok(value)))
    }

    /// A task that has already failed.
    pub fn failed(error: GraphError) -> Self {
        Self::from_future(future::ready(Err(error)))
    }

    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, GraphError>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// The outcome, if some clone has already driven the task to completion.
    pub fn peek(&self) -> Option<&Result<Value, GraphError>> {
        self.inner.peek()
    }

    /// Whether two handles share the same pending work.
    ///
    /// Only meaningful while the task is still pending.
    pub fn ptr_eq(&self, other: &Task) -> bool {
        Shared::ptr_eq(&self.inner, &other.inner)
    }
}

impl Future for Task {
    type Output = Result<Value, GraphError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.peek() {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("Task").field("state", &state).finish()
    }
}

/// What a computation callable hands back.
pub enum Output {
    /// A plain, already available value.
    Ready(Value),

    /// An asynchronous result.
    Pending(BoxFuture<'static, Result<Value, BoxError>>),
}

impl Output {
    pub fn ready(value: impl Into<Value>) -> Self {
        Output::Ready(value.into())
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Output::Pending(future.boxed())
    }

    /// Return an engine handle, e.g. one obtained from `Graph::resolve`.
    pub fn from_task(task: Task) -> Self {
        Output::pending(task.map(|outcome| outcome.map_err(BoxError::from)))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Output::Ready(_))
    }

    /// Await the output, removing the one level of asynchrony it may carry.
    pub async fn settle(self) -> Result<Value, BoxError> {
        match self {
            Output::Ready(value) => Ok(value),
            Output::Pending(pending) => pending.await,
        }
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Output::Ready(value)
    }
}

impl Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Output::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Turn a callable's output into a task-shaped future for node `name`.
///
/// Ready values are promoted to an immediately completing future. Pending
/// results have their errors and panics attributed to `name`.
pub(crate) fn normalize(
    name: &str,
    output: Output,
) -> BoxFuture<'static, Result<Value, GraphError>> {
    match output {
        Output::Ready(value) => future::ready(Ok(value)).boxed(),
        Output::Pending(pending) => {
            let name = name.to_string();
            AssertUnwindSafe(pending)
                .catch_unwind()
                .map(move |outcome| match outcome {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(cause)) => Err(GraphError::computation(&name, cause)),
                    Err(panic) => Err(GraphError::ComputationPanicked {
                        message: panic_message(panic.as_ref()),
                        name,
                    }),
                })
                .boxed()
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn ready_task_resolves() {
        let task = Task::ready(Value::from(7i32));
        assert!(task.peek().is_none());

        let value = task.clone().await.unwrap();
        assert_eq!(value.get::<i32>(), Ok(7));
        assert!(matches!(task.peek(), Some(Ok(_))));
    }

    #[tokio::test]
    async fn shared_work_runs_once() {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let task = Task::from_future(async move {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from(1i32))
        });
        let other = task.clone();
        assert!(task.ptr_eq(&other));

        let (a, b) = futures_util::join!(task, other);
        assert_eq!(a.unwrap().get::<i32>(), Ok(1));
        assert_eq!(b.unwrap().get::<i32>(), Ok(1));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn normalize_promotes_ready_values() {
        let value = normalize("n", Output::ready(3u8)).await.unwrap();
        assert_eq!(value.get::<u8>(), Ok(3));
    }

    #[tokio::test]
    async fn normalize_attributes_rejections() {
        let output = Output::pending(async { Err::<Value, BoxError>("nope".into()) });
        let err = normalize("fetch", output).await.unwrap_err();

        assert!(matches!(err, GraphError::ComputationFailure { ref name, .. } if name == "fetch"));
    }

    async fn explode() -> Result<Value, BoxError> {
        panic!("exploded")
    }

    #[tokio::test]
    async fn normalize_catches_panics() {
        let output = Output::pending(explode());
        let err = normalize("fragile", output).await.unwrap_err();

        match err {
            GraphError::ComputationPanicked { name, message } => {
                assert_eq!(name, "fragile");
                assert_eq!(message, "exploded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn normalize_unwraps_one_level_only() {
        let inner = Task::ready(Value::from(5i32));
        let output = Output::pending(async move { Ok(Value::new(inner)) });

        let value = normalize("nested", output).await.unwrap();
        let inner = value.get::<Task>().unwrap();
        assert_eq!(inner.await.unwrap().get::<i32>(), Ok(5));
    }

    #[tokio::test]
    async fn from_task_keeps_graph_errors() {
        let task = Task::failed(GraphError::UnknownDependency {
            name: "gone".to_string(),
        });

        let err = normalize("wrapper", Output::from_task(task)).await.unwrap_err();
        assert!(matches!(err, GraphError::UnknownDependency { ref name } if name == "gone"));
    }
}
