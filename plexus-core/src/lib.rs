//! Plexus Core
//!
//! This crate provides the resolution engine for Plexus dependency graphs.
//! Clients declare what each computation depends on; the engine works out
//! when and in what order to run it. It implements:
//!
//! - A node store of named values and computations
//! - Recursive, memoized resolution with concurrent fan-out across siblings
//! - Cycle detection over the declared edges
//! - Normalization of sync and async callable results into one task model
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Node definitions, the node store, and the [`Graph`] handle
//! - `engine`: Tasks, the resolution cache, the resolver, and entry points
//! - `value`: Type-erased node payloads and callable arguments
//! - `config`: Cache lifetime and failure policies
//!
//! # Example
//!
//! ```rust,ignore
//! use plexus_core::{Graph, Output};
//!
//! let graph = Graph::new();
//! graph.declare_value("x", 1i64);
//! graph.declare_computation("f", ["x"], |args| Ok(Output::ready(args.get::<i64>(0)? + 1)));
//! graph.declare_computation("g", ["x"], |args| Ok(Output::ready(args.get::<i64>(0)? * 2)));
//!
//! let output = graph
//!     .run_entry_point(["f", "g"], |args| {
//!         Ok(Output::ready(args.get::<i64>(0)? + args.get::<i64>(1)?))
//!     })
//!     .await?;
//!
//! // `x` resolved once even though both `f` and `g` need it.
//! assert_eq!(output.settle().await?.get::<i64>()?, 4);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod value;

pub use config::{CacheScope, FailurePolicy, GraphConfig};
pub use engine::{Output, SlotState, Task, ENTRY_POINT};
pub use error::{BoxError, ConfigError, GraphError, ValueError};
pub use graph::Graph;
pub use value::{Args, Value};
