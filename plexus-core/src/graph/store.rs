//! Node Store
//!
//! Holds the declared graph: a mapping from node name to definition, plus
//! a reverse index from each dependency name to the nodes that list it.
//! The reverse index is kept up to date on every declaration.
//!
//! # Traversals
//!
//! Two walks run over the declared edges:
//!
//! 1. Cycle search, forward along dependencies, before a computation starts.
//!    A search that finds no cycle anywhere below its start proves every
//!    node it reached acyclic. Proven nodes are not searched again until
//!    the next declaration, so resolving a whole graph costs one walk over
//!    its edges instead of one per node.
//! 2. Invalidation, backward along dependents, when a name is redeclared.
//!    This is the same breadth-first propagation a dirty flag takes through
//!    an incremental graph, except nothing is recomputed eagerly.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, RwLock};

use super::node::{Generation, Node};
use crate::error::GraphError;

/// A node together with the generation it was declared at.
#[derive(Debug, Clone)]
struct Declared {
    node: Node,
    generation: Generation,
}

#[derive(Debug, Default)]
struct Declarations {
    nodes: IndexMap<String, Declared>,
    /// Dependency name to the names of the nodes that depend on it.
    dependents: HashMap<String, IndexSet<String>>,
}

/// The declared nodes of a graph, in declaration order.
#[derive(Debug, Default)]
pub struct NodeStore {
    declarations: RwLock<Declarations>,
    /// Nodes from which no cycle is reachable. Only written while the
    /// declarations are read-locked, and cleared under the write lock.
    acyclic: Mutex<HashSet<String>>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `node` under `name`, replacing any prior definition.
    ///
    /// Returns the generation stamped on the new definition and whether a
    /// previous definition was overwritten.
    pub fn declare(&self, name: String, node: Node) -> (Generation, bool) {
        let generation = Generation::next();
        let mut declarations = self.declarations.write();
        let Declarations { nodes, dependents } = &mut *declarations;

        for dependency in node.dependencies() {
            dependents
                .entry(dependency.clone())
                .or_default()
                .insert(name.clone());
        }

        let previous = nodes.insert(name.clone(), Declared { node, generation });
        if let Some(previous) = &previous {
            let current = &nodes[&name].node;
            for dependency in previous.node.dependencies() {
                if current.dependencies().contains(dependency) {
                    continue;
                }
                if let Some(names) = dependents.get_mut(dependency) {
                    names.shift_remove(&name);
                }
            }
        }

        self.acyclic.lock().clear();
        (generation, previous.is_some())
    }

    /// Look up a node and the generation it was declared at.
    pub fn lookup(&self, name: &str) -> Result<(Node, Generation), GraphError> {
        self.declarations
            .read()
            .nodes
            .get(name)
            .map(|declared| (declared.node.clone(), declared.generation))
            .ok_or_else(|| GraphError::UnknownDependency {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.declarations.read().nodes.contains_key(name)
    }

    /// Node names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.declarations.read().nodes.keys().cloned().collect()
    }

    pub fn dependencies_of(&self, name: &str) -> Option<Vec<String>> {
        self.declarations
            .read()
            .nodes
            .get(name)
            .map(|declared| declared.node.dependencies().to_vec())
    }

    pub fn len(&self) -> usize {
        self.declarations.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.read().nodes.is_empty()
    }

    /// Find a dependency cycle passing through `start`.
    ///
    /// Walks depth first along declared dependencies. Names with no declared
    /// node are skipped; resolution reports those separately. Returns the
    /// cycle as a path that starts and ends with `start`.
    pub fn find_cycle(&self, start: &str) -> Option<Vec<String>> {
        let declarations = self.declarations.read();
        let nodes = &declarations.nodes;
        let (start, _) = nodes.get_key_value(start)?;
        let start = start.as_str();

        let mut acyclic = self.acyclic.lock();
        if acyclic.contains(start) {
            return None;
        }

        let mut visited: HashSet<&str> = HashSet::from([start]);
        let mut on_path: HashSet<&str> = HashSet::from([start]);
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        // Set when some cycle not through `start` is reachable.
        let mut tainted = false;

        while let Some(frame) = stack.last_mut() {
            let (current, index) = *frame;
            frame.1 += 1;

            let next = nodes
                .get(current)
                .and_then(|declared| declared.node.dependencies().get(index));

            match next {
                Some(next) if next == start => {
                    let mut path: Vec<String> =
                        stack.iter().map(|(name, _)| name.to_string()).collect();
                    path.push(start.to_string());
                    return Some(path);
                }
                Some(next) => {
                    let next = next.as_str();
                    if on_path.contains(next) {
                        tainted = true;
                    } else if nodes.contains_key(next)
                        && !acyclic.contains(next)
                        && visited.insert(next)
                    {
                        on_path.insert(next);
                        stack.push((next, 0));
                    }
                }
                None => {
                    on_path.remove(current);
                    stack.pop();
                }
            }
        }

        if !tainted {
            acyclic.extend(visited.into_iter().map(str::to_string));
        }
        None
    }

    /// Whether `name` has been proven to reach no cycle since the last
    /// declaration.
    pub fn is_proven_acyclic(&self, name: &str) -> bool {
        self.acyclic.lock().contains(name)
    }

    /// Collect `name` and every node that transitively depends on it.
    pub fn dependents_closure(&self, name: &str) -> Vec<String> {
        let declarations = self.declarations.read();

        let mut affected = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([name]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            affected.push(current.to_string());

            if let Some(dependents) = declarations.dependents.get(current) {
                queue.extend(dependents.iter().map(String::as_str));
            }
        }

        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Output;
    use crate::graph::node::{Computation, DependencyNames};
    use crate::value::Value;
    use std::sync::Arc;

    fn computation(dependencies: &[&str]) -> Node {
        let dependencies: DependencyNames = dependencies.iter().map(|d| d.to_string()).collect();
        Node::Computation(Computation::new(
            Arc::new(|_| Ok(Output::ready(0i32))),
            dependencies,
        ))
    }

    fn store(nodes: &[(&str, &[&str])]) -> NodeStore {
        let store = NodeStore::new();
        for (name, dependencies) in nodes {
            store.declare(name.to_string(), computation(dependencies));
        }
        store
    }

    #[test]
    fn declare_and_lookup() {
        let store = NodeStore::new();
        let (generation, replaced) = store.declare("x".into(), Node::Value(Value::from(1i32)));
        assert!(!replaced);

        let (node, found) = store.lookup("x").unwrap();
        assert_eq!(found, generation);
        assert!(node.dependencies().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lookup_missing_is_unknown_dependency() {
        let store = NodeStore::new();
        let err = store.lookup("missing").unwrap_err();
        assert!(matches!(err, GraphError::UnknownDependency { ref name } if name == "missing"));
    }

    #[test]
    fn redeclare_overwrites_and_restamps() {
        let store = NodeStore::new();
        let (first, _) = store.declare("x".into(), Node::Value(Value::from(1i32)));
        let (second, replaced) = store.declare("x".into(), computation(&["y"]));

        assert!(replaced);
        assert_ne!(first, second);
        assert_eq!(store.dependencies_of("x"), Some(vec!["y".to_string()]));
        assert_eq!(store.names(), vec!["x".to_string()]);
    }

    #[test]
    fn names_keep_declaration_order() {
        let store = store(&[("c", &[]), ("a", &[]), ("b", &[])]);
        assert_eq!(store.names(), vec!["c", "a", "b"]);
    }

    #[test]
    fn finds_two_node_cycle() {
        let store = store(&[("a", &["b"]), ("b", &["a"])]);

        assert_eq!(store.find_cycle("a"), Some(vec!["a".into(), "b".into(), "a".into()]));
        assert_eq!(store.find_cycle("b"), Some(vec!["b".into(), "a".into(), "b".into()]));
    }

    #[test]
    fn finds_self_loop() {
        let store = store(&[("a", &["a"])]);
        assert_eq!(store.find_cycle("a"), Some(vec!["a".into(), "a".into()]));
    }

    #[test]
    fn node_feeding_a_cycle_is_not_on_it() {
        let store = store(&[("c", &["a"]), ("a", &["b"]), ("b", &["a"])]);
        assert_eq!(store.find_cycle("c"), None);
        assert!(store.find_cycle("a").is_some());
    }

    #[test]
    fn diamond_has_no_cycle() {
        let store = store(&[("x", &[]), ("f", &["x"]), ("g", &["x"]), ("h", &["f", "g", "missing"])]);
        for name in ["x", "f", "g", "h"] {
            assert_eq!(store.find_cycle(name), None);
        }
    }

    #[test]
    fn dependents_closure_follows_reverse_edges() {
        let store = store(&[
            ("x", &[]),
            ("f", &["x"]),
            ("g", &["x"]),
            ("h", &["f", "g"]),
            ("unrelated", &[]),
        ]);

        let mut affected = store.dependents_closure("x");
        affected.sort();
        assert_eq!(affected, vec!["f", "g", "h", "x"]);

        assert_eq!(store.dependents_closure("h"), vec!["h"]);
    }

    #[test]
    fn redeclaring_drops_stale_reverse_edges() {
        let store = store(&[("x", &[]), ("y", &[]), ("f", &["x"])]);
        store.declare("f".into(), computation(&["y"]));

        assert_eq!(store.dependents_closure("x"), vec!["x"]);
        assert_eq!(store.dependents_closure("y"), vec!["y", "f"]);
    }

    #[test]
    fn one_search_proves_a_whole_chain() {
        let store = NodeStore::new();
        store.declare("n0".into(), Node::Value(Value::from(0i32)));
        for i in 1..=100 {
            let previous = format!("n{}", i - 1);
            store.declare(format!("n{i}"), computation(&[previous.as_str()]));
        }

        assert_eq!(store.find_cycle("n100"), None);
        for i in 0..=100 {
            assert!(store.is_proven_acyclic(&format!("n{i}")));
        }
    }

    #[test]
    fn reachable_cycle_proves_nothing() {
        let store = store(&[("c", &["a"]), ("a", &["b"]), ("b", &["a"])]);

        assert_eq!(store.find_cycle("c"), None);
        assert!(!store.is_proven_acyclic("c"));
        assert!(store.find_cycle("b").is_some());
    }

    #[test]
    fn declaring_forgets_proofs() {
        let store = store(&[("a", &["b"]), ("b", &[])]);
        assert_eq!(store.find_cycle("a"), None);
        assert!(store.is_proven_acyclic("b"));

        store.declare("b".into(), computation(&["a"]));
        assert!(!store.is_proven_acyclic("a"));
        assert_eq!(store.find_cycle("a"), Some(vec!["a".into(), "b".into(), "a".into()]));
    }
}
