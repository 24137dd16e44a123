//! Dependency graph between invoked services.
//!
//! Every time a provider resolves another service while building its own
//! instance, an edge `invoker -> invoked` is recorded. The graph rejects any
//! edge that would close a cycle and is later walked in reverse topological
//! order to shut services down dependents-first.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use parking_lot::Mutex;

use crate::error::{DiError, DiResult};

/// A vertex of the dependency graph: a service name inside a given scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "graph-export", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceNode {
    /// Unique id of the owning scope
    pub scope_id: String,
    /// Human name of the owning scope
    pub scope_name: String,
    /// Service name within the scope
    pub name: String,
}

impl ServiceNode {
    pub fn new(
        scope_id: impl Into<String>,
        scope_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            scope_id: scope_id.into(),
            scope_name: scope_name.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ServiceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope_name, self.name)
    }
}

/// Directed acyclic graph of service invocations.
///
/// Vertices are kept in insertion order, which is used to break ties
/// whenever several topological orders are valid.
///
/// # Examples
///
/// ```
/// use ferrous_injector::{Dag, DiError, ServiceNode};
///
/// let dag = Dag::new();
/// let a = ServiceNode::new("s1", "root", "a");
/// let b = ServiceNode::new("s1", "root", "b");
///
/// dag.add_edge(&a, &b).unwrap();
/// match dag.add_edge(&b, &a) {
///     Err(DiError::CycleDetected(path)) => assert_eq!(path, vec![b.clone(), a.clone(), b.clone()]),
///     _ => unreachable!(),
/// }
/// assert_eq!(dag.topological_order(), vec![b, a]);
/// ```
#[derive(Default)]
pub struct Dag {
    inner: Mutex<DagInner>,
}

#[derive(Default)]
struct DagInner {
    vertices: Vec<ServiceNode>,
    index: HashMap<ServiceNode, usize>,
    /// invoker -> invoked
    out: Vec<BTreeSet<usize>>,
    /// invoked -> invokers
    inc: Vec<BTreeSet<usize>>,
    edge_count: usize,
}

impl DagInner {
    fn vertex(&mut self, node: &ServiceNode) -> usize {
        if let Some(&idx) = self.index.get(node) {
            return idx;
        }
        let idx = self.vertices.len();
        self.vertices.push(node.clone());
        self.index.insert(node.clone(), idx);
        self.out.push(BTreeSet::new());
        self.inc.push(BTreeSet::new());
        idx
    }

    /// Depth-first search for a path `from ⇝ to`, returned inclusive of both ends.
    fn path(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        let mut visited = vec![false; self.vertices.len()];
        let mut stack = vec![(from, self.out[from].iter())];
        visited[from] = true;

        while let Some((current, next)) = stack.last_mut() {
            if *current == to {
                return Some(stack.iter().map(|(v, _)| *v).collect());
            }
            match next.next() {
                Some(&v) if !visited[v] => {
                    visited[v] = true;
                    stack.push((v, self.out[v].iter()));
                }
                Some(_) => {}
                None => {
                    stack.pop();
                }
            }
        }
        None
    }

    fn layers(&self, restrict: Option<&HashSet<usize>>) -> Vec<Vec<usize>> {
        let keep = |v: usize| restrict.map_or(true, |set| set.contains(&v));
        let mut remaining: Vec<usize> = vec![0; self.vertices.len()];
        let mut pending = 0;
        for v in (0..self.vertices.len()).filter(|&v| keep(v)) {
            remaining[v] = self.out[v].iter().filter(|&&w| keep(w)).count();
            pending += 1;
        }

        let mut layers = Vec::new();
        let mut current: Vec<usize> = (0..self.vertices.len())
            .filter(|&v| keep(v) && remaining[v] == 0)
            .collect();

        while !current.is_empty() {
            pending -= current.len();
            let mut next = BTreeSet::new();
            for &v in &current {
                for &invoker in self.inc[v].iter().filter(|&&w| keep(w)) {
                    remaining[invoker] -= 1;
                    if remaining[invoker] == 0 {
                        next.insert(invoker);
                    }
                }
            }
            layers.push(current);
            current = next.into_iter().collect();
        }

        debug_assert_eq!(pending, 0, "dependency graph contains a cycle");
        layers
    }
}

impl Dag {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex if it is not already present.
    pub fn add_vertex(&self, node: &ServiceNode) {
        self.inner.lock().vertex(node);
    }

    /// Records that `invoker` resolved `invoked`.
    ///
    /// Inserting an existing edge is a no-op. An edge that would close a
    /// cycle is rejected with [`DiError::CycleDetected`], whose path starts and
    /// ends with `invoker`; the graph is left unchanged in that case.
    pub fn add_edge(&self, invoker: &ServiceNode, invoked: &ServiceNode) -> DiResult<()> {
        let mut inner = self.inner.lock();

        if let (Some(&from), Some(&to)) = (inner.index.get(invoker), inner.index.get(invoked)) {
            if inner.out[from].contains(&to) {
                return Ok(());
            }
            let cycle = if from == to {
                Some(vec![from, from])
            } else {
                inner.path(to, from).map(|path| {
                    let mut cycle = Vec::with_capacity(path.len() + 1);
                    cycle.push(from);
                    cycle.extend(path);
                    cycle
                })
            };
            if let Some(cycle) = cycle {
                let path = cycle.into_iter().map(|v| inner.vertices[v].clone()).collect();
                return Err(DiError::CycleDetected(path));
            }
        } else if invoker == invoked {
            return Err(DiError::CycleDetected(vec![invoker.clone(), invoked.clone()]));
        }

        let from = inner.vertex(invoker);
        let to = inner.vertex(invoked);
        inner.out[from].insert(to);
        inner.inc[to].insert(from);
        inner.edge_count += 1;
        Ok(())
    }

    /// Returns true if the edge `invoker -> invoked` exists.
    pub fn has_edge(&self, invoker: &ServiceNode, invoked: &ServiceNode) -> bool {
        let inner = self.inner.lock();
        match (inner.index.get(invoker), inner.index.get(invoked)) {
            (Some(&from), Some(&to)) => inner.out[from].contains(&to),
            _ => false,
        }
    }

    /// Services `node` invoked directly.
    pub fn dependencies(&self, node: &ServiceNode) -> Vec<ServiceNode> {
        let inner = self.inner.lock();
        inner.index.get(node).map_or_else(Vec::new, |&v| {
            inner.out[v].iter().map(|&w| inner.vertices[w].clone()).collect()
        })
    }

    /// Services that invoked `node` directly.
    pub fn dependents(&self, node: &ServiceNode) -> Vec<ServiceNode> {
        let inner = self.inner.lock();
        inner.index.get(node).map_or_else(Vec::new, |&v| {
            inner.inc[v].iter().map(|&w| inner.vertices[w].clone()).collect()
        })
    }

    /// All vertices in insertion order.
    pub fn vertices(&self) -> Vec<ServiceNode> {
        self.inner.lock().vertices.clone()
    }

    /// All edges as `(invoker, invoked)` pairs, grouped by invoker insertion order.
    pub fn edges(&self) -> Vec<(ServiceNode, ServiceNode)> {
        let inner = self.inner.lock();
        inner
            .out
            .iter()
            .enumerate()
            .flat_map(|(from, targets)| {
                targets
                    .iter()
                    .map(move |&to| (from, to))
            })
            .map(|(from, to)| (inner.vertices[from].clone(), inner.vertices[to].clone()))
            .collect()
    }

    pub fn vertex_count(&self) -> usize {
        self.inner.lock().vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.lock().edge_count
    }

    /// Linear order with every service after the services it invoked.
    pub fn topological_order(&self) -> Vec<ServiceNode> {
        self.layers().into_iter().flatten().collect()
    }

    /// Topological order grouped in layers: a vertex only depends on vertices
    /// of earlier layers. Within a layer, vertices keep insertion order.
    pub fn layers(&self) -> Vec<Vec<ServiceNode>> {
        let inner = self.inner.lock();
        inner
            .layers(None)
            .into_iter()
            .map(|layer| layer.into_iter().map(|v| inner.vertices[v].clone()).collect())
            .collect()
    }

    /// Same as [`layers`](Self::layers), restricted to the given vertices.
    ///
    /// Vertices unknown to the graph are placed in the first layer, after
    /// the known ones.
    pub fn layers_of(&self, nodes: &[ServiceNode]) -> Vec<Vec<ServiceNode>> {
        let inner = self.inner.lock();
        let known: HashSet<usize> = nodes.iter().filter_map(|n| inner.index.get(n).copied()).collect();
        let mut layers: Vec<Vec<ServiceNode>> = inner
            .layers(Some(&known))
            .into_iter()
            .map(|layer| layer.into_iter().map(|v| inner.vertices[v].clone()).collect())
            .collect();

        let unknown: Vec<ServiceNode> = nodes
            .iter()
            .filter(|n| !inner.index.contains_key(*n))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            match layers.first_mut() {
                Some(first) => first.extend(unknown),
                None => layers.push(unknown),
            }
        }
        layers
    }
}

impl fmt::Debug for Dag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dag")
            .field("vertices", &self.vertex_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> ServiceNode {
        ServiceNode::new("id", "root", name)
    }

    #[test]
    fn test_edge_insertion_is_idempotent() {
        let dag = Dag::new();
        dag.add_edge(&node("a"), &node("b")).unwrap();
        dag.add_edge(&node("a"), &node("b")).unwrap();
        assert_eq!(dag.edge_count(), 1);
        assert!(dag.has_edge(&node("a"), &node("b")));
        assert!(!dag.has_edge(&node("b"), &node("a")));
    }

    #[test]
    fn test_self_loop_rejected() {
        let dag = Dag::new();
        let err = dag.add_edge(&node("a"), &node("a")).unwrap_err();
        match err {
            DiError::CycleDetected(path) => assert_eq!(path, vec![node("a"), node("a")]),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(dag.edge_count(), 0);
    }

    #[test]
    fn test_long_cycle_path() {
        let dag = Dag::new();
        dag.add_edge(&node("a"), &node("b")).unwrap();
        dag.add_edge(&node("b"), &node("c")).unwrap();
        dag.add_edge(&node("c"), &node("d")).unwrap();

        let err = dag.add_edge(&node("d"), &node("a")).unwrap_err();
        match err {
            DiError::CycleDetected(path) => assert_eq!(
                path,
                vec![node("d"), node("a"), node("b"), node("c"), node("d")]
            ),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(dag.edge_count(), 3);
    }

    #[test]
    fn test_layers_break_ties_by_insertion_order() {
        let dag = Dag::new();
        for name in ["web", "cache", "db", "metrics"] {
            dag.add_vertex(&node(name));
        }
        dag.add_edge(&node("web"), &node("db")).unwrap();
        dag.add_edge(&node("web"), &node("cache")).unwrap();
        dag.add_edge(&node("cache"), &node("db")).unwrap();

        let layers = dag.layers();
        assert_eq!(
            layers,
            vec![
                vec![node("db"), node("metrics")],
                vec![node("cache")],
                vec![node("web")],
            ]
        );
    }

    #[test]
    fn test_layers_of_ignores_missing_vertices() {
        let dag = Dag::new();
        dag.add_edge(&node("a"), &node("b")).unwrap();
        dag.add_edge(&node("b"), &node("c")).unwrap();

        // "b" is not part of the restriction: a and c become independent
        let layers = dag.layers_of(&[node("a"), node("c"), node("z")]);
        assert_eq!(layers, vec![vec![node("a"), node("c"), node("z")]]);
    }
}
