/// Property-based tests for the dependency graph
///
/// Whatever sequence of edges is offered, the graph must stay acyclic, reject
/// exactly the edges that would close a loop, and report that loop.
use ferrous_injector::{Dag, DiError, ServiceNode};
use proptest::prelude::*;
use std::collections::HashMap;

const VERTICES: usize = 8;

fn node(i: usize) -> ServiceNode {
    ServiceNode::new("scope", "root", format!("s{}", i))
}

fn edges() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..VERTICES, 0..VERTICES), 0..40)
}

proptest! {
    #[test]
    fn graph_stays_acyclic(offered in edges()) {
        let dag = Dag::new();
        for (from, to) in offered {
            let _ = dag.add_edge(&node(from), &node(to));
        }

        let order = dag.topological_order();
        prop_assert_eq!(order.len(), dag.vertex_count());

        // Every service comes after the services it invoked
        let position: HashMap<ServiceNode, usize> =
            order.into_iter().enumerate().map(|(i, n)| (n, i)).collect();
        for (invoker, invoked) in dag.edges() {
            prop_assert!(position[&invoked] < position[&invoker]);
        }
    }

    #[test]
    fn rejected_edge_leaves_graph_unchanged(offered in edges()) {
        let dag = Dag::new();
        for (from, to) in offered {
            let before = dag.edges();
            match dag.add_edge(&node(from), &node(to)) {
                Ok(()) => prop_assert!(dag.has_edge(&node(from), &node(to))),
                Err(DiError::CycleDetected(path)) => {
                    prop_assert_eq!(dag.edges(), before);
                    // The loop starts at the invoker, goes through the invoked, and comes back
                    prop_assert_eq!(path.first(), Some(&node(from)));
                    prop_assert_eq!(path.last(), Some(&node(from)));
                    prop_assert_eq!(&path[1], &node(to));
                    for pair in path[1..].windows(2) {
                        prop_assert!(dag.has_edge(&pair[0], &pair[1]));
                    }
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }

    #[test]
    fn layers_only_depend_on_earlier_layers(offered in edges()) {
        let dag = Dag::new();
        for (from, to) in offered {
            let _ = dag.add_edge(&node(from), &node(to));
        }

        let layers = dag.layers();
        let layer_of: HashMap<ServiceNode, usize> = layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| layer.iter().cloned().map(move |n| (n, i)))
            .collect();
        for (invoker, invoked) in dag.edges() {
            prop_assert!(layer_of[&invoked] < layer_of[&invoker]);
        }
    }
}
