#![no_main]

use ferrous_injector::{Dag, DiError, ServiceNode};
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;

fn node(byte: u8) -> ServiceNode {
    ServiceNode::new(format!("scope-{}", byte % 3), "fuzz", format!("s{}", byte % 16))
}

fuzz_target!(|data: &[u8]| {
    let dag = Dag::new();

    for pair in data.chunks_exact(2) {
        let (from, to) = (node(pair[0]), node(pair[1]));
        let edges_before = dag.edge_count();

        match dag.add_edge(&from, &to) {
            Ok(()) => assert!(dag.has_edge(&from, &to)),
            Err(DiError::CycleDetected(path)) => {
                // Rejected edges leave the graph untouched
                assert_eq!(dag.edge_count(), edges_before);
                assert_eq!(path.first(), Some(&from));
                assert_eq!(path.last(), Some(&from));
            }
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    let order = dag.topological_order();
    assert_eq!(order.len(), dag.vertex_count());
    let position: HashMap<_, _> = order.into_iter().enumerate().map(|(i, n)| (n, i)).collect();
    for (invoker, invoked) in dag.edges() {
        assert!(position[&invoked] < position[&invoker]);
    }
});
