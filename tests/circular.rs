use ferrous_injector::{DiError, Provider, Resolver, RootScope, ServiceNode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

fn cycle_names(path: &[ServiceNode]) -> Vec<&str> {
    path.iter().map(|node| node.name.as_str()).collect()
}

#[test]
fn test_self_circular_dependency() {
    let root = RootScope::new();
    root.provide(Provider::transient("selfish", |r| {
        r.invoke::<u8>("selfish")?;
        Ok(0u8)
    }))
    .unwrap();

    match root.invoke::<u8>("selfish") {
        Err(DiError::CycleDetected(path)) => assert_eq!(cycle_names(&path), ["selfish", "selfish"]),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
    assert_eq!(root.dag().edge_count(), 0);
}

#[test]
fn test_two_service_cycle() {
    let root = RootScope::new();
    root.provide(Provider::lazy("a", |r| Ok(*r.invoke::<u32>("b")? + 1))).unwrap();
    root.provide(Provider::lazy("b", |r| Ok(*r.invoke::<u32>("a")? + 1))).unwrap();

    match root.invoke::<u32>("a") {
        Err(DiError::CycleDetected(path)) => {
            // Reported from the edge that would have closed the loop
            assert_eq!(cycle_names(&path), ["b", "a", "b"]);
            assert_eq!(path.first(), path.last());
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }

    // The rejected edge was not inserted
    assert!(root.dag().has_edge(&root.node("a"), &root.node("b")));
    assert!(!root.dag().has_edge(&root.node("b"), &root.node("a")));
}

#[test]
fn test_three_service_cycle_error_message() {
    let root = RootScope::new();
    root.provide(Provider::lazy("a", |r| Ok(*r.invoke::<u8>("b")?))).unwrap();
    root.provide(Provider::lazy("b", |r| Ok(*r.invoke::<u8>("c")?))).unwrap();
    root.provide(Provider::lazy("c", |r| Ok(*r.invoke::<u8>("a")?))).unwrap();

    let err = root.invoke::<u8>("a").unwrap_err();
    assert_eq!(
        err.to_string(),
        "circular dependency detected: [root]/c -> [root]/a -> [root]/b -> [root]/c"
    );
}

#[test]
fn test_cycle_across_scopes() {
    let root = RootScope::new();
    let child = root.create_child("child").unwrap();

    root.provide(Provider::lazy("parent-service", |r| {
        // Resolves from the root, so it can only reach the root's services
        Ok(*r.invoke::<u8>("parent-service")?)
    }))
    .unwrap();
    child.provide(Provider::lazy("child-service", |r| Ok(*r.invoke::<u8>("parent-service")?))).unwrap();

    match child.invoke::<u8>("child-service") {
        Err(DiError::CycleDetected(path)) => {
            assert!(path.iter().all(|node| node.scope_id == root.id()));
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
    assert!(root.dag().has_edge(&child.node("child-service"), &root.node("parent-service")));
}

#[test]
fn test_diamond_is_not_a_cycle() {
    let root = RootScope::new();
    root.provide(Provider::value("config", 1u32)).unwrap();
    root.provide(Provider::lazy("left", |r| Ok(*r.invoke::<u32>("config")? + 1))).unwrap();
    root.provide(Provider::lazy("right", |r| Ok(*r.invoke::<u32>("config")? + 2))).unwrap();
    root.provide(Provider::lazy("top", |r| {
        Ok(*r.invoke::<u32>("left")? + *r.invoke::<u32>("right")?)
    }))
    .unwrap();

    assert_eq!(*root.invoke::<u32>("top").unwrap(), 5);
    assert_eq!(root.dag().edge_count(), 4);

    let layers: Vec<Vec<String>> = root
        .dag()
        .layers()
        .into_iter()
        .map(|layer| layer.into_iter().map(|node| node.name).collect())
        .collect();
    assert_eq!(layers, vec![vec!["config"], vec!["left", "right"], vec!["top"]]);
}

#[test]
fn test_cross_thread_cycle_fails_instead_of_deadlocking() {
    let root = RootScope::new();
    let barrier = Arc::new(Barrier::new(2));

    // Both lazy locks are held before either provider resolves its dependency.
    let gate = barrier.clone();
    let waited = AtomicBool::new(false);
    root.provide(Provider::lazy("a", move |r| {
        if !waited.swap(true, Ordering::SeqCst) {
            gate.wait();
        }
        Ok(*r.invoke::<u8>("b")?)
    }))
    .unwrap();
    let gate = barrier.clone();
    let waited = AtomicBool::new(false);
    root.provide(Provider::lazy("b", move |r| {
        if !waited.swap(true, Ordering::SeqCst) {
            gate.wait();
        }
        Ok(*r.invoke::<u8>("a")?)
    }))
    .unwrap();

    let results: Vec<Result<Arc<u8>, DiError>> = crossbeam_utils::thread::scope(|s| {
        let first = s.spawn(|_| root.invoke::<u8>("a"));
        let second = s.spawn(|_| root.invoke::<u8>("b"));
        vec![first.join().unwrap(), second.join().unwrap()]
    })
    .unwrap();

    // At least one side sees the cycle; neither blocks forever.
    assert!(results
        .iter()
        .any(|result| matches!(result, Err(DiError::CycleDetected(_)))));
    assert!(results.iter().all(|result| result.is_err()));
}
