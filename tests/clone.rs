use ferrous_injector::{Context, InjectorOpts, Provider, Resolver, RootScope};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn sample() -> (RootScope, Arc<AtomicUsize>) {
    let built = Arc::new(AtomicUsize::new(0));
    let root = RootScope::new();
    root.provide(Provider::value("config", "v1".to_string())).unwrap();

    let counter = built.clone();
    root.provide(Provider::lazy("db", move |r| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("db({})", r.invoke::<String>("config")?))
    }))
    .unwrap();

    let api = root.create_child("api").unwrap();
    api.provide(Provider::lazy("handler", |r| Ok(r.invoke::<String>("db")?.len())))
        .unwrap();
    (root, built)
}

#[test]
fn test_clone_copies_tree_without_instances() {
    let (root, built) = sample();
    root.child_by_name("api").unwrap().invoke::<usize>("handler").unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 1);

    let copy = root.clone_injector();

    assert_ne!(copy.id(), root.id());
    let api = copy.child_by_name("api").unwrap();
    assert_ne!(api.id(), root.child_by_name("api").unwrap().id());

    // Same services, none resolved yet
    let names: Vec<String> = copy.list_provided_services().into_iter().map(|d| d.name).collect();
    assert_eq!(names, ["config", "db"]);
    let db = copy.list_provided_services().into_iter().find(|d| d.name == "db").unwrap();
    assert!(!db.materialized);
    assert_eq!(db.invocation_count, 0);
    assert!(copy.list_invoked_services().is_empty());

    // Vertices are carried over, edges are not
    assert_eq!(copy.dag().vertex_count(), root.dag().vertex_count());
    assert_eq!(copy.dag().edge_count(), 0);
    assert_eq!(root.dag().edge_count(), 2);

    api.invoke::<usize>("handler").unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 2, "the copy builds its own lazy instances");
}

#[test]
fn test_clone_shares_eager_values() {
    let (root, _) = sample();
    let copy = root.clone_injector();

    let original = root.invoke::<String>("config").unwrap();
    let copied = copy.invoke::<String>("config").unwrap();
    assert!(Arc::ptr_eq(&original, &copied));

    let db = root.invoke::<String>("db").unwrap();
    let copied_db = copy.invoke::<String>("db").unwrap();
    assert_eq!(db, copied_db);
    assert!(!Arc::ptr_eq(&db, &copied_db));
}

#[test]
fn test_clone_registries_are_independent() {
    let (root, _) = sample();
    let copy = root.clone_injector();

    copy.provide(Provider::value("extra", 1u8)).unwrap();
    copy.create_child("worker").unwrap();
    root.override_provider(Provider::value("config", "v2".to_string())).unwrap();

    assert!(!root.has_service("extra"));
    assert!(root.child_by_name("worker").is_none());
    assert_eq!(*copy.invoke::<String>("config").unwrap(), "v1");
    assert_eq!(*root.invoke::<String>("config").unwrap(), "v2");
}

#[tokio::test]
async fn test_clone_survives_original_shutdown() {
    let (root, _) = sample();
    let copy = root.clone_injector_with_opts(InjectorOpts::new().with_health_check_parallelism(2));
    assert_eq!(copy.opts().health_check_parallelism(), 2);

    root.shutdown(&Context::background()).await;
    assert!(root.is_shut_down());
    assert!(!copy.is_shut_down());
    assert_eq!(*copy.invoke::<String>("db").unwrap(), "db(v1)");
}
