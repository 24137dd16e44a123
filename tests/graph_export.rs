use ferrous_injector::{Lifetime, Provider, Resolver, RootScope};

fn application() -> RootScope {
    let root = RootScope::new();
    root.provide(Provider::value("config", 3u32)).unwrap();
    root.provide(Provider::lazy("db", |r| Ok(*r.invoke::<u32>("config")? * 2))).unwrap();

    let api = root.create_child("api").unwrap();
    api.provide(Provider::transient("handler", |r| Ok(*r.invoke::<u32>("db")? + 1)))
        .unwrap();
    api.provide_alias("database", "db").unwrap();
    api.invoke::<u32>("handler").unwrap();
    root
}

#[test]
fn test_export_contains_scopes_services_and_edges() {
    let root = application();
    let graph = root.export_graph();

    assert_eq!(graph.scopes.len(), 2);
    assert_eq!(graph.service_count(), 4);
    assert_eq!(graph.scopes[0].parent_id, None);
    assert_eq!(graph.scopes[1].parent_id.as_deref(), Some(root.id()));

    let alias = graph.scopes[1].services.iter().find(|s| s.name == "database").unwrap();
    assert_eq!(alias.lifetime, Lifetime::Alias);
    assert_eq!(alias.type_name, "alias of `db`");
    assert_eq!(alias.qualified_name(), "api/database");

    let edges: Vec<(String, String)> = graph
        .edges
        .iter()
        .map(|edge| (edge.from.to_string(), edge.to.to_string()))
        .collect();
    assert_eq!(
        edges,
        [
            ("[root]/db".to_string(), "[root]/config".to_string()),
            ("api/handler".to_string(), "[root]/db".to_string()),
        ]
    );
}

#[test]
fn test_dot_and_mermaid_rendering() {
    let graph = application().export_graph();

    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph Injector {"));
    assert_eq!(dot.matches("subgraph cluster_").count(), 2);
    assert_eq!(dot.matches(" -> ").count(), 2);
    assert!(dot.contains("fillcolor=lightgreen"));

    let mermaid = graph.to_mermaid();
    assert!(mermaid.starts_with("graph TD"));
    assert_eq!(mermaid.matches(" --> ").count(), 2);
    assert!(mermaid.contains("handler (transient)"));
}

#[test]
fn test_scope_invocation_edges() {
    let root = application();
    let api = root.child_by_name("api").unwrap();

    // Edges touching one of the scope's own services
    assert_eq!(api.invocation_edges().len(), 1);
    assert_eq!(root.invocation_edges().len(), 2);
}

#[cfg(feature = "graph-export")]
#[test]
fn test_json_round_trip() {
    let graph = application().export_graph();
    let json = graph.to_json().unwrap();
    let parsed: ferrous_injector::InjectorGraph = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.service_count(), graph.service_count());
    assert_eq!(parsed.edges.len(), 2);
}

#[cfg(feature = "diagnostics")]
#[test]
fn test_debug_dump() {
    let dump = application().to_debug_string();
    assert!(dump.starts_with("[root] ("));
    assert!(dump.contains("\n  api ("));
    assert!(dump.contains("- db [lazy] u32 *"));
}
