//! Graph export of an injector tree for visualization and debugging.
//!
//! [`RootScope::export_graph`](crate::RootScope::export_graph) snapshots the
//! scope tree, every registered service and the recorded invocation edges.
//! The snapshot renders to Graphviz DOT or Mermaid, and to JSON with the
//! `graph-export` feature.

use std::fmt::Write as _;

#[cfg(feature = "graph-export")]
use serde::{Deserialize, Serialize};

use crate::dag::ServiceNode;
use crate::descriptors::ServiceDescriptor;
use crate::lifetime::Lifetime;

/// A scope and the services registered in it.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct ScopeNode {
    pub id: String,
    pub name: String,
    /// `None` for the root scope
    pub parent_id: Option<String>,
    pub services: Vec<ServiceDescriptor>,
}

/// An invocation edge: `from` resolved `to` while being built.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphEdge {
    pub from: ServiceNode,
    pub to: ServiceNode,
}

/// Snapshot of an injector tree.
///
/// # Examples
///
/// ```
/// use ferrous_injector::{Provider, RootScope, Resolver};
///
/// let root = RootScope::new();
/// root.provide(Provider::value("port", 5432u16)).unwrap();
/// root.provide(Provider::lazy("dsn", |r| {
///     Ok(format!("postgres://localhost:{}", r.invoke::<u16>("port")?))
/// })).unwrap();
/// root.invoke::<String>("dsn").unwrap();
///
/// let graph = root.export_graph();
/// assert_eq!(graph.scopes.len(), 1);
/// assert_eq!(graph.edges.len(), 1);
///
/// let dot = graph.to_dot();
/// assert!(dot.starts_with("digraph Injector {"));
/// assert!(dot.contains("->"));
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct InjectorGraph {
    /// Scopes in depth-first order, root first
    pub scopes: Vec<ScopeNode>,
    pub edges: Vec<GraphEdge>,
}

impl InjectorGraph {
    pub fn service_count(&self) -> usize {
        self.scopes.iter().map(|scope| scope.services.len()).sum()
    }

    /// Renders the graph as Graphviz DOT, one cluster per scope.
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph Injector {\n");
        output.push_str("  rankdir=TB;\n");
        output.push_str("  node [shape=box];\n\n");

        for (idx, scope) in self.scopes.iter().enumerate() {
            let _ = writeln!(output, "  subgraph cluster_{} {{", idx);
            let _ = writeln!(output, "    label=\"{}\";", escape(&scope.name));
            for service in &scope.services {
                let _ = writeln!(
                    output,
                    "    \"{}/{}\" [label=\"{}\\n({})\", fillcolor={}, style=filled];",
                    scope.id,
                    escape(&service.name),
                    escape(&service.name),
                    service.lifetime,
                    color(service.lifetime)
                );
            }
            output.push_str("  }\n");
        }

        output.push('\n');

        for edge in &self.edges {
            let _ = writeln!(
                output,
                "  \"{}/{}\" -> \"{}/{}\";",
                edge.from.scope_id,
                escape(&edge.from.name),
                edge.to.scope_id,
                escape(&edge.to.name)
            );
        }

        output.push_str("}\n");
        output
    }

    /// Renders the graph as a Mermaid flowchart.
    pub fn to_mermaid(&self) -> String {
        let mut ids = std::collections::HashMap::new();
        let mut output = String::from("graph TD\n");

        for scope in &self.scopes {
            let _ = writeln!(output, "  subgraph \"{}\"", escape(&scope.name));
            for service in &scope.services {
                let id = format!("n{}", ids.len());
                let _ = writeln!(output, "    {}[\"{} ({})\"]", id, escape(&service.name), service.lifetime);
                ids.insert((scope.id.as_str(), service.name.as_str()), id);
            }
            output.push_str("  end\n");
        }

        for edge in &self.edges {
            let from = ids.get(&(edge.from.scope_id.as_str(), edge.from.name.as_str()));
            let to = ids.get(&(edge.to.scope_id.as_str(), edge.to.name.as_str()));
            if let (Some(from), Some(to)) = (from, to) {
                let _ = writeln!(output, "  {} --> {}", from, to);
            }
        }
        output
    }

    /// Serializes the graph as pretty-printed JSON.
    #[cfg(feature = "graph-export")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn color(lifetime: Lifetime) -> &'static str {
    match lifetime {
        Lifetime::Eager => "lightblue",
        Lifetime::Lazy => "lightgreen",
        Lifetime::Transient => "lightyellow",
        Lifetime::Alias => "lightgrey",
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilitySet;

    fn descriptor(name: &str, lifetime: Lifetime) -> ServiceDescriptor {
        ServiceDescriptor {
            name: name.to_string(),
            scope_id: "s0".to_string(),
            scope_name: "[root]".to_string(),
            lifetime,
            type_name: "u8".to_string(),
            capabilities: CapabilitySet::default(),
            materialized: false,
            provided_at: "src/main.rs:1:1".to_string(),
            invocations: Vec::new(),
            invocation_count: 0,
        }
    }

    fn sample() -> InjectorGraph {
        InjectorGraph {
            scopes: vec![ScopeNode {
                id: "s0".to_string(),
                name: "[root]".to_string(),
                parent_id: None,
                services: vec![descriptor("a", Lifetime::Lazy), descriptor("b\"q", Lifetime::Eager)],
            }],
            edges: vec![GraphEdge {
                from: ServiceNode::new("s0", "[root]", "a"),
                to: ServiceNode::new("s0", "[root]", "b\"q"),
            }],
        }
    }

    #[test]
    fn test_dot_escapes_quotes() {
        let dot = sample().to_dot();
        assert!(dot.contains("\"s0/a\" -> \"s0/b\\\"q\";"));
        assert!(dot.contains("fillcolor=lightgreen"));
    }

    #[test]
    fn test_mermaid_links_known_nodes() {
        let mermaid = sample().to_mermaid();
        assert!(mermaid.starts_with("graph TD\n"));
        assert!(mermaid.contains("n0 --> n1"));
    }

    #[cfg(feature = "graph-export")]
    #[test]
    fn test_json_export() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"scopes\""));
        assert!(json.contains("\"lazy\"") || json.contains("\"Lazy\""));
    }
}
