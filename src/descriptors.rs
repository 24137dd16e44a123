//! Service descriptors for introspection and diagnostics.

use crate::capabilities::CapabilitySet;
use crate::lifetime::Lifetime;

/// Snapshot of a registered service.
///
/// Returned by [`Scope::list_provided_services`](crate::Scope::list_provided_services)
/// and embedded in graph exports.
///
/// # Examples
///
/// ```rust
/// use ferrous_injector::{Lifetime, Provider, RootScope, Resolver};
///
/// let root = RootScope::new();
/// root.provide(Provider::lazy("config", |_| Ok(String::from("debug=true")))).unwrap();
///
/// let before = &root.list_provided_services()[0];
/// assert_eq!(before.lifetime, Lifetime::Lazy);
/// assert!(!before.materialized);
/// assert!(before.provided_at.contains(".rs:"));
///
/// root.invoke::<String>("config").unwrap();
/// let after = &root.list_provided_services()[0];
/// assert!(after.materialized);
/// assert_eq!(after.invocation_count, 1);
/// assert_eq!(after.type_name, "alloc::string::String");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceDescriptor {
    /// Service name, unique within its scope
    pub name: String,
    /// Id of the scope the service is registered in
    pub scope_id: String,
    /// Name of that scope
    pub scope_name: String,
    pub lifetime: Lifetime,
    /// Concrete type produced by the provider
    pub type_name: String,
    pub capabilities: CapabilitySet,
    /// Whether an instance currently exists
    pub materialized: bool,
    /// Source location of the `provide` call
    pub provided_at: String,
    /// Most recent invocation sites, oldest first
    pub invocations: Vec<String>,
    /// Total number of resolutions, including those no longer in `invocations`
    pub invocation_count: u64,
}

impl ServiceDescriptor {
    /// `scope/name`, the form used in cycle paths and graph exports.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.scope_name, self.name)
    }
}
