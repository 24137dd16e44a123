//! Resolver handed to providers while they build an instance.

use std::panic::Location;

use super::Scope;
use crate::dag::ServiceNode;
use crate::error::DiResult;
use crate::registration::Instance;
use crate::traits::ResolverCore;

/// Context passed to provider functions for resolving dependencies.
///
/// Resolution starts from the scope the service being built is registered
/// in, and every dependency resolved through it is recorded in the graph as
/// an edge from that service.
///
/// # Examples
///
/// ```
/// use ferrous_injector::{Provider, RootScope, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let root = RootScope::new();
/// root.provide(Provider::value("db", Database { url: "postgres://localhost".to_string() })).unwrap();
/// root.provide(Provider::transient("users", |ctx| {
///     assert_eq!(ctx.service().name, "users");
///     Ok(UserService { db: ctx.invoke("db")? })
/// })).unwrap();
///
/// let users = root.invoke::<UserService>("users").unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// assert!(root.dag().has_edge(&root.node("users"), &root.node("db")));
/// ```
pub struct ResolverContext<'a> {
    scope: &'a Scope,
    service: &'a ServiceNode,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(scope: &'a Scope, service: &'a ServiceNode) -> Self {
        Self { scope, service }
    }

    /// Scope the service being built is registered in.
    pub fn scope(&self) -> &Scope {
        self.scope
    }

    /// Vertex of the service being built.
    pub fn service(&self) -> &ServiceNode {
        self.service
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve_at(&self, name: &str, site: &'static Location<'static>) -> DiResult<Instance> {
        self.scope.resolve_from(name, Some(self.service), site)
    }
}
