//! Scopes: named nodes of the tree, each owning a registry of services.

use std::panic::Location;
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use super::{receive, record, HookKind, LifecycleReport, RootScope, RootShared};
use crate::cancellation::Context;
use crate::dag::ServiceNode;
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::graph_export::ScopeNode;
use crate::registration::{Instance, Provider, Registry};
use crate::service::Service;
use crate::traits::ResolverCore;

/// A named node of the scope tree.
///
/// Services are resolved from the scope's own registry first, then from its
/// ancestors up to the root. A scope never sees the services of its
/// children or siblings.
///
/// `Scope` is a cheap handle: clones refer to the same node.
///
/// # Examples
///
/// ```
/// use ferrous_injector::{Provider, RootScope, Resolver};
///
/// let root = RootScope::new();
/// root.provide(Provider::value("region", "eu-west-1".to_string())).unwrap();
///
/// let request = root.create_child("request").unwrap();
/// request.provide(Provider::value("user", 42u64)).unwrap();
///
/// // Children see their ancestors' services...
/// assert_eq!(&*request.invoke::<String>("region").unwrap(), "eu-west-1");
/// // ...but not the other way around.
/// assert!(root.try_invoke::<u64>("user").unwrap().is_none());
///
/// assert_eq!(request.ancestors()[0].id(), root.id());
/// assert!(root.child_by_name("request").is_some());
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    id: String,
    name: String,
    parent: Option<Weak<ScopeInner>>,
    shared: Arc<RootShared>,
    children: RwLock<Vec<Scope>>,
    registry: RwLock<Registry>,
    /// Names resolved at least once, in first-invocation order
    invoked: Mutex<Vec<String>>,
}

impl Scope {
    pub(crate) fn new_root(name: &str, shared: Arc<RootShared>) -> Self {
        Self::new(name.to_string(), None, shared)
    }

    fn new(name: String, parent: Option<&Scope>, shared: Arc<RootShared>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: Uuid::new_v4().to_string(),
                name,
                parent: parent.map(|p| Arc::downgrade(&p.inner)),
                shared,
                children: RwLock::new(Vec::new()),
                registry: RwLock::new(Registry::default()),
                invoked: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<RootShared> {
        &self.inner.shared
    }

    /// Unique id, generated when the scope is created.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Graph vertex of `service` in this scope.
    pub fn node(&self, service: &str) -> ServiceNode {
        ServiceNode::new(self.inner.id.clone(), self.inner.name.clone(), service)
    }

    /// Parent scope; `None` for the root.
    pub fn parent(&self) -> Option<Scope> {
        let parent = self.inner.parent.as_ref()?;
        parent.upgrade().map(|inner| Scope { inner })
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self) -> Vec<Scope> {
        let mut ancestors = Vec::new();
        let mut current = self.parent();
        while let Some(scope) = current {
            current = scope.parent();
            ancestors.push(scope);
        }
        ancestors
    }

    /// The root of the tree, or `None` if it has been dropped.
    pub fn root_scope(&self) -> Option<RootScope> {
        let mut current = self.clone();
        loop {
            let parent = current.inner.parent.as_ref().map(Weak::upgrade);
            match parent {
                None => return Some(RootScope::from_scope(current)),
                Some(None) => return None,
                Some(Some(inner)) => current = Scope { inner },
            }
        }
    }

    /// Immediate children, in creation order.
    pub fn children(&self) -> Vec<Scope> {
        self.inner.children.read().clone()
    }

    pub fn child_by_id(&self, id: &str) -> Option<Scope> {
        self.inner.children.read().iter().find(|child| child.id() == id).cloned()
    }

    pub fn child_by_name(&self, name: &str) -> Option<Scope> {
        self.inner.children.read().iter().find(|child| child.name() == name).cloned()
    }

    /// Creates a child scope. Sibling names must be unique.
    pub fn create_child(&self, name: impl Into<String>) -> DiResult<Scope> {
        let name = name.into();
        let shared = self.shared();
        shared.ensure_running()?;

        let child = {
            let mut children = self.inner.children.write();
            if children.iter().any(|child| child.name() == name) {
                return Err(DiError::DuplicateScopeName {
                    name,
                    parent: self.inner.name.clone(),
                });
            }
            let child = Scope::new(name, Some(self), shared.clone());
            children.push(child.clone());
            child
        };

        shared
            .observers()
            .scope_created(child.id(), child.name(), Some(self.id()));
        tracing::debug!(scope = %child.name(), id = %child.id(), parent = %self.name(), "scope created");
        Ok(child)
    }

    /// Registers a service in this scope.
    ///
    /// Fails with [`DiError::DuplicateService`] if this scope already declares
    /// the name. Ancestors may declare it too; this one then shadows theirs.
    #[track_caller]
    pub fn provide<T: Send + Sync + 'static>(&self, provider: Provider<T>) -> DiResult<()> {
        let service = provider.into_service(Location::caller(), self.history());
        self.register(service, false)
    }

    /// Registers a service, replacing any service of the same name in this scope.
    #[track_caller]
    pub fn override_provider<T: Send + Sync + 'static>(&self, provider: Provider<T>) -> DiResult<()> {
        let service = provider.into_service(Location::caller(), self.history());
        self.register(service, true)
    }

    /// Registers `alias` as another name for `target`.
    ///
    /// The target is looked up from this scope each time the alias is
    /// resolved, and must already be visible from here. An alias named like
    /// its target re-exports the ancestors' service of that name.
    #[track_caller]
    pub fn provide_alias(&self, alias: impl Into<String>, target: impl Into<String>) -> DiResult<()> {
        let alias = alias.into();
        let target = target.into();
        let visible = self
            .alias_origin(&alias, &target)
            .map_or(false, |origin| origin.has_service_rec(&target));
        if !visible {
            return Err(self.not_found(&target));
        }
        let service = Service::alias(alias, target, Location::caller(), self.history());
        self.register(service, false)
    }

    /// Scope an alias starts looking up its target from.
    pub(crate) fn alias_origin(&self, alias: &str, target: &str) -> Option<Scope> {
        if alias == target {
            self.parent()
        } else {
            Some(self.clone())
        }
    }

    fn history(&self) -> usize {
        self.shared().opts().invocation_history()
    }

    fn register(&self, service: Service, replace: bool) -> DiResult<()> {
        let shared = self.shared();
        let name = service.name().to_string();
        let lifetime = service.lifetime();
        shared.observers().before_registration(self.name(), &name);

        let result = shared.ensure_running().and_then(|()| {
            let mut registry = self.inner.registry.write();
            if !replace && registry.contains(&name) {
                return Err(DiError::DuplicateService {
                    service: name.clone(),
                    scope: self.inner.name.clone(),
                });
            }
            registry.insert(Arc::new(service));
            Ok(())
        });

        match &result {
            Ok(()) => {
                shared.dag().add_vertex(&self.node(&name));
                tracing::debug!(scope = %self.name(), service = %name, %lifetime, "service provided");
            }
            Err(err) => tracing::debug!(scope = %self.name(), service = %name, error = %err, "service not provided"),
        }
        shared
            .observers()
            .after_registration(self.name(), &name, lifetime, result.as_ref().err());
        result
    }

    /// True if this scope itself declares `name`.
    pub fn has_service(&self, name: &str) -> bool {
        self.inner.registry.read().contains(name)
    }

    /// True if this scope or one of its ancestors declares `name`.
    pub fn has_service_rec(&self, name: &str) -> bool {
        self.lookup_rec(name).is_some()
    }

    /// Services declared in this scope, in registration order.
    pub fn list_provided_services(&self) -> Vec<ServiceDescriptor> {
        self.inner
            .registry
            .read()
            .iter()
            .map(|service| service.descriptor(self.id(), self.name()))
            .collect()
    }

    /// Services of this scope resolved at least once, in first-invocation order.
    pub fn list_invoked_services(&self) -> Vec<ServiceDescriptor> {
        let invoked = self.inner.invoked.lock().clone();
        let registry = self.inner.registry.read();
        invoked
            .iter()
            .filter_map(|name| registry.get(name))
            .map(|service| service.descriptor(self.id(), self.name()))
            .collect()
    }

    /// Graph edges with at least one end in this scope, as `(invoker, invoked)`.
    pub fn invocation_edges(&self) -> Vec<(ServiceNode, ServiceNode)> {
        self.shared()
            .dag()
            .edges()
            .into_iter()
            .filter(|(from, to)| from.scope_id == self.inner.id || to.scope_id == self.inner.id)
            .collect()
    }

    /// Probes every health checker of this scope and its descendants.
    ///
    /// Eager services are always probed, lazy ones only once materialized.
    /// Probes run concurrently, on the health-check pool when one is
    /// configured, each bounded by the configured timeout and by `ctx`.
    pub async fn health_check(&self, ctx: &Context) -> LifecycleReport {
        let shared = self.shared();
        let mut report = LifecycleReport::new();
        if shared.is_terminated() {
            return report;
        }

        let mut pending = Vec::new();
        for (scope, service) in self.collect_services() {
            if let Some((hook, instance)) = service.health_probe() {
                let node = scope.node(service.name());
                let reply = shared.queue(HookKind::HealthCheck, &node.name, hook, instance, ctx);
                pending.push((node, reply));
            }
        }

        tracing::trace!(scope = %self.name(), probes = pending.len(), "health check dispatched");
        for (node, reply) in pending {
            let result = receive(reply).await;
            if let Err(err) = &result {
                tracing::warn!(service = %node, error = %err, "health check failed");
            }
            record(&mut report, node.name, result);
        }
        report
    }

    pub(crate) fn resolve_from(
        &self,
        name: &str,
        invoker: Option<&ServiceNode>,
        site: &'static Location<'static>,
    ) -> DiResult<Instance> {
        let shared = self.shared();
        shared.ensure_running()?;

        let observers = shared.observers();
        observers.before_invocation(self.name(), name);
        let started = Instant::now();

        let Some((owner, service)) = self.lookup_rec(name) else {
            let err = self.not_found(name);
            observers.after_invocation(&self.node(name), started.elapsed(), Some(&err));
            return Err(err);
        };

        let node = owner.node(name);
        // Recorded before building so that cycles fail instead of deadlocking.
        let result = match invoker {
            Some(invoker) => shared.dag().add_edge(invoker, &node),
            None => Ok(()),
        }
        .and_then(|()| service.instance(&owner, &node, site));

        match &result {
            Ok(_) => {
                owner.mark_invoked(name);
                tracing::trace!(service = %node, from = %self.name(), "service invoked");
            }
            Err(err) => tracing::debug!(service = %node, error = %err, "service invocation failed"),
        }
        observers.after_invocation(&node, started.elapsed(), result.as_ref().err());
        result
    }

    fn mark_invoked(&self, name: &str) {
        let mut invoked = self.inner.invoked.lock();
        if !invoked.iter().any(|n| n == name) {
            invoked.push(name.to_string());
        }
    }

    fn lookup_rec(&self, name: &str) -> Option<(Scope, Arc<Service>)> {
        let mut current = Some(self.clone());
        while let Some(scope) = current {
            let found = scope.inner.registry.read().get(name).cloned();
            if let Some(service) = found {
                return Some((scope, service));
            }
            current = scope.parent();
        }
        None
    }

    pub(crate) fn not_found(&self, name: &str) -> DiError {
        let mut available: Vec<String> = Vec::new();
        let mut current = Some(self.clone());
        while let Some(scope) = current {
            for service in scope.inner.registry.read().names() {
                if !available.iter().any(|n| n == service) {
                    available.push(service.to_string());
                }
            }
            current = scope.parent();
        }
        DiError::ServiceNotFound {
            service: name.to_string(),
            scope: self.inner.name.clone(),
            available,
        }
    }

    /// Every service of this subtree, depth-first, registration order within a scope.
    pub(crate) fn collect_services(&self) -> Vec<(Scope, Arc<Service>)> {
        let mut services = Vec::new();
        self.collect_into(&mut services);
        services
    }

    fn collect_into(&self, services: &mut Vec<(Scope, Arc<Service>)>) {
        services.extend(
            self.inner
                .registry
                .read()
                .iter()
                .map(|service| (self.clone(), service.clone())),
        );
        for child in self.children() {
            child.collect_into(services);
        }
    }

    /// Deep copy of this subtree bound to `shared`, with fresh services.
    pub(crate) fn clone_into(&self, parent: Option<&Scope>, shared: &Arc<RootShared>) -> Scope {
        let clone = Scope::new(self.inner.name.clone(), parent, shared.clone());
        let history = shared.opts().invocation_history();
        {
            let registry = self.inner.registry.read();
            let mut target = clone.inner.registry.write();
            for service in registry.iter() {
                shared.dag().add_vertex(&clone.node(service.name()));
                target.insert(Arc::new(service.clone_fresh(history)));
            }
        }
        let children: Vec<Scope> = self
            .children()
            .iter()
            .map(|child| child.clone_into(Some(&clone), shared))
            .collect();
        *clone.inner.children.write() = children;
        clone
    }

    pub(crate) fn export_scopes(&self, scopes: &mut Vec<ScopeNode>) {
        scopes.push(ScopeNode {
            id: self.inner.id.clone(),
            name: self.inner.name.clone(),
            parent_id: self.parent().map(|p| p.inner.id.clone()),
            services: self.list_provided_services(),
        });
        for child in self.children() {
            child.export_scopes(scopes);
        }
    }

    pub(crate) fn service_count(&self) -> usize {
        self.inner.registry.read().len()
    }
}

impl ResolverCore for Scope {
    fn resolve_at(&self, name: &str, site: &'static Location<'static>) -> DiResult<Instance> {
        self.resolve_from(name, None, site)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("services", &self.service_count())
            .field("children", &self.inner.children.read().len())
            .finish()
    }
}
