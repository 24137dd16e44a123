//! Root of the scope tree and tree-wide lifecycle orchestration.
//!
//! A [`RootScope`] owns the scope tree, the invocation [`Dag`] and the
//! optional health-check [`JobPool`]. Health checks and shutdowns fan out one
//! call per service and collect the outcome of each call into a
//! [`LifecycleReport`].

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::cancellation::{Context, ContextError};
use crate::capabilities::LifecycleHook;
use crate::config::InjectorOpts;
use crate::dag::{Dag, ServiceNode};
use crate::error::{DiError, DiResult};
use crate::graph_export::{GraphEdge, InjectorGraph};
use crate::internal::job_pool::{run_catching, JobPool};
use crate::observer::Observers;
use crate::registration::{AnyArc, Instance};
use crate::traits::ResolverCore;

mod context;
mod scope;
mod signals;

pub use context::ResolverContext;
pub use scope::Scope;
#[cfg(unix)]
pub use signals::SignalKind;

/// Name given to the root of every scope tree.
pub const DEFAULT_ROOT_SCOPE_NAME: &str = "[root]";

/// Outcome of a health check or shutdown, keyed by service name.
///
/// Only services that declared the corresponding capability appear. When
/// two scopes register the same name, a failure takes precedence over a
/// success for that key.
pub type LifecycleReport = BTreeMap<String, DiResult<()>>;

const RUNNING: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const TERMINATED: u8 = 2;

/// State shared by every scope of a tree. Never points back into the tree.
pub(crate) struct RootShared {
    root_name: String,
    opts: InjectorOpts,
    observers: Observers,
    dag: Dag,
    pool: Option<JobPool<()>>,
    state: AtomicU8,
    jobs: AtomicU64,
}

impl RootShared {
    fn new(opts: InjectorOpts) -> Self {
        let pool = match opts.health_check_parallelism() {
            0 => None,
            workers => {
                let pool = JobPool::new("healthcheck", workers);
                pool.start();
                Some(pool)
            }
        };
        Self {
            root_name: DEFAULT_ROOT_SCOPE_NAME.to_string(),
            observers: Observers::new(opts.observers().to_vec()),
            opts,
            dag: Dag::new(),
            pool,
            state: AtomicU8::new(RUNNING),
            jobs: AtomicU64::new(0),
        }
    }

    pub(crate) fn opts(&self) -> &InjectorOpts {
        &self.opts
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.observers
    }

    pub(crate) fn dag(&self) -> &Dag {
        &self.dag
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.state.load(Ordering::Acquire) == TERMINATED
    }

    pub(crate) fn ensure_running(&self) -> DiResult<()> {
        if self.is_terminated() {
            return Err(DiError::InjectorShutDown(self.root_name.clone()));
        }
        Ok(())
    }

    /// Lazy instances are only built while the injector is running.
    pub(crate) fn ensure_materializable(&self) -> DiResult<()> {
        if self.state.load(Ordering::Acquire) != RUNNING {
            return Err(DiError::InjectorShutDown(self.root_name.clone()));
        }
        Ok(())
    }

    pub(crate) fn log(&self, message: &str) {
        tracing::debug!(injector = %self.root_name, "{}", message);
        if let Some(logf) = self.opts.logf() {
            logf(message);
        }
    }

    /// Runs `call` on the pool if there is one, otherwise on its own task.
    fn dispatch<F>(&self, call: F) -> oneshot::Receiver<DiResult<()>>
    where
        F: Future<Output = DiResult<()>> + Send + 'static,
    {
        if let Some(pool) = &self.pool {
            return pool.rpc(call);
        }
        let (reply, receiver) = oneshot::channel();
        let id = self.jobs.fetch_add(1, Ordering::Relaxed) + 1;
        tokio::spawn(async move {
            let _ = reply.send(run_catching(id, call).await);
        });
        receiver
    }

    /// Queues one lifecycle call with the configured per-call timeout.
    pub(crate) fn queue(
        &self,
        kind: HookKind,
        service: &str,
        hook: LifecycleHook,
        instance: AnyArc,
        ctx: &Context,
    ) -> oneshot::Receiver<DiResult<()>> {
        let ctx = ctx.with_timeout(self.opts.health_check_timeout());
        self.dispatch(call_hook(kind, service.to_string(), hook, instance, ctx))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum HookKind {
    HealthCheck,
    Shutdown,
}

async fn call_hook(
    kind: HookKind,
    service: String,
    hook: LifecycleHook,
    instance: AnyArc,
    ctx: Context,
) -> DiResult<()> {
    match ctx.run(hook(instance, ctx.clone())).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(match kind {
            HookKind::HealthCheck => DiError::HealthCheck {
                service,
                source: Arc::from(err),
            },
            HookKind::Shutdown => DiError::Shutdown {
                service,
                source: Arc::from(err),
            },
        }),
        Err(ContextError::DeadlineExceeded) => Err(DiError::DeadlineExceeded { service }),
        Err(ContextError::Canceled) => Err(DiError::Canceled { service }),
    }
}

pub(crate) async fn receive(reply: oneshot::Receiver<DiResult<()>>) -> DiResult<()> {
    reply.await.unwrap_or(Err(DiError::PoolStopped))
}

/// Adds `result` under `name`, letting a failure replace a success.
pub(crate) fn record(report: &mut LifecycleReport, name: String, result: DiResult<()>) {
    match report.entry(name) {
        Entry::Vacant(entry) => {
            entry.insert(result);
        }
        Entry::Occupied(mut entry) => {
            if entry.get().is_ok() && result.is_err() {
                entry.insert(result);
            }
        }
    }
}

/// Entry point of a scope tree.
///
/// Dereferences to the root [`Scope`], so every scope operation is
/// available directly. Cloning a `RootScope` handle shares the same tree;
/// use [`clone_injector`](Self::clone_injector) for an independent copy.
///
/// # Examples
///
/// ```
/// use ferrous_injector::{BoxError, Context, Provider, RootScope, Resolver, ShutdownerWithError};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Connection {
///     closed: AtomicBool,
/// }
///
/// impl ShutdownerWithError for Connection {
///     fn shutdown(&self) -> Result<(), BoxError> {
///         self.closed.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let root = RootScope::new();
/// root.provide(
///     Provider::lazy("db", |_| Ok(Connection { closed: AtomicBool::new(false) }))
///         .with_blocking_shutdown(),
/// ).unwrap();
///
/// let db = root.invoke::<Connection>("db").unwrap();
///
/// let report = root.shutdown(&Context::background()).await;
/// assert!(report["db"].is_ok());
/// assert!(db.closed.load(Ordering::SeqCst));
/// assert!(root.invoke::<Connection>("db").is_err());
/// # }
/// ```
#[derive(Clone)]
pub struct RootScope {
    scope: Scope,
}

impl RootScope {
    /// Creates an injector with default options.
    pub fn new() -> Self {
        Self::with_opts(InjectorOpts::default())
    }

    /// Creates an injector with the given options.
    ///
    /// When `health_check_parallelism` is positive a worker pool of that size
    /// is started, lazily if no Tokio runtime is running yet.
    pub fn with_opts(opts: InjectorOpts) -> Self {
        let shared = Arc::new(RootShared::new(opts));
        let scope = Scope::new_root(DEFAULT_ROOT_SCOPE_NAME, shared.clone());
        shared
            .observers()
            .scope_created(scope.id(), scope.name(), None);
        shared.log("injector created");
        Self { scope }
    }

    pub(crate) fn from_scope(scope: Scope) -> Self {
        Self { scope }
    }

    fn shared(&self) -> &Arc<RootShared> {
        self.scope.shared()
    }

    pub fn opts(&self) -> &InjectorOpts {
        self.shared().opts()
    }

    /// Invocation graph of the whole tree.
    pub fn dag(&self) -> &Dag {
        self.shared().dag()
    }

    /// True once [`shutdown`](Self::shutdown) has completed.
    pub fn is_shut_down(&self) -> bool {
        self.shared().is_terminated()
    }

    /// Shuts every service of the tree down, dependents first.
    ///
    /// Services are grouped in layers from the invocation graph: a service is
    /// always shut down before the services it invoked. The calls of one layer
    /// run concurrently and all of them finish before the next layer starts.
    /// Each shutdown capability runs at most once and every failure is
    /// reported without stopping the others.
    ///
    /// Afterwards the pool is stopped and the injector is terminal: resolution
    /// and registration fail with [`DiError::InjectorShutDown`]. Calling this
    /// again, or while a shutdown is in progress, returns an empty report.
    pub async fn shutdown(&self, ctx: &Context) -> LifecycleReport {
        let shared = self.shared();
        if shared
            .state
            .compare_exchange(RUNNING, SHUTTING_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return LifecycleReport::new();
        }
        shared.log("injector shutting down");

        let services = self.scope.collect_services();
        let nodes: Vec<ServiceNode> = services.iter().map(|(scope, service)| scope.node(service.name())).collect();
        let by_node: HashMap<ServiceNode, _> = nodes.iter().cloned().zip(services.iter().map(|(_, s)| s.clone())).collect();

        let mut report = LifecycleReport::new();
        for layer in shared.dag().layers_of(&nodes).into_iter().rev() {
            let mut pending = Vec::new();
            for node in layer {
                let Some(service) = by_node.get(&node) else { continue };
                let Some((hook, instance)) = service.shutdown_probe() else { continue };
                shared.observers().before_shutdown(&node);
                let reply = shared.queue(HookKind::Shutdown, &node.name, hook, instance, ctx);
                pending.push((node, reply));
            }
            for (node, reply) in pending {
                let result = receive(reply).await;
                if let Err(err) = &result {
                    tracing::warn!(service = %node, error = %err, "service shutdown failed");
                }
                shared.observers().after_shutdown(&node, result.as_ref().err());
                record(&mut report, node.name, result);
            }
        }

        if let Some(pool) = &shared.pool {
            pool.stop().await;
        }
        shared.state.store(TERMINATED, Ordering::Release);
        shared.log("injector shut down");
        report
    }

    /// Independent copy of the tree with the same options.
    ///
    /// Providers and capabilities are shared, instances of lazy services are
    /// not: the copy starts with no materialized lazy instance, no invocation
    /// history and an empty graph.
    pub fn clone_injector(&self) -> RootScope {
        self.clone_injector_with_opts(self.opts().clone())
    }

    /// Same as [`clone_injector`](Self::clone_injector) with new options.
    pub fn clone_injector_with_opts(&self, opts: InjectorOpts) -> RootScope {
        let shared = Arc::new(RootShared::new(opts));
        let scope = self.scope.clone_into(None, &shared);
        shared
            .observers()
            .scope_created(scope.id(), scope.name(), None);
        self.shared().log("injector cloned");
        RootScope { scope }
    }

    /// Snapshot of scopes, services and invocation edges.
    pub fn export_graph(&self) -> InjectorGraph {
        let mut scopes = Vec::new();
        self.scope.export_scopes(&mut scopes);
        let edges = self
            .dag()
            .edges()
            .into_iter()
            .map(|(from, to)| GraphEdge { from, to })
            .collect();
        InjectorGraph { scopes, edges }
    }

    /// Indented dump of the tree and its services.
    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        use std::fmt::Write as _;

        let mut output = String::new();
        for scope in self.export_graph().scopes {
            let depth = self.depth_of(&scope.id);
            let indent = "  ".repeat(depth);
            let _ = writeln!(output, "{}{} ({})", indent, scope.name, scope.id);
            for service in scope.services {
                let _ = writeln!(
                    output,
                    "{}  - {} [{}] {}{}",
                    indent,
                    service.name,
                    service.lifetime,
                    service.type_name,
                    if service.materialized { " *" } else { "" }
                );
            }
        }
        output
    }

    #[cfg(feature = "diagnostics")]
    fn depth_of(&self, id: &str) -> usize {
        fn walk(scope: &Scope, id: &str, depth: usize) -> Option<usize> {
            if scope.id() == id {
                return Some(depth);
            }
            scope.children().iter().find_map(|child| walk(child, id, depth + 1))
        }
        walk(&self.scope, id, 0).unwrap_or(0)
    }
}

impl Default for RootScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for RootScope {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        &self.scope
    }
}

impl ResolverCore for RootScope {
    fn resolve_at(&self, name: &str, site: &'static std::panic::Location<'static>) -> DiResult<Instance> {
        self.scope.resolve_at(name, site)
    }
}

impl std::fmt::Debug for RootScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootScope")
            .field("id", &self.scope.id())
            .field("opts", self.opts())
            .field("dag", self.dag())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_failure_wins_over_success() {
        let mut report = LifecycleReport::new();
        record(&mut report, "db".to_string(), Ok(()));
        record(&mut report, "db".to_string(), Err(DiError::PoolStopped));
        record(&mut report, "db".to_string(), Ok(()));
        assert!(matches!(report["db"], Err(DiError::PoolStopped)));
    }

    #[test]
    fn test_root_created_outside_runtime() {
        let root = RootScope::with_opts(InjectorOpts::new().with_health_check_parallelism(2));
        assert_eq!(root.name(), DEFAULT_ROOT_SCOPE_NAME);
        assert!(root.parent().is_none());
        assert!(!root.is_shut_down());
    }
}
