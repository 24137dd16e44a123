//! Diagnostic observers for injector events.
//!
//! Observers are registered through [`InjectorOpts::with_observer`](crate::InjectorOpts::with_observer)
//! and are notified synchronously from the thread or task that triggered the
//! event. Keep implementations lightweight.

use std::sync::Arc;
use std::time::Duration;

use crate::dag::ServiceNode;
use crate::error::DiError;
use crate::lifetime::Lifetime;

/// Observer trait for injector events.
///
/// Every hook has an empty default implementation, so observers only
/// override the events they care about.
///
/// # Examples
///
/// ```
/// use ferrous_injector::{DiError, DiObserver, InjectorOpts, Provider, RootScope, Resolver, ServiceNode};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct CountingObserver {
///     invocations: AtomicUsize,
/// }
///
/// impl DiObserver for CountingObserver {
///     fn after_invocation(&self, _service: &ServiceNode, _duration: Duration, _error: Option<&DiError>) {
///         self.invocations.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let observer = Arc::new(CountingObserver::default());
/// let root = RootScope::with_opts(InjectorOpts::new().with_observer(observer.clone()));
/// root.provide(Provider::value("answer", 42u32)).unwrap();
///
/// root.invoke::<u32>("answer").unwrap();
/// root.invoke::<u32>("answer").unwrap();
/// assert_eq!(observer.invocations.load(Ordering::SeqCst), 2);
/// ```
pub trait DiObserver: Send + Sync {
    /// A scope was added to the tree.
    fn scope_created(&self, _scope_id: &str, _scope_name: &str, _parent: Option<&str>) {}

    /// A service is about to be registered.
    fn before_registration(&self, _scope_name: &str, _service: &str) {}

    /// A service was registered, or registration failed.
    fn after_registration(
        &self,
        _scope_name: &str,
        _service: &str,
        _lifetime: Lifetime,
        _error: Option<&DiError>,
    ) {
    }

    /// A service is about to be resolved.
    fn before_invocation(&self, _scope_name: &str, _service: &str) {}

    /// A resolution finished. `service` is the vertex that was resolved.
    fn after_invocation(&self, _service: &ServiceNode, _duration: Duration, _error: Option<&DiError>) {}

    /// A service is about to be shut down.
    fn before_shutdown(&self, _service: &ServiceNode) {}

    /// A service shutdown finished.
    fn after_shutdown(&self, _service: &ServiceNode, _error: Option<&DiError>) {}
}

/// Observers registered on an injector.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new(observers: Vec<Arc<dyn DiObserver>>) -> Self {
        Self { observers }
    }

    pub(crate) fn scope_created(&self, scope_id: &str, scope_name: &str, parent: Option<&str>) {
        for observer in &self.observers {
            observer.scope_created(scope_id, scope_name, parent);
        }
    }

    pub(crate) fn before_registration(&self, scope_name: &str, service: &str) {
        for observer in &self.observers {
            observer.before_registration(scope_name, service);
        }
    }

    pub(crate) fn after_registration(
        &self,
        scope_name: &str,
        service: &str,
        lifetime: Lifetime,
        error: Option<&DiError>,
    ) {
        for observer in &self.observers {
            observer.after_registration(scope_name, service, lifetime, error);
        }
    }

    #[inline]
    pub(crate) fn before_invocation(&self, scope_name: &str, service: &str) {
        for observer in &self.observers {
            observer.before_invocation(scope_name, service);
        }
    }

    #[inline]
    pub(crate) fn after_invocation(&self, service: &ServiceNode, duration: Duration, error: Option<&DiError>) {
        for observer in &self.observers {
            observer.after_invocation(service, duration, error);
        }
    }

    pub(crate) fn before_shutdown(&self, service: &ServiceNode) {
        for observer in &self.observers {
            observer.before_shutdown(service);
        }
    }

    pub(crate) fn after_shutdown(&self, service: &ServiceNode, error: Option<&DiError>) {
        for observer in &self.observers {
            observer.after_shutdown(service, error);
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.observers.len())
            .finish()
    }
}

/// Built-in observer that logs events to stdout.
///
/// Useful during development. For production, prefer [`TracingObserver`]
/// or a custom observer wired into your own telemetry.
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a new logging observer with default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "[ferrous-injector]".to_string(),
        }
    }

    /// Creates a new logging observer with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for LoggingObserver {
    fn scope_created(&self, scope_id: &str, scope_name: &str, parent: Option<&str>) {
        match parent {
            Some(parent) => println!("{} Scope created: {} ({}) under {}", self.prefix, scope_name, scope_id, parent),
            None => println!("{} Scope created: {} ({})", self.prefix, scope_name, scope_id),
        }
    }

    fn after_registration(&self, scope_name: &str, service: &str, lifetime: Lifetime, error: Option<&DiError>) {
        match error {
            None => println!("{} Provided: {}/{} ({})", self.prefix, scope_name, service, lifetime),
            Some(err) => eprintln!("{} Provide FAILED {}/{}: {}", self.prefix, scope_name, service, err),
        }
    }

    fn after_invocation(&self, service: &ServiceNode, duration: Duration, error: Option<&DiError>) {
        match error {
            None => println!("{} Invoked: {} in {:?}", self.prefix, service, duration),
            Some(err) => eprintln!("{} Invoke FAILED {}: {}", self.prefix, service, err),
        }
    }

    fn after_shutdown(&self, service: &ServiceNode, error: Option<&DiError>) {
        match error {
            None => println!("{} Shut down: {}", self.prefix, service),
            Some(err) => eprintln!("{} Shutdown FAILED {}: {}", self.prefix, service, err),
        }
    }
}

/// Observer forwarding every event to `tracing` at debug level, failures at warn.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DiObserver for TracingObserver {
    fn scope_created(&self, scope_id: &str, scope_name: &str, parent: Option<&str>) {
        tracing::debug!(scope_id, scope = scope_name, parent, "scope created");
    }

    fn after_registration(&self, scope_name: &str, service: &str, lifetime: Lifetime, error: Option<&DiError>) {
        match error {
            None => tracing::debug!(scope = scope_name, service, %lifetime, "service provided"),
            Some(err) => tracing::warn!(scope = scope_name, service, error = %err, "service registration failed"),
        }
    }

    fn before_invocation(&self, scope_name: &str, service: &str) {
        tracing::trace!(scope = scope_name, service, "invoking service");
    }

    fn after_invocation(&self, service: &ServiceNode, duration: Duration, error: Option<&DiError>) {
        match error {
            None => tracing::debug!(service = %service, ?duration, "service invoked"),
            Some(err) => tracing::warn!(service = %service, ?duration, error = %err, "service invocation failed"),
        }
    }

    fn before_shutdown(&self, service: &ServiceNode) {
        tracing::trace!(service = %service, "shutting down service");
    }

    fn after_shutdown(&self, service: &ServiceNode, error: Option<&DiError>) {
        match error {
            None => tracing::debug!(service = %service, "service shut down"),
            Some(err) => tracing::warn!(service = %service, error = %err, "service shutdown failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        events: AtomicUsize,
    }

    impl DiObserver for Counter {
        fn before_invocation(&self, _scope_name: &str, _service: &str) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }

        fn after_shutdown(&self, _service: &ServiceNode, _error: Option<&DiError>) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_events_reach_every_observer() {
        let counter = Arc::new(Counter::default());
        let observers = Observers::new(vec![
            Arc::new(LoggingObserver::with_prefix("[test]")),
            Arc::new(TracingObserver),
            counter.clone(),
        ]);
        let node = ServiceNode::new("id", "[root]", "db");

        observers.scope_created("id", "[root]", None);
        observers.after_registration("[root]", "db", Lifetime::Lazy, None);
        observers.before_invocation("[root]", "db");
        observers.after_invocation(&node, Duration::from_micros(5), Some(&DiError::PoolStopped));
        observers.after_shutdown(&node, None);

        assert_eq!(counter.events.load(Ordering::SeqCst), 2);
    }
}
