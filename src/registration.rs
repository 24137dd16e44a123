//! Service registration types.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::capabilities::{self, Capabilities, HealthCapability, ShutdownCapability};
use crate::error::{BoxError, DiError, DiResult};
use crate::injector::ResolverContext;
use crate::lifetime::Lifetime;
use crate::service::{Service, Strategy};
use crate::traits::{
    name_of, HealthChecker, HealthCheckerWithContext, Shutdowner, ShutdownerWithContext,
    ShutdownerWithContextAndError, ShutdownerWithError,
};

/// Type-erased shared instance
pub type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor =
    Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> Result<AnyArc, BoxError> + Send + Sync>;

/// A resolved instance together with the name of its concrete type.
#[derive(Clone)]
pub struct Instance {
    value: AnyArc,
    type_name: &'static str,
}

impl Instance {
    pub(crate) fn new(value: AnyArc, type_name: &'static str) -> Self {
        Self { value, type_name }
    }

    /// Name of the concrete type the provider produced.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn into_any(self) -> AnyArc {
        self.value
    }

    /// Downcasts the instance, reporting `service` in the error on mismatch.
    pub fn downcast<T: Send + Sync + 'static>(self, service: &str) -> DiResult<Arc<T>> {
        let actual = self.type_name;
        self.value.downcast::<T>().map_err(|_| DiError::TypeMismatch {
            service: service.to_string(),
            expected: type_name::<T>(),
            actual,
        })
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance").field("type_name", &self.type_name).finish()
    }
}

/// Describes a service to register: its name, strategy and lifecycle capabilities.
///
/// # Examples
///
/// ```
/// use ferrous_injector::{BoxError, Provider, RootScope, Resolver, Shutdowner};
///
/// struct Cache;
/// impl Shutdowner for Cache {
///     fn shutdown(&self) {}
/// }
///
/// let root = RootScope::new();
/// root.provide(Provider::lazy("cache", |_| Ok(Cache)).with_bare_shutdown()).unwrap();
///
/// let descriptor = &root.list_provided_services()[0];
/// assert!(descriptor.capabilities.is_shutdowner());
/// assert!(!descriptor.capabilities.is_health_checker());
/// ```
pub struct Provider<T> {
    name: String,
    lifetime: Lifetime,
    strategy: Strategy,
    caps: Capabilities,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Provider<T> {
    /// Eager service wrapping an already built value.
    pub fn value(name: impl Into<String>, value: T) -> Self {
        Self::new(name.into(), Lifetime::Eager, Strategy::Eager(Arc::new(value)))
    }

    /// Lazy service built once, on first resolution.
    pub fn lazy<F>(name: impl Into<String>, provider: F) -> Self
    where
        F: Fn(&ResolverContext<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::new(name.into(), Lifetime::Lazy, Strategy::lazy(erase(provider)))
    }

    /// Transient service built on every resolution.
    pub fn transient<F>(name: impl Into<String>, provider: F) -> Self
    where
        F: Fn(&ResolverContext<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::new(name.into(), Lifetime::Transient, Strategy::Transient(erase(provider)))
    }

    /// [`value`](Self::value) named after the type of `T`.
    pub fn value_typed(value: T) -> Self {
        Self::value(name_of::<T>(), value)
    }

    /// [`lazy`](Self::lazy) named after the type of `T`.
    pub fn lazy_typed<F>(provider: F) -> Self
    where
        F: Fn(&ResolverContext<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::lazy(name_of::<T>(), provider)
    }

    /// [`transient`](Self::transient) named after the type of `T`.
    pub fn transient_typed<F>(provider: F) -> Self
    where
        F: Fn(&ResolverContext<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::transient(name_of::<T>(), provider)
    }

    fn new(name: String, lifetime: Lifetime, strategy: Strategy) -> Self {
        Self {
            name,
            lifetime,
            strategy,
            caps: Capabilities::default(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Probes the instance through [`HealthCheckerWithContext`].
    pub fn with_health_check(mut self) -> Self
    where
        T: HealthCheckerWithContext,
    {
        self.caps
            .declare_health(HealthCapability::WithContext, capabilities::health_with_context::<T>());
        self
    }

    /// Probes the instance through [`HealthChecker`].
    pub fn with_blocking_health_check(mut self) -> Self
    where
        T: HealthChecker,
    {
        self.caps
            .declare_health(HealthCapability::Plain, capabilities::health_plain::<T>());
        self
    }

    /// Shuts the instance down through [`ShutdownerWithContextAndError`].
    pub fn with_shutdown(mut self) -> Self
    where
        T: ShutdownerWithContextAndError,
    {
        self.caps.declare_shutdown(
            ShutdownCapability::WithContextAndError,
            capabilities::shutdown_with_context_and_error::<T>(),
        );
        self
    }

    /// Shuts the instance down through [`ShutdownerWithError`].
    pub fn with_blocking_shutdown(mut self) -> Self
    where
        T: ShutdownerWithError,
    {
        self.caps
            .declare_shutdown(ShutdownCapability::WithError, capabilities::shutdown_with_error::<T>());
        self
    }

    /// Shuts the instance down through [`ShutdownerWithContext`].
    pub fn with_infallible_shutdown(mut self) -> Self
    where
        T: ShutdownerWithContext,
    {
        self.caps.declare_shutdown(
            ShutdownCapability::WithContext,
            capabilities::shutdown_with_context::<T>(),
        );
        self
    }

    /// Shuts the instance down through [`Shutdowner`].
    pub fn with_bare_shutdown(mut self) -> Self
    where
        T: Shutdowner,
    {
        self.caps
            .declare_shutdown(ShutdownCapability::Bare, capabilities::shutdown_bare::<T>());
        self
    }

    pub(crate) fn into_service(
        self,
        provided_at: &'static std::panic::Location<'static>,
        history: usize,
    ) -> Service {
        Service::new(
            self.name,
            self.lifetime,
            type_name::<T>(),
            self.strategy,
            self.caps,
            provided_at,
            history,
        )
    }
}

fn erase<T, F>(provider: F) -> Ctor
where
    T: Send + Sync + 'static,
    F: Fn(&ResolverContext<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
{
    Arc::new(move |ctx: &ResolverContext<'_>| provider(ctx).map(|value| Arc::new(value) as AnyArc))
}

/// Services registered in one scope, kept in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    order: Vec<String>,
    services: HashMap<String, Arc<Service>>,
}

impl Registry {
    /// Inserts or replaces a service. A replaced service keeps its position.
    pub(crate) fn insert(&mut self, service: Arc<Service>) {
        let name = service.name().to_string();
        if self.services.insert(name.clone(), service).is_none() {
            self.order.push(name);
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Arc<Service>> {
        self.services.get(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<Service>> {
        self.order.iter().filter_map(move |name| self.services.get(name))
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}
