//! Resolver traits for service resolution.

use std::panic::Location;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::registration::Instance;

/// Core resolver trait for object-safe service resolution.
///
/// Implemented by [`Scope`](crate::Scope), [`RootScope`](crate::RootScope)
/// and the [`ResolverContext`](crate::ResolverContext) handed to providers.
/// Most users should use the [`Resolver`] trait instead, which provides the
/// typed methods built on top of this one.
pub trait ResolverCore: Send + Sync {
    /// Resolves the service `name`, recording `site` as the invocation location.
    ///
    /// Lookup starts in the resolver's own scope and walks up the ancestors.
    /// When called from inside a provider, the dependency between the service
    /// being built and `name` is recorded in the dependency graph first, so a
    /// cycle is reported before any instance is built.
    fn resolve_at(&self, name: &str, site: &'static Location<'static>) -> DiResult<Instance>;
}

/// High-level resolver interface with generic methods for type-safe service resolution.
///
/// # Examples
///
/// ```
/// use ferrous_injector::{Provider, RootScope, Resolver};
///
/// let root = RootScope::new();
/// root.provide(Provider::value("greeting", "hello".to_string())).unwrap();
///
/// let greeting = root.invoke::<String>("greeting").unwrap();
/// assert_eq!(&*greeting, "hello");
///
/// assert!(root.try_invoke::<String>("farewell").unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a service without downcasting it.
    #[track_caller]
    fn invoke_any(&self, name: &str) -> DiResult<Instance> {
        self.resolve_at(name, Location::caller())
    }

    /// Resolves a service and downcasts it to `T`.
    ///
    /// Fails with [`DiError::ServiceNotFound`] when no visible scope declares
    /// `name`, and with [`DiError::TypeMismatch`] when the instance is not a `T`.
    #[track_caller]
    fn invoke<T: Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        self.resolve_at(name, Location::caller())?.downcast::<T>(name)
    }

    /// Like [`invoke`](Self::invoke), but a missing service yields `Ok(None)`.
    #[track_caller]
    fn try_invoke<T: Send + Sync + 'static>(&self, name: &str) -> DiResult<Option<Arc<T>>> {
        match self.resolve_at(name, Location::caller()) {
            Ok(instance) => instance.downcast::<T>(name).map(Some),
            Err(DiError::ServiceNotFound { ref service, .. }) if service == name => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Resolves the service registered under the type name of `T`.
    #[track_caller]
    fn invoke_typed<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.invoke::<T>(&name_of::<T>())
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

/// Default service name for a type, used by the `*_typed` helpers.
///
/// ```
/// assert_eq!(ferrous_injector::name_of::<String>(), "alloc::string::String");
/// ```
pub fn name_of<T: ?Sized + 'static>() -> String {
    std::any::type_name::<T>().to_string()
}
