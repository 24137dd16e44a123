//! Lifecycle capabilities declared at registration.
//!
//! Each service records once, when it is registered, which health-check and
//! shutdown signatures its instance supports. The orchestrator only looks at
//! this [`CapabilitySet`] and the type-erased hooks stored next to it.

use std::any::type_name;
use std::future::Future;
use std::panic;
use std::pin::Pin;
use std::sync::Arc;

use crate::cancellation::Context;
use crate::error::BoxError;
use crate::registration::AnyArc;
use crate::traits::{
    HealthChecker, HealthCheckerWithContext, Shutdowner, ShutdownerWithContext,
    ShutdownerWithContextAndError, ShutdownerWithError,
};

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub(crate) type LifecycleHook =
    Arc<dyn Fn(AnyArc, Context) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Health-check signature supported by an instance, by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "graph-export", derive(serde::Serialize, serde::Deserialize))]
pub enum HealthCapability {
    /// [`HealthCheckerWithContext`]
    WithContext,
    /// [`HealthChecker`]
    Plain,
}

/// Shutdown signature supported by an instance, by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "graph-export", derive(serde::Serialize, serde::Deserialize))]
pub enum ShutdownCapability {
    /// [`ShutdownerWithContextAndError`]
    WithContextAndError,
    /// [`ShutdownerWithContext`]
    WithContext,
    /// [`ShutdownerWithError`]
    WithError,
    /// [`Shutdowner`]
    Bare,
}

/// Capabilities of a registered service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(serde::Serialize, serde::Deserialize))]
pub struct CapabilitySet {
    pub health: Option<HealthCapability>,
    pub shutdown: Option<ShutdownCapability>,
}

impl CapabilitySet {
    pub fn is_health_checker(&self) -> bool {
        self.health.is_some()
    }

    pub fn is_shutdowner(&self) -> bool {
        self.shutdown.is_some()
    }
}

/// Declared capabilities together with their type-erased hooks.
#[derive(Clone, Default)]
pub(crate) struct Capabilities {
    health: Option<(HealthCapability, LifecycleHook)>,
    shutdown: Option<(ShutdownCapability, LifecycleHook)>,
}

impl Capabilities {
    /// Keeps the declaration with the highest precedence.
    pub(crate) fn declare_health(&mut self, kind: HealthCapability, hook: LifecycleHook) {
        if self.health.as_ref().map_or(true, |(current, _)| kind < *current) {
            self.health = Some((kind, hook));
        }
    }

    /// Keeps the declaration with the highest precedence.
    pub(crate) fn declare_shutdown(&mut self, kind: ShutdownCapability, hook: LifecycleHook) {
        if self.shutdown.as_ref().map_or(true, |(current, _)| kind < *current) {
            self.shutdown = Some((kind, hook));
        }
    }

    pub(crate) fn set(&self) -> CapabilitySet {
        CapabilitySet {
            health: self.health.as_ref().map(|(kind, _)| *kind),
            shutdown: self.shutdown.as_ref().map(|(kind, _)| *kind),
        }
    }

    pub(crate) fn health_hook(&self) -> Option<&LifecycleHook> {
        self.health.as_ref().map(|(_, hook)| hook)
    }

    pub(crate) fn shutdown_hook(&self) -> Option<&LifecycleHook> {
        self.shutdown.as_ref().map(|(_, hook)| hook)
    }
}

fn hook<F, Fut>(f: F) -> LifecycleHook
where
    F: Fn(AnyArc, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(
        move |instance: AnyArc, ctx: Context| -> BoxFuture<'static, Result<(), BoxError>> {
            Box::pin(f(instance, ctx))
        },
    )
}

/// Runs a synchronous hook on the blocking pool so the caller's deadline can still fire.
///
/// A panic inside `f` is resumed on the calling task.
async fn blocking<F>(f: F) -> Result<(), BoxError>
where
    F: FnOnce() -> Result<(), BoxError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
        Err(err) => Err(err.into()),
    }
}

fn downcast<T: Send + Sync + 'static>(instance: AnyArc) -> Result<Arc<T>, BoxError> {
    instance
        .downcast::<T>()
        .map_err(|_| format!("instance is not a `{}`", type_name::<T>()).into())
}

pub(crate) fn health_with_context<T: HealthCheckerWithContext>() -> LifecycleHook {
    hook(|instance, ctx| async move {
        let service = downcast::<T>(instance)?;
        <T as HealthCheckerWithContext>::health_check(&service, &ctx).await
    })
}

pub(crate) fn health_plain<T: HealthChecker>() -> LifecycleHook {
    hook(|instance, _ctx| async move {
        let service = downcast::<T>(instance)?;
        blocking(move || <T as HealthChecker>::health_check(&service)).await
    })
}

pub(crate) fn shutdown_with_context_and_error<T: ShutdownerWithContextAndError>() -> LifecycleHook {
    hook(|instance, ctx| async move {
        let service = downcast::<T>(instance)?;
        <T as ShutdownerWithContextAndError>::shutdown(&service, &ctx).await
    })
}

pub(crate) fn shutdown_with_error<T: ShutdownerWithError>() -> LifecycleHook {
    hook(|instance, _ctx| async move {
        let service = downcast::<T>(instance)?;
        blocking(move || <T as ShutdownerWithError>::shutdown(&service)).await
    })
}

pub(crate) fn shutdown_with_context<T: ShutdownerWithContext>() -> LifecycleHook {
    hook(|instance, ctx| async move {
        let service = downcast::<T>(instance)?;
        <T as ShutdownerWithContext>::shutdown(&service, &ctx).await;
        Ok(())
    })
}

pub(crate) fn shutdown_bare<T: Shutdowner>() -> LifecycleHook {
    hook(|instance, _ctx| async move {
        let service = downcast::<T>(instance)?;
        blocking(move || {
            <T as Shutdowner>::shutdown(&service);
            Ok(())
        })
        .await
    })
}
