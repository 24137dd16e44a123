//! Health-check and shutdown capabilities a service instance may implement.
//!
//! Capabilities are opted into at registration time on the
//! [`Provider`](crate::Provider) builder, so the orchestrator never has to
//! interrogate instance types at call time.

use crate::cancellation::Context;
use crate::error::BoxError;

/// Health probe honoring the caller's deadline and cancellation.
///
/// # Examples
///
/// ```
/// use ferrous_injector::{BoxError, Context, HealthCheckerWithContext};
/// use async_trait::async_trait;
///
/// struct Database;
///
/// #[async_trait]
/// impl HealthCheckerWithContext for Database {
///     async fn health_check(&self, _ctx: &Context) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait HealthCheckerWithContext: Send + Sync + 'static {
    /// Reports whether the service is healthy.
    async fn health_check(&self, ctx: &Context) -> Result<(), BoxError>;
}

/// Synchronous health probe.
///
/// Runs on Tokio's blocking pool, so it may block its thread without holding
/// up the deadline of the call.
pub trait HealthChecker: Send + Sync + 'static {
    /// Reports whether the service is healthy.
    fn health_check(&self) -> Result<(), BoxError>;
}

/// Fallible shutdown honoring the caller's deadline and cancellation.
///
/// # Examples
///
/// ```
/// use ferrous_injector::{BoxError, Context, ShutdownerWithContextAndError};
/// use async_trait::async_trait;
///
/// struct Pool;
///
/// #[async_trait]
/// impl ShutdownerWithContextAndError for Pool {
///     async fn shutdown(&self, _ctx: &Context) -> Result<(), BoxError> {
///         // close connections...
///         Ok(())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait ShutdownerWithContextAndError: Send + Sync + 'static {
    /// Releases the resources held by the service.
    async fn shutdown(&self, ctx: &Context) -> Result<(), BoxError>;
}

/// Synchronous fallible shutdown.
pub trait ShutdownerWithError: Send + Sync + 'static {
    /// Releases the resources held by the service.
    fn shutdown(&self) -> Result<(), BoxError>;
}

/// Infallible shutdown honoring the caller's deadline and cancellation.
#[async_trait::async_trait]
pub trait ShutdownerWithContext: Send + Sync + 'static {
    /// Releases the resources held by the service.
    async fn shutdown(&self, ctx: &Context);
}

/// Synchronous infallible shutdown.
pub trait Shutdowner: Send + Sync + 'static {
    /// Releases the resources held by the service.
    fn shutdown(&self);
}
