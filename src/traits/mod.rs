//! Core traits for the dependency injection container.

mod lifecycle;
mod resolver;

pub use lifecycle::{
    HealthChecker, HealthCheckerWithContext, Shutdowner, ShutdownerWithContext,
    ShutdownerWithContextAndError, ShutdownerWithError,
};
pub use resolver::{name_of, Resolver, ResolverCore};
