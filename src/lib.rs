//! # ferrous-injector
//!
//! Hierarchical dependency injection with lifecycle orchestration.
//!
//! ## Features
//!
//! - **Scope tree**: named scopes resolving their own services, then their ancestors'
//! - **Four lifetimes**: eager values, lazy singletons, transients and aliases
//! - **Dependency graph**: every resolution made by a provider is recorded, cycles are rejected with the full path
//! - **Health checks**: concurrent probes, optionally bounded by a worker pool, with per-call timeout
//! - **Graceful shutdown**: dependents first, layer by layer, each service at most once
//! - **Cloning**: independent copies of a whole injector, without resolved instances
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_injector::{Provider, RootScope, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let root = RootScope::new();
//! root.provide(Provider::value("db", Database {
//!     connection_string: "postgres://localhost".to_string(),
//! })).unwrap();
//! root.provide(Provider::lazy("users", |r| {
//!     Ok(UserService { db: r.invoke("db")? })
//! })).unwrap();
//!
//! let users = root.invoke::<UserService>("users").unwrap();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Lifecycle
//!
//! Health-check and shutdown capabilities are declared when the service is
//! registered, and the root fans calls out over the whole tree:
//!
//! ```rust
//! use ferrous_injector::{BoxError, Context, HealthChecker, Provider, RootScope};
//!
//! struct Cache;
//!
//! impl HealthChecker for Cache {
//!     fn health_check(&self) -> Result<(), BoxError> {
//!         Err("cache is cold".into())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let root = RootScope::new();
//! root.provide(Provider::value("cache", Cache).with_blocking_health_check()).unwrap();
//!
//! let report = root.health_check(&Context::background()).await;
//! assert!(report["cache"].is_err());
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `graph-export`: JSON export of [`InjectorGraph`] through `serde`
//! - `diagnostics`: [`RootScope::to_debug_string`]

pub mod cancellation;
pub mod capabilities;
pub mod config;
pub mod dag;
pub mod descriptors;
pub mod error;
pub mod graph_export;
pub mod injector;
pub mod lifetime;
pub mod observer;
pub mod traits;

mod internal;
mod registration;
mod service;

pub use cancellation::{CancellationToken, Context, ContextError};
pub use capabilities::{CapabilitySet, HealthCapability, ShutdownCapability};
pub use config::{ConfigSource, ConfigValue, EnvironmentConfigSource, InjectorOpts, LogHook, MapConfigSource};
pub use dag::{Dag, ServiceNode};
pub use descriptors::ServiceDescriptor;
pub use error::{BoxError, DiError, DiResult, SharedError};
pub use graph_export::{GraphEdge, InjectorGraph, ScopeNode};
pub use injector::{LifecycleReport, ResolverContext, RootScope, Scope, DEFAULT_ROOT_SCOPE_NAME};
pub use internal::job_pool::JobPool;
pub use lifetime::Lifetime;
pub use observer::{DiObserver, LoggingObserver, TracingObserver};
pub use registration::{AnyArc, Instance, Provider};
pub use traits::{
    name_of, HealthChecker, HealthCheckerWithContext, Resolver, ResolverCore, Shutdowner,
    ShutdownerWithContext, ShutdownerWithContextAndError, ShutdownerWithError,
};

#[cfg(unix)]
pub use injector::SignalKind;
