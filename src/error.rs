//! Error types for the dependency injection container.

use std::sync::Arc;

use crate::dag::ServiceNode;

/// Boxed error returned by providers and lifecycle hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared, cloneable form of a user error carried inside [`DiError`].
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Dependency injection errors
///
/// Structural errors (duplicates, cycles, missing services) are returned
/// synchronously by the operation that triggered them. Lifecycle errors
/// (health checks, shutdown) are collected per service into a
/// [`LifecycleReport`](crate::LifecycleReport) and never abort the whole
/// orchestration.
///
/// # Examples
///
/// ```rust
/// use ferrous_injector::{DiError, RootScope, Resolver};
///
/// let root = RootScope::new();
/// match root.invoke::<String>("missing") {
///     Err(DiError::ServiceNotFound { service, .. }) => assert_eq!(service, "missing"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
    /// A service with this name is already registered in the scope
    #[error("service `{service}` is already declared in scope `{scope}`")]
    DuplicateService { service: String, scope: String },

    /// A sibling scope with this name already exists
    #[error("scope `{name}` already exists under `{parent}`")]
    DuplicateScopeName { name: String, parent: String },

    /// No scope from the requesting one up to the root declares the service
    #[error("could not find service `{service}` from scope `{scope}`, available services: {}", format_available(.available))]
    ServiceNotFound {
        service: String,
        scope: String,
        available: Vec<String>,
    },

    /// The instance does not have the requested type
    #[error("service `{service}` is a `{actual}`, not a `{expected}`")]
    TypeMismatch {
        service: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Recording the invocation would close a dependency cycle
    #[error("circular dependency detected: {}", format_path(.0))]
    CycleDetected(Vec<ServiceNode>),

    /// The probe or shutdown did not finish before the context deadline
    #[error("deadline exceeded while calling `{service}`")]
    DeadlineExceeded { service: String },

    /// The caller cancelled the context before the call finished
    #[error("context canceled while calling `{service}`")]
    Canceled { service: String },

    /// The service reported itself unhealthy
    #[error("health check of `{service}` failed: {source}")]
    HealthCheck {
        service: String,
        #[source]
        source: SharedError,
    },

    /// The service failed to release its resources
    #[error("shutdown of `{service}` failed: {source}")]
    Shutdown {
        service: String,
        #[source]
        source: SharedError,
    },

    /// The provider function returned an error
    #[error("provider of `{service}` failed: {source}")]
    Provider {
        service: String,
        #[source]
        source: SharedError,
    },

    /// The provider function panicked
    #[error("provider of `{service}` panicked: {message}")]
    ProviderPanicked { service: String, message: String },

    /// A job submitted to a pool (or spawned directly) panicked
    #[error("job #{job} panicked: {message}")]
    JobPanicked { job: u64, message: String },

    /// The job pool no longer accepts work
    #[error("job pool is stopped")]
    PoolStopped,

    /// The injector has been shut down and is terminal
    #[error("injector `{0}` has been shut down")]
    InjectorShutDown(String),

    /// A configuration value could not be parsed
    #[error("invalid configuration value for `{key}`: `{value}`")]
    Config { key: String, value: String },

    /// Listening for OS signals failed
    #[error("signal handling failed: {0}")]
    Signal(String),
}

impl DiError {
    /// Returns true for timeouts, as opposed to a failure reported by the service itself.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, DiError::DeadlineExceeded { .. })
    }

    /// Returns the error produced by the service itself, if any.
    pub fn service_error(&self) -> Option<&SharedError> {
        match self {
            DiError::HealthCheck { source, .. }
            | DiError::Shutdown { source, .. }
            | DiError::Provider { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available
            .iter()
            .map(|name| format!("`{}`", name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn format_path(path: &[ServiceNode]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type for DI operations
///
/// # Examples
///
/// ```rust
/// use ferrous_injector::{DiResult, DiError};
///
/// fn failing_operation() -> DiResult<()> {
///     Err(DiError::PoolStopped)
/// }
///
/// assert!(failing_operation().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
