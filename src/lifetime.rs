//! Service lifetime definitions.

/// Lifecycle strategy of a registered service.
///
/// The lifetime is fixed when the provider is registered and survives
/// cloning unchanged.
///
/// # Examples
///
/// ```rust
/// use ferrous_injector::{Lifetime, Provider, RootScope, Resolver};
///
/// let root = RootScope::new();
/// root.provide(Provider::value("port", 8080u16)).unwrap();
/// root.provide(Provider::lazy("url", |r| {
///     let port = r.invoke::<u16>("port")?;
///     Ok(format!("http://localhost:{}", port))
/// })).unwrap();
///
/// let services = root.list_provided_services();
/// assert_eq!(services[0].lifetime, Lifetime::Eager);
/// assert_eq!(services[1].lifetime, Lifetime::Lazy);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "graph-export", derive(serde::Serialize, serde::Deserialize))]
pub enum Lifetime {
    /// Instance supplied at registration time
    ///
    /// The value already exists when it is provided; resolution only hands
    /// out a shared reference to it.
    Eager,
    /// Instance built on first resolution, then cached
    ///
    /// Concurrent first resolutions wait on a per-service lock so the
    /// provider runs exactly once.
    Lazy,
    /// New instance per resolution, never cached
    Transient,
    /// Forwards resolution to another service by name
    Alias,
}

impl Lifetime {
    /// Short lowercase label used in logs and exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Eager => "eager",
            Lifetime::Lazy => "lazy",
            Lifetime::Transient => "transient",
            Lifetime::Alias => "alias",
        }
    }
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
