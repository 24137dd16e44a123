//! Injector options and the configuration sources they can be loaded from.
//!
//! Options are usually built in code with [`InjectorOpts`]'s builder methods.
//! Deployments can also tune the orchestration knobs from the environment:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `DI_HEALTHCHECK_PARALLELISM` | worker pool size for health checks, `0` = unbounded |
//! | `DI_HEALTHCHECK_TIMEOUT_MS` | per-probe timeout, `0` = none |
//! | `DI_INVOCATION_HISTORY` | invocation sites kept per service, `0` = disabled |

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{DiError, DiResult};
use crate::observer::DiObserver;

/// Diagnostic sink receiving human-readable injector messages.
pub type LogHook = Arc<dyn Fn(&str) + Send + Sync>;

const DEFAULT_INVOCATION_HISTORY: usize = 32;

/// A configuration value read from a [`ConfigSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl ConfigValue {
    /// Parses a raw string the way environment variables are interpreted.
    pub fn parse(raw: &str) -> Self {
        if let Ok(int_val) = raw.parse::<i64>() {
            ConfigValue::Integer(int_val)
        } else if let Ok(bool_val) = raw.parse::<bool>() {
            ConfigValue::Boolean(bool_val)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    /// Non-negative integer value, or a [`DiError::Config`] naming `key`.
    pub fn as_usize(&self, key: &str) -> DiResult<usize> {
        match self {
            ConfigValue::Integer(i) if *i >= 0 => Ok(*i as usize),
            other => Err(DiError::Config {
                key: key.to_string(),
                value: other.to_string(),
            }),
        }
    }

    /// Duration from a non-negative number of milliseconds.
    pub fn as_duration_ms(&self, key: &str) -> DiResult<Duration> {
        self.as_usize(key).map(|ms| Duration::from_millis(ms as u64))
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync + fmt::Debug {
    /// Get a configuration value by key
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// List all available keys
    fn keys(&self) -> Vec<String>;
}

/// Environment variable configuration source
///
/// Keys are looked up upper-cased, joined to the prefix with `_`.
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn env_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.env_key(key))
            .ok()
            .map(|value| ConfigValue::parse(value.trim()))
    }

    fn keys(&self) -> Vec<String> {
        let prefix = self.prefix.as_ref().map(|p| format!("{}_", p.to_uppercase()));
        env::vars()
            .filter_map(|(key, _)| match &prefix {
                Some(prefix) => key.strip_prefix(prefix.as_str()).map(str::to_lowercase),
                None => Some(key.to_lowercase()),
            })
            .collect()
    }
}

/// In-memory configuration source.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, ConfigValue>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Process-wide options of an injector tree.
///
/// # Examples
///
/// ```
/// use ferrous_injector::{InjectorOpts, RootScope};
/// use std::time::Duration;
///
/// let opts = InjectorOpts::new()
///     .with_health_check_parallelism(4)
///     .with_health_check_timeout(Duration::from_secs(2))
///     .with_logf(|message| eprintln!("[di] {}", message));
///
/// let root = RootScope::with_opts(opts);
/// assert_eq!(root.opts().health_check_parallelism(), 4);
/// ```
#[derive(Clone)]
pub struct InjectorOpts {
    logf: Option<LogHook>,
    observers: Vec<Arc<dyn DiObserver>>,
    health_check_parallelism: usize,
    health_check_timeout: Duration,
    invocation_history: usize,
}

impl InjectorOpts {
    pub fn new() -> Self {
        Self {
            logf: None,
            observers: Vec::new(),
            health_check_parallelism: 0,
            health_check_timeout: Duration::ZERO,
            invocation_history: DEFAULT_INVOCATION_HISTORY,
        }
    }

    /// Options read from `DI_*` environment variables on top of the defaults.
    pub fn from_env() -> DiResult<Self> {
        Self::from_source(&EnvironmentConfigSource::with_prefix("DI"))
    }

    /// Options read from `source` on top of the defaults.
    pub fn from_source(source: &dyn ConfigSource) -> DiResult<Self> {
        Self::new().merge_source(source)
    }

    /// Overrides the orchestration knobs present in `source`.
    pub fn merge_source(mut self, source: &dyn ConfigSource) -> DiResult<Self> {
        if let Some(value) = source.get("healthcheck_parallelism") {
            self.health_check_parallelism = value.as_usize("healthcheck_parallelism")?;
        }
        if let Some(value) = source.get("healthcheck_timeout_ms") {
            self.health_check_timeout = value.as_duration_ms("healthcheck_timeout_ms")?;
        }
        if let Some(value) = source.get("invocation_history") {
            self.invocation_history = value.as_usize("invocation_history")?;
        }
        Ok(self)
    }

    pub fn with_logf<F>(mut self, logf: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.logf = Some(Arc::new(logf));
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DiObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Size of the health-check worker pool; `0` spawns one task per probe.
    pub fn with_health_check_parallelism(mut self, parallelism: usize) -> Self {
        self.health_check_parallelism = parallelism;
        self
    }

    /// Timeout applied to each probe and shutdown call; zero disables it.
    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }

    /// Number of invocation sites remembered per service; `0` disables tracking.
    pub fn with_invocation_history(mut self, history: usize) -> Self {
        self.invocation_history = history;
        self
    }

    pub fn logf(&self) -> Option<&LogHook> {
        self.logf.as_ref()
    }

    pub fn observers(&self) -> &[Arc<dyn DiObserver>] {
        &self.observers
    }

    pub fn health_check_parallelism(&self) -> usize {
        self.health_check_parallelism
    }

    pub fn health_check_timeout(&self) -> Duration {
        self.health_check_timeout
    }

    pub fn invocation_history(&self) -> usize {
        self.invocation_history
    }
}

impl Default for InjectorOpts {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InjectorOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectorOpts")
            .field("logf", &self.logf.is_some())
            .field("observers", &self.observers.len())
            .field("health_check_parallelism", &self.health_check_parallelism)
            .field("health_check_timeout", &self.health_check_timeout)
            .field("invocation_history", &self.invocation_history)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_value_parse() {
        assert_eq!(ConfigValue::parse("42"), ConfigValue::Integer(42));
        assert_eq!(ConfigValue::parse("true"), ConfigValue::Boolean(true));
        assert_eq!(ConfigValue::parse("fast"), ConfigValue::String("fast".to_string()));
    }

    #[test]
    fn test_map_source_overrides_defaults() {
        let source = MapConfigSource::new()
            .with("healthcheck_parallelism", ConfigValue::Integer(8))
            .with("healthcheck_timeout_ms", ConfigValue::Integer(250));

        let opts = InjectorOpts::from_source(&source).unwrap();
        assert_eq!(opts.health_check_parallelism(), 8);
        assert_eq!(opts.health_check_timeout(), Duration::from_millis(250));
        assert_eq!(opts.invocation_history(), DEFAULT_INVOCATION_HISTORY);
    }

    #[test]
    fn test_negative_value_rejected() {
        let source = MapConfigSource::new().with("invocation_history", ConfigValue::Integer(-1));
        match InjectorOpts::from_source(&source) {
            Err(DiError::Config { key, value }) => {
                assert_eq!(key, "invocation_history");
                assert_eq!(value, "-1");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_merge_keeps_builder_values() {
        let opts = InjectorOpts::new()
            .with_health_check_parallelism(3)
            .merge_source(&MapConfigSource::new())
            .unwrap();
        assert_eq!(opts.health_check_parallelism(), 3);
    }
}
