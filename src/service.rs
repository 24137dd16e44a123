//! Lifecycle adapters behind a registered service name.
//!
//! A [`Service`] holds one of four strategies and exposes the small contract
//! the scope tree needs: materialize an instance, hand out the health and
//! shutdown hooks declared at registration, and produce a fresh copy when the
//! tree is cloned.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::capabilities::{Capabilities, LifecycleHook};
use crate::dag::ServiceNode;
use crate::descriptors::ServiceDescriptor;
use crate::error::{BoxError, DiError, DiResult};
use crate::injector::{ResolverContext, Scope};
use crate::internal::panic_message;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Ctor, Instance};

pub(crate) enum Strategy {
    Eager(AnyArc),
    Lazy {
        ctor: Ctor,
        /// Held while the provider runs, never while reading `instance`
        build: Mutex<()>,
        instance: RwLock<Option<AnyArc>>,
    },
    Transient(Ctor),
    Alias(String),
}

impl Strategy {
    pub(crate) fn lazy(ctor: Ctor) -> Self {
        Strategy::Lazy {
            ctor,
            build: Mutex::new(()),
            instance: RwLock::new(None),
        }
    }

    fn fresh(&self) -> Self {
        match self {
            Strategy::Eager(value) => Strategy::Eager(value.clone()),
            Strategy::Lazy { ctor, .. } => Strategy::lazy(ctor.clone()),
            Strategy::Transient(ctor) => Strategy::Transient(ctor.clone()),
            Strategy::Alias(target) => Strategy::Alias(target.clone()),
        }
    }
}

/// Where a service was provided and the most recent places it was invoked from.
struct Provenance {
    provided_at: &'static Location<'static>,
    invocations: VecDeque<&'static Location<'static>>,
    capacity: usize,
    total: u64,
}

impl Provenance {
    fn new(provided_at: &'static Location<'static>, capacity: usize) -> Self {
        Self {
            provided_at,
            invocations: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            total: 0,
        }
    }

    fn record(&mut self, site: &'static Location<'static>) {
        self.total += 1;
        if self.capacity == 0 {
            return;
        }
        if self.invocations.len() == self.capacity {
            self.invocations.pop_front();
        }
        self.invocations.push_back(site);
    }
}

pub(crate) struct Service {
    name: String,
    lifetime: Lifetime,
    type_name: &'static str,
    strategy: Strategy,
    caps: Capabilities,
    provenance: Mutex<Provenance>,
    shut_down: AtomicBool,
}

impl Service {
    pub(crate) fn new(
        name: String,
        lifetime: Lifetime,
        type_name: &'static str,
        strategy: Strategy,
        caps: Capabilities,
        provided_at: &'static Location<'static>,
        history: usize,
    ) -> Self {
        Self {
            name,
            lifetime,
            type_name,
            strategy,
            caps,
            provenance: Mutex::new(Provenance::new(provided_at, history)),
            shut_down: AtomicBool::new(false),
        }
    }

    pub(crate) fn alias(
        name: String,
        target: String,
        provided_at: &'static Location<'static>,
        history: usize,
    ) -> Self {
        Self::new(
            name,
            Lifetime::Alias,
            "alias",
            Strategy::Alias(target),
            Capabilities::default(),
            provided_at,
            history,
        )
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Returns the instance for this resolution, building it if the strategy requires.
    ///
    /// `owner` is the scope the service is registered in and `node` its graph
    /// vertex; both are handed to the provider so its own dependencies are
    /// resolved from the owning scope and recorded as edges from `node`.
    pub(crate) fn instance(
        &self,
        owner: &Scope,
        node: &ServiceNode,
        site: &'static Location<'static>,
    ) -> DiResult<Instance> {
        self.provenance.lock().record(site);

        match &self.strategy {
            Strategy::Eager(value) => Ok(Instance::new(value.clone(), self.type_name)),
            Strategy::Lazy { ctor, build, instance } => {
                if let Some(value) = instance.read().clone() {
                    return Ok(Instance::new(value, self.type_name));
                }
                let _building = build.lock();
                if let Some(value) = instance.read().clone() {
                    return Ok(Instance::new(value, self.type_name));
                }
                // A released instance must not come back once shutdown has started.
                owner.shared().ensure_materializable()?;
                let value = self.build(ctor, owner, node)?;
                *instance.write() = Some(value.clone());
                tracing::debug!(service = %node, "lazy service materialized");
                Ok(Instance::new(value, self.type_name))
            }
            Strategy::Transient(ctor) => {
                let value = self.build(ctor, owner, node)?;
                Ok(Instance::new(value, self.type_name))
            }
            Strategy::Alias(target) => match owner.alias_origin(&self.name, target) {
                Some(origin) => origin.resolve_from(target, Some(node), site),
                None => Err(owner.not_found(target)),
            },
        }
    }

    fn build(&self, ctor: &Ctor, owner: &Scope, node: &ServiceNode) -> DiResult<AnyArc> {
        let ctx = ResolverContext::new(owner, node);
        match panic::catch_unwind(AssertUnwindSafe(|| ctor(&ctx))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(self.provider_error(err)),
            Err(payload) => Err(DiError::ProviderPanicked {
                service: self.name.clone(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Errors raised by nested resolutions are passed through untouched.
    fn provider_error(&self, err: BoxError) -> DiError {
        match err.downcast::<DiError>() {
            Ok(err) => *err,
            Err(err) => DiError::Provider {
                service: self.name.clone(),
                source: Arc::from(err),
            },
        }
    }

    /// Hook and instance to probe, if the service is a health checker with a live instance.
    pub(crate) fn health_probe(&self) -> Option<(LifecycleHook, AnyArc)> {
        let hook = self.caps.health_hook()?;
        if self.shut_down.load(Ordering::Acquire) {
            return None;
        }
        let instance = match &self.strategy {
            Strategy::Eager(value) => value.clone(),
            Strategy::Lazy { instance, .. } => instance.read().clone()?,
            Strategy::Transient(_) | Strategy::Alias(_) => return None,
        };
        Some((hook.clone(), instance))
    }

    /// Hook and instance to shut down. Returns `Some` at most once per service.
    ///
    /// A materialized lazy instance is released even when the service has no
    /// shutdown capability.
    pub(crate) fn shutdown_probe(&self) -> Option<(LifecycleHook, AnyArc)> {
        let instance = match &self.strategy {
            Strategy::Eager(value) => Some(value.clone()),
            Strategy::Lazy { instance, .. } => instance.write().take(),
            Strategy::Transient(_) | Strategy::Alias(_) => None,
        }?;
        let hook = self.caps.shutdown_hook()?;
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some((hook.clone(), instance))
    }

    pub(crate) fn is_materialized(&self) -> bool {
        match &self.strategy {
            Strategy::Eager(_) => true,
            Strategy::Lazy { instance, .. } => instance.read().is_some(),
            Strategy::Transient(_) | Strategy::Alias(_) => false,
        }
    }

    /// Same provider and capabilities, no materialized instance, no history.
    pub(crate) fn clone_fresh(&self, history: usize) -> Service {
        let provided_at = self.provenance.lock().provided_at;
        Service::new(
            self.name.clone(),
            self.lifetime,
            self.type_name,
            self.strategy.fresh(),
            self.caps.clone(),
            provided_at,
            history,
        )
    }

    pub(crate) fn descriptor(&self, scope_id: &str, scope_name: &str) -> ServiceDescriptor {
        let provenance = self.provenance.lock();
        let type_name = match &self.strategy {
            Strategy::Alias(target) => format!("alias of `{}`", target),
            _ => self.type_name.to_string(),
        };
        ServiceDescriptor {
            name: self.name.clone(),
            scope_id: scope_id.to_string(),
            scope_name: scope_name.to_string(),
            lifetime: self.lifetime,
            type_name,
            capabilities: self.caps.set(),
            materialized: self.is_materialized(),
            provided_at: provenance.provided_at.to_string(),
            invocations: provenance.invocations.iter().map(ToString::to_string).collect(),
            invocation_count: provenance.total,
        }
    }
}
