//! # The Container: heart of Warren
//!
//! A container is the runtime instance of a [`Definition`]. Containers form a
//! tree that mirrors the definition tree:
//!
//! ```text
//! Definitions                Containers
//!
//!   global        ──create_root()──>    global
//!     │                               /        \
//!   request       ──create_child()─> request   request
//! ```
//!
//! Resolving a name walks up the container chain. At each level the
//! container's own memoized instances are checked first, then its
//! definition's own items. A resolver is constructed at the level whose
//! definition owns it, with its dependencies resolved from that level, and
//! the result is memoized there. Every descendant then shares it.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use warren_container::prelude::*;
//!
//! struct Config { url: String }
//! struct Pool { url: String }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let registry = Registry::new();
//! let global = registry.define("global", None)?;
//! global.constant("config", Config { url: "postgres://localhost".into() })?;
//! global.resolver("pool", Injectable::new(["config"], |inv| {
//!     let config: Arc<Config> = inv.arg(0)?;
//!     Ok::<_, WarrenError>(Pool { url: config.url.clone() })
//! }))?;
//! global.define_child("request")?;
//!
//! let root = registry.create_root("global")?;
//! let request = root.create_child("request")?;
//!
//! let pool: Arc<Pool> = request.resolve_as("pool").await?;
//! assert_eq!(pool.url, "postgres://localhost");
//! # Ok::<(), WarrenError>(())
//! # }).unwrap();
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, trace, warn};
use warren_support::rendering::suggest_similar;

use crate::definition::Definition;
use crate::error::{MismatchError, NotFoundError, Result, WarrenError};
use crate::injectable::{Injectable, Invocation, Overrides};
use crate::item::{Item, Resolver};
use crate::registry::{Registry, RegistrySettings};
use crate::value::{FromValue, Value};

/// A construction in flight, shared by every single-flight caller waiting on it.
type Slot = Arc<OnceCell<Value>>;

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// A runtime scope bound to one definition. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    registry: Registry,
    definition: Definition,
    parent: Option<Container>,
    instances: RwLock<Instances>,
}

/// Memoized values in write order, plus constructions still in flight.
#[derive(Default)]
struct Instances {
    ready: IndexMap<String, Value>,
    pending: HashMap<String, Slot>,
}

impl Container {
    pub(crate) fn new(registry: Registry, definition: Definition, parent: Option<Container>) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                registry,
                definition,
                parent,
                instances: RwLock::new(Instances::default()),
            }),
        }
    }

    /// The registry this container's definitions come from.
    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    #[inline]
    pub fn definition(&self) -> &Definition {
        &self.inner.definition
    }

    #[inline]
    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    #[inline]
    fn settings(&self) -> &RegistrySettings {
        self.inner.definition.settings()
    }

    /// Creates a child container bound to `definition_name`.
    ///
    /// # Errors
    /// - [`ConfigurationError::UnknownDefinition`](crate::error::ConfigurationError) if the name is not registered
    /// - [`WarrenError::Mismatch`] unless the definition's parent is this container's definition
    pub fn create_child(&self, definition_name: &str) -> Result<Container> {
        let definition = self.registry().get_definition(definition_name)?;

        let matches = definition
            .parent()
            .is_some_and(|parent| parent.ptr_eq(self.definition()));

        if !matches {
            warn!(
                requested = %definition_name,
                parent = %self.definition().name(),
                "Definition does not match parent container"
            );
            return Err(WarrenError::Mismatch(MismatchError {
                requested: definition_name.to_string(),
                expected_parent: self.definition().name().to_string(),
                actual_parent: definition.parent().map(|p| p.name().to_string()),
            }));
        }

        debug!(definition = %definition_name, parent = %self.definition().name(), "Creating child container");
        Ok(Container::new(self.registry().clone(), definition, Some(self.clone())))
    }

    /// Sets an own instance, overriding any resolver for `name` at this level.
    pub fn instance<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) -> &Self {
        self.instance_value(name, Value::new(value))
    }

    /// Like [`instance`](Self::instance), keeping the identity of `value`.
    pub fn instance_value(&self, name: impl Into<String>, value: Value) -> &Self {
        let name = name.into();
        debug!(scope = %self.definition().name(), name = %name, "Binding instance");
        self.store(name, value);
        self
    }

    /// Resolves `name` against this container.
    ///
    /// The future is `'static`; it keeps its own handle on the container.
    pub fn resolve(&self, name: &str) -> BoxFuture<'static, Result<Value>> {
        self.clone().resolve_owned(name.to_string()).boxed()
    }

    /// Resolves `name` and converts it to `T`.
    ///
    /// ```rust,ignore
    /// let pool: Arc<Pool> = container.resolve_as("pool").await?;
    /// ```
    pub async fn resolve_as<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.resolve(name).await?;
        T::from_value(name, &value)
    }

    #[instrument(skip(self), name = "resolve", fields(scope = %self.definition().name()))]
    async fn resolve_owned(self, name: String) -> Result<Value> {
        let mut level = Some(self.clone());

        while let Some(current) = level {
            // An instance here wins over any resolver, including this level's.
            if let Some(value) = current.own_instance(&name) {
                trace!(found_in = %current.definition().name(), "Instance hit");
                return Ok(value);
            }

            if let Some(item) = current.definition().own_item(&name) {
                return match item {
                    Item::Constant(value) => {
                        trace!(found_in = %current.definition().name(), "Constant hit");
                        Ok(value)
                    }
                    Item::Resolver(resolver) => current.construct(name, resolver).await,
                };
            }

            level = current.parent().cloned();
        }

        Err(self.not_found(&name))
    }

    /// Runs `create` at this level and memoizes the result here.
    async fn construct(&self, name: String, resolver: Resolver) -> Result<Value> {
        let create = resolver.create().clone();
        trace!(level = %self.definition().name(), name = %name, "Constructing instance");

        if !self.settings().single_flight {
            let value = self.inject(&create, None).await?;
            self.store(name, value.clone());
            return Ok(value);
        }

        let slot = match self.claim(&name) {
            Ok(slot) => slot,
            Err(value) => return Ok(value),
        };
        let value = slot
            .get_or_try_init(|| self.inject(&create, None))
            .await?
            .clone();
        self.memoize(&name, &slot, value.clone());
        Ok(value)
    }

    /// Calls `injectable` with every declared dependency resolved here.
    pub fn inject(&self, injectable: &Injectable, receiver: Option<Value>) -> BoxFuture<'static, Result<Value>> {
        self.inject_with(injectable, Overrides::new(), receiver)
    }

    /// Calls `injectable`, taking arguments from `overrides` before resolving.
    ///
    /// Arguments are gathered strictly in parameter order: each one settles
    /// before the next is looked up.
    pub fn inject_with(
        &self,
        injectable: &Injectable,
        overrides: Overrides,
        receiver: Option<Value>,
    ) -> BoxFuture<'static, Result<Value>> {
        let scope = self.clone();
        let injectable = injectable.clone();

        async move {
            let params = injectable.shared_params();
            let mut args = Vec::with_capacity(params.len());

            for param in params.iter() {
                let value = match overrides.get(param) {
                    Some(value) => value.clone(),
                    None => scope.resolve(param).await?,
                };
                args.push(value);
            }

            let invocation = Invocation::new(scope, receiver, params, args);
            injectable.call(invocation).settle().await
        }
        .boxed()
    }

    /// Invokes `action_name` on every resolver instance memoized at this level.
    ///
    /// All invocations are spawned in memoization order before any is
    /// awaited. The call fails with the first failure to arrive; the other
    /// tasks keep running and their results are dropped. On success the
    /// results come back in memoization order. Needs a running tokio runtime.
    pub fn action(&self, action_name: &str) -> BoxFuture<'static, Result<Vec<Value>>> {
        self.clone().action_owned(action_name.to_string()).boxed()
    }

    #[instrument(skip(self), name = "action", fields(scope = %self.definition().name()))]
    async fn action_owned(self, action_name: String) -> Result<Vec<Value>> {
        let targets: Vec<(String, Value, Injectable)> = self
            .own_instances()
            .into_iter()
            .filter_map(|(name, value)| {
                let item = self.definition().get_item(&name)?;
                let action = item.as_resolver()?.action(&action_name)?.clone();
                Some((name, value, action))
            })
            .collect();

        debug!(targets = targets.len(), "Broadcasting action");

        let total = targets.len();
        let mut pending: FuturesUnordered<_> = targets
            .into_iter()
            .enumerate()
            .map(|(index, (name, value, action))| {
                let task = tokio::spawn(self.inject(&action, Some(value)));
                async move { (index, name, task.await) }
            })
            .collect();

        let mut results: Vec<Option<Value>> = vec![None; total];
        while let Some((index, name, joined)) = pending.next().await {
            match joined {
                Ok(Ok(value)) => results[index] = Some(value),
                Ok(Err(err)) => {
                    debug!(name = %name, error = %err, "Action failed");
                    return Err(err);
                }
                Err(join_error) => {
                    warn!(name = %name, error = %join_error, "Action task aborted");
                    return Err(WarrenError::ActionAborted {
                        action: action_name,
                        name,
                    });
                }
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    /// Names memoized or bound at this exact level, in insertion order.
    pub fn own_instance_names(&self) -> Vec<String> {
        self.own_instances().into_iter().map(|(name, _)| name).collect()
    }

    #[inline]
    pub fn has_own_instance(&self, name: &str) -> bool {
        self.own_instance(name).is_some()
    }

    /// Definition names from this container's level up to the root.
    pub fn scope_path(&self) -> Vec<String> {
        self.definition().chain()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ── Instance map ──

    fn own_instance(&self, name: &str) -> Option<Value> {
        self.inner.instances.read().ready.get(name).cloned()
    }

    fn own_instances(&self) -> Vec<(String, Value)> {
        self.inner
            .instances
            .read()
            .ready
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// The in-flight slot for `name`, or the value if it was memoized meanwhile.
    fn claim(&self, name: &str) -> std::result::Result<Slot, Value> {
        let mut instances = self.inner.instances.write();
        if let Some(value) = instances.ready.get(name) {
            return Err(value.clone());
        }
        Ok(instances
            .pending
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone())
    }

    /// Moves a settled `slot` into the ready map. Only the first caller for a
    /// slot writes; a slot displaced by [`store`](Self::store) is dropped.
    fn memoize(&self, name: &str, slot: &Slot, value: Value) {
        let mut instances = self.inner.instances.write();
        let owned = instances
            .pending
            .get(name)
            .is_some_and(|pending| Arc::ptr_eq(pending, slot));
        if owned {
            instances.pending.remove(name);
            instances.ready.insert(name.to_string(), value);
            debug!(level = %self.definition().name(), name, "Memoized instance");
        }
    }

    /// Writes `value` as the instance for `name`. A construction still in
    /// flight for `name` finishes without being memoized.
    fn store(&self, name: String, value: Value) {
        let mut instances = self.inner.instances.write();
        instances.pending.remove(&name);
        instances.ready.insert(name, value);
    }

    fn not_found(&self, name: &str) -> WarrenError {
        let mut known: Vec<String> = Vec::new();
        let mut level = Some(self);
        while let Some(current) = level {
            known.extend(current.own_instance_names());
            known.extend(current.definition().own_item_names());
            level = current.parent();
        }
        known.sort();
        known.dedup();

        debug!(name, scope = %self.definition().name(), "Name not found");
        WarrenError::NotFound(NotFoundError {
            name: name.to_string(),
            scope_path: self.scope_path(),
            suggestions: suggest_similar(name, &known, 3),
        })
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("definition", &self.definition().name())
            .field("parent", &self.parent().map(|p| p.definition().name()))
            .field("instances", &self.own_instance_names())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::Container;
    pub use crate::definition::Definition;
    pub use crate::error::{Result, WarrenError};
    pub use crate::injectable::{Injectable, Invocation, Outcome, Overrides};
    pub use crate::item::{Actions, Item};
    pub use crate::provider::Module;
    pub use crate::registry::{Registry, RegistrySettings};
    pub use crate::value::{FromValue, Value};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigurationError;
    use crate::item::Actions;
    use crate::registry::Registry;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct Named {
        name: &'static str,
    }

    struct Holder {
        inner: Arc<Named>,
    }

    fn counting(counter: &Arc<AtomicU32>) -> Injectable {
        let counter = counter.clone();
        Injectable::new([] as [&str; 0], move |_| {
            Ok::<_, WarrenError>(counter.fetch_add(1, Ordering::SeqCst))
        })
    }

    fn two_levels() -> (Registry, Definition, Definition) {
        let registry = Registry::new();
        let global = registry.define("global", None).unwrap();
        global.constant("rootInst", Named { name: "rootInst" }).unwrap();
        let request = global.define_child("request").unwrap();
        request.constant("reqInst", Named { name: "reqInst" }).unwrap();
        (registry, global, request)
    }

    #[tokio::test]
    async fn constant_resolves_to_same_value() {
        let (registry, _, _) = two_levels();
        let root = registry.create_root("global").unwrap();

        let a = root.resolve("rootInst").await.unwrap();
        let b = root.resolve("rootInst").await.unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.downcast::<Named>().unwrap().name, "rootInst");
        // Constants are never memoized.
        assert!(!root.has_own_instance("rootInst"));
    }

    #[tokio::test]
    async fn resolver_runs_once_per_level() {
        let (registry, global, _) = two_levels();
        let counter = Arc::new(AtomicU32::new(0));
        global.resolver("counter", counting(&counter)).unwrap();
        let root = registry.create_root("global").unwrap();

        let a = root.resolve("counter").await.unwrap();
        let b = root.resolve("counter").await.unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(root.own_instance_names(), ["counter"]);
    }

    #[tokio::test]
    async fn child_falls_through_to_parent() {
        let (registry, _, _) = two_levels();
        let root = registry.create_root("global").unwrap();
        let child = root.create_child("request").unwrap();

        let from_root = root.resolve("rootInst").await.unwrap();
        let from_child = child.resolve("rootInst").await.unwrap();
        assert!(from_root.ptr_eq(&from_child));
    }

    #[tokio::test]
    async fn ancestor_resolver_is_memoized_at_ancestor() {
        let (registry, global, _) = two_levels();
        let counter = Arc::new(AtomicU32::new(0));
        global.resolver("shared", counting(&counter)).unwrap();

        let root = registry.create_root("global").unwrap();
        let first = root.create_child("request").unwrap();
        let second = root.create_child("request").unwrap();

        let a = first.resolve("shared").await.unwrap();
        let b = second.resolve("shared").await.unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(root.has_own_instance("shared"));
        assert!(!first.has_own_instance("shared"));
    }

    #[tokio::test]
    async fn ancestor_resolver_ignores_descendant_overrides() {
        let registry = Registry::new();
        let global = registry.define("global", None).unwrap();
        global.constant("flavor", "root").unwrap();
        global
            .resolver(
                "dish",
                Injectable::new(["flavor"], |inv| {
                    let flavor: Arc<&'static str> = inv.arg(0)?;
                    Ok::<_, WarrenError>(format!("{flavor} dish"))
                }),
            )
            .unwrap();
        let request = global.define_child("request").unwrap();
        request.constant("flavor", "request").unwrap();

        let root = registry.create_root("global").unwrap();
        let child = root.create_child("request").unwrap();

        let dish: Arc<String> = child.resolve_as("dish").await.unwrap();
        assert_eq!(dish.as_str(), "root dish");
        let flavor: Arc<&'static str> = child.resolve_as("flavor").await.unwrap();
        assert_eq!(*flavor, "request");
    }

    #[tokio::test]
    async fn child_item_shadows_memoized_ancestor_instance() {
        let registry = Registry::new();
        let global = registry.define("global", None).unwrap();
        global
            .resolver("greeting", Injectable::new([] as [&str; 0], |_| Ok::<_, WarrenError>("hello")))
            .unwrap();
        let request = global.define_child("request").unwrap();
        request
            .resolver("greeting", Injectable::new([] as [&str; 0], |_| Ok::<_, WarrenError>("hi")))
            .unwrap();

        let root = registry.create_root("global").unwrap();
        let child = root.create_child("request").unwrap();

        let outer: Arc<&'static str> = root.resolve_as("greeting").await.unwrap();
        let inner: Arc<&'static str> = child.resolve_as("greeting").await.unwrap();
        assert_eq!(*outer, "hello");
        assert_eq!(*inner, "hi");
    }

    #[tokio::test]
    async fn instance_overrides_resolver() {
        let (registry, global, _) = two_levels();
        let counter = Arc::new(AtomicU32::new(0));
        global.resolver("counter", counting(&counter)).unwrap();

        let root = registry.create_root("global").unwrap();
        root.instance("counter", 99u32);

        let value: Arc<u32> = root.resolve_as("counter").await.unwrap();
        assert_eq!(*value, 99);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn instance_without_item_is_resolvable() {
        let (registry, _, _) = two_levels();
        let root = registry.create_root("global").unwrap();
        let child = root.create_child("request").unwrap();
        let request = Value::new(String::from("GET /"));
        child.instance_value("req", request.clone());

        assert!(child.resolve("req").await.unwrap().ptr_eq(&request));
        assert!(root.resolve("req").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn not_found_reports_scope_and_suggestions() {
        let (registry, _, _) = two_levels();
        let root = registry.create_root("global").unwrap();
        let child = root.create_child("request").unwrap();

        match child.resolve("rootInts").await.unwrap_err() {
            WarrenError::NotFound(err) => {
                assert_eq!(err.name, "rootInts");
                assert_eq!(err.scope_path, ["request", "global"]);
                assert_eq!(err.suggestions, ["rootInst"]);
            }
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_child_checks_definition_parent() {
        let registry = Registry::new();
        registry.define("global", None).unwrap();
        registry.define("request", Some("global")).unwrap();
        registry.define("worker", None).unwrap();
        registry.define("job", Some("worker")).unwrap();

        let root = registry.create_root("global").unwrap();
        let err = root.create_child("job").unwrap_err();
        match err {
            WarrenError::Mismatch(err) => {
                assert_eq!(err.requested, "job");
                assert_eq!(err.expected_parent, "global");
                assert_eq!(err.actual_parent.as_deref(), Some("worker"));
            }
            other => panic!("Expected Mismatch, got: {other:?}"),
        }

        assert!(matches!(root.create_child("global"), Err(WarrenError::Mismatch(_))));
        assert!(matches!(
            root.create_child("nope"),
            Err(WarrenError::Configuration(ConfigurationError::UnknownDefinition { .. }))
        ));

        let child = root.create_child("request").unwrap();
        assert!(child.parent().unwrap().ptr_eq(&root));
        assert_eq!(child.scope_path(), ["request", "global"]);
    }

    #[tokio::test]
    async fn async_create_is_awaited_and_memoized() {
        let (registry, global, request) = two_levels();
        global
            .resolver(
                "tester",
                Injectable::new_async(["rootInst"], |inv| async move {
                    let root: Arc<Named> = inv.arg(0)?;
                    tokio::task::yield_now().await;
                    Ok::<_, WarrenError>(Holder { inner: root })
                }),
            )
            .unwrap();
        request
            .resolver(
                "depTester",
                Injectable::new(["tester"], |inv| {
                    let tester: Arc<Holder> = inv.arg(0)?;
                    Ok::<_, WarrenError>(Holder { inner: tester.inner.clone() })
                }),
            )
            .unwrap();

        let root = registry.create_root("global").unwrap();
        let child = root.create_child("request").unwrap();

        let dt: Arc<Holder> = child.resolve_as("depTester").await.unwrap();
        assert_eq!(dt.inner.name, "rootInst");
        let again: Arc<Holder> = child.resolve_as("depTester").await.unwrap();
        assert!(Arc::ptr_eq(&dt, &again));
    }

    #[tokio::test]
    async fn inject_with_prefers_overrides() {
        let (registry, _, _) = two_levels();
        let root = registry.create_root("global").unwrap();
        let child = root.create_child("request").unwrap();

        let describe = Injectable::new(["rootInst", "reqInst"], |inv| {
            let a: Arc<Named> = inv.arg(0)?;
            let b: Arc<Named> = inv.arg(1)?;
            Ok::<_, WarrenError>(format!("{}+{}", a.name, b.name))
        });

        let plain = child.inject(&describe, None).await.unwrap();
        assert_eq!(plain.downcast::<String>().unwrap().as_str(), "rootInst+reqInst");

        let overrides = Overrides::new().with("reqInst", Named { name: "override" });
        let value = child.inject_with(&describe, overrides, None).await.unwrap();
        assert_eq!(value.downcast::<String>().unwrap().as_str(), "rootInst+override");
    }

    #[tokio::test]
    async fn inject_gathers_arguments_in_order() {
        let registry = Registry::new();
        let global = registry.define("global", None).unwrap();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for (name, delay) in [("slow", 20u64), ("fast", 0u64)] {
            let log = log.clone();
            global
                .resolver(
                    name,
                    Injectable::new_async([] as [&str; 0], move |_| {
                        let log = log.clone();
                        async move {
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                            log.lock().push(name);
                            Ok::<_, WarrenError>(name)
                        }
                    }),
                )
                .unwrap();
        }

        let root = registry.create_root("global").unwrap();
        let both = Injectable::new(["slow", "fast"], |_| Ok::<_, WarrenError>(()));
        root.inject(&both, None).await.unwrap();
        assert_eq!(*log.lock(), ["slow", "fast"]);
    }

    #[tokio::test]
    async fn user_error_propagates_without_memoizing() {
        #[derive(Debug, thiserror::Error)]
        #[error("connection refused")]
        struct Refused;

        let registry = Registry::new();
        let global = registry.define("global", None).unwrap();
        let attempts = Arc::new(AtomicU32::new(0));
        {
            let attempts = attempts.clone();
            global
                .resolver(
                    "db",
                    Injectable::new([] as [&str; 0], move |_| {
                        if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(Refused)
                        } else {
                            Ok(7u8)
                        }
                    }),
                )
                .unwrap();
        }

        let root = registry.create_root("global").unwrap();
        let err = root.resolve("db").await.unwrap_err();
        assert!(err.as_user().unwrap().downcast_ref::<Refused>().is_some());
        assert!(!root.has_own_instance("db"));

        let value: Arc<u8> = root.resolve_as("db").await.unwrap();
        assert_eq!(*value, 7);
    }

    #[tokio::test]
    async fn dependency_failure_reaches_caller() {
        let (registry, _, request) = two_levels();
        request
            .resolver("broken", Injectable::new(["missing"], |_| Ok::<_, WarrenError>(())))
            .unwrap();
        let root = registry.create_root("global").unwrap();
        let child = root.create_child("request").unwrap();

        let err = child.resolve("broken").await.unwrap_err();
        match err {
            WarrenError::NotFound(err) => assert_eq!(err.name, "missing"),
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    fn slow_counting(counter: &Arc<AtomicU32>) -> Injectable {
        let counter = counter.clone();
        Injectable::new_async([] as [&str; 0], move |_| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, WarrenError>(counter.fetch_add(1, Ordering::SeqCst))
            }
        })
    }

    #[tokio::test]
    async fn concurrent_resolves_coalesce_by_default() {
        let registry = Registry::new();
        let global = registry.define("global", None).unwrap();
        let counter = Arc::new(AtomicU32::new(0));
        global.resolver("slow", slow_counting(&counter)).unwrap();
        let root = registry.create_root("global").unwrap();

        let (a, b) = tokio::join!(root.resolve("slow"), root.resolve("slow"));
        assert!(a.unwrap().ptr_eq(&b.unwrap()));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_resolves_race_without_single_flight() {
        let registry = Registry::with_settings(RegistrySettings::default().single_flight(false));
        let global = registry.define("global", None).unwrap();
        let counter = Arc::new(AtomicU32::new(0));
        global.resolver("slow", slow_counting(&counter)).unwrap();
        let root = registry.create_root("global").unwrap();

        let (a, b) = tokio::join!(root.resolve("slow"), root.resolve("slow"));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(!a.ptr_eq(&b));
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        // The last write wins the slot.
        let cached = root.resolve("slow").await.unwrap();
        assert!(cached.ptr_eq(&a) || cached.ptr_eq(&b));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn action_visits_only_resolvers_defining_it() {
        let (registry, global, request) = two_levels();
        let calls = Arc::new(AtomicU32::new(0));

        request
            .resolver(
                "withAction",
                Actions::create(Injectable::new([] as [&str; 0], |_| Ok::<_, WarrenError>(1u8)))
                    .action("complete", {
                        let calls = calls.clone();
                        Injectable::new_async([] as [&str; 0], move |_| {
                            let calls = calls.clone();
                            async move {
                                tokio::time::sleep(Duration::from_millis(10)).await;
                                calls.fetch_add(1, Ordering::SeqCst);
                                Ok::<_, WarrenError>(())
                            }
                        })
                    }),
            )
            .unwrap();
        request
            .resolver("plain", Injectable::new([] as [&str; 0], |_| Ok::<_, WarrenError>(2u8)))
            .unwrap();
        global
            .resolver(
                "ancestor",
                Actions::create(Injectable::new([] as [&str; 0], |_| Ok::<_, WarrenError>(3u8)))
                    .action("complete", Injectable::new([] as [&str; 0], |_| {
                        Err::<(), _>(WarrenError::user("ancestor instances are not notified"))
                    })),
            )
            .unwrap();

        let root = registry.create_root("global").unwrap();
        let child = root.create_child("request").unwrap();
        child.resolve("withAction").await.unwrap();
        child.resolve("plain").await.unwrap();
        child.resolve("ancestor").await.unwrap();
        child.instance("bound", 4u8);

        let results = child.action("complete").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn action_receives_instance_as_receiver() {
        let (registry, _, request) = two_levels();
        request
            .resolver(
                "depTester",
                Actions::create(Injectable::new(["rootInst"], |inv| {
                    let root: Arc<Named> = inv.arg(0)?;
                    Ok::<_, WarrenError>(Holder { inner: root })
                }))
                .action(
                    "complete",
                    Injectable::from_value_fn(["depTester"], |inv| {
                        let this: Value = inv.receiver()?;
                        let injected: Value = inv.arg(0)?;
                        assert!(this.ptr_eq(&injected));
                        Ok(this)
                    }),
                ),
            )
            .unwrap();

        let root = registry.create_root("global").unwrap();
        let child = root.create_child("request").unwrap();
        let instance = child.resolve("depTester").await.unwrap();

        let results = child.action("complete").await.unwrap();
        assert!(results[0].ptr_eq(&instance));
    }

    #[tokio::test]
    async fn action_failure_is_reported() {
        let (registry, global, _) = two_levels();
        global
            .resolver(
                "tx",
                Actions::create(Injectable::new([] as [&str; 0], |_| Ok::<_, WarrenError>(())))
                    .action("commit", Injectable::new([] as [&str; 0], |_| {
                        Err::<(), _>(std::io::Error::other("disk full"))
                    })),
            )
            .unwrap();

        let root = registry.create_root("global").unwrap();
        root.resolve("tx").await.unwrap();

        let err = root.action("commit").await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[tokio::test]
    async fn action_with_no_targets_is_empty() {
        let (registry, _, _) = two_levels();
        let root = registry.create_root("global").unwrap();
        assert!(root.action("complete").await.unwrap().is_empty());
    }

    fn build_root() -> Container {
        let registry = Registry::new();
        let global = registry.define("global", None).unwrap();
        global.constant("rootInst", Named { name: "rootInst" }).unwrap();
        global.define_child("request").unwrap();
        registry.create_root("global").unwrap()
    }

    #[tokio::test]
    async fn containers_keep_their_registry_alive() {
        let root = build_root();

        let child = root.create_child("request").unwrap();
        let inherited: Arc<Named> = child.resolve_as("rootInst").await.unwrap();
        assert_eq!(inherited.name, "rootInst");
        assert!(root.registry().contains("request"));
    }

    #[tokio::test]
    async fn dependencies_are_memoized_before_dependents() {
        let registry = Registry::new();
        let global = registry.define("global", None).unwrap();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let committing = |label: &'static str, params: &[&'static str]| {
            let order = order.clone();
            Actions::create(Injectable::new(params.to_vec(), move |_| Ok::<_, WarrenError>(label)))
                .action(
                    "commit",
                    Injectable::new([] as [&str; 0], move |inv| {
                        let this: Arc<&'static str> = inv.receiver()?;
                        order.lock().push(*this);
                        Ok::<_, WarrenError>(*this)
                    }),
                )
        };
        global.resolver("a", committing("a", &["b"])).unwrap();
        global.resolver("b", committing("b", &[])).unwrap();

        let root = registry.create_root("global").unwrap();
        root.resolve("a").await.unwrap();
        assert_eq!(root.own_instance_names(), ["b", "a"]);

        let results = root.action("commit").await.unwrap();
        let labels: Vec<&str> = results
            .iter()
            .map(|value| *value.downcast_ref::<&'static str>().unwrap())
            .collect();
        assert_eq!(labels, ["b", "a"]);
        assert_eq!(order.lock().first(), Some(&"b"));
    }

    #[tokio::test]
    async fn failed_construction_is_not_listed() {
        let registry = Registry::new();
        registry
            .define("global", None)
            .unwrap()
            .resolver("broken", Injectable::new([] as [&str; 0], |_| {
                Err::<(), _>(WarrenError::user("nope"))
            }))
            .unwrap();

        let root = registry.create_root("global").unwrap();
        assert!(root.resolve("broken").await.is_err());
        assert!(root.own_instance_names().is_empty());
    }

    #[tokio::test]
    async fn self_dependency_never_settles() {
        let registry = Registry::new();
        registry
            .define("global", None)
            .unwrap()
            .resolver("a", Injectable::new(["a"], |_| Ok::<_, WarrenError>(())))
            .unwrap();

        let root = registry.create_root("global").unwrap();
        let outcome = tokio::time::timeout(Duration::from_millis(50), root.resolve("a")).await;
        assert!(outcome.is_err());
    }
}
