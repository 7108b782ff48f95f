//! Injectable callables and the sync/async unification protocol.
//!
//! An [`Injectable`] pairs a callable with the ordered list of dependency
//! names it declares. The list is fixed at construction (by hand, or by the
//! `#[injectable]` macro reading the parameter names), so a container can
//! gather arguments without any runtime introspection.
//!
//! Callables are either plain or suspending. Invoking one always yields an
//! [`Outcome`], which the container settles the same way in both cases.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::container::Container;
use crate::error::{BoxError, NotFoundError, Result, WarrenError};
use crate::value::{FromValue, Value};

type SyncCall = Arc<dyn Fn(Invocation) -> Result<Value> + Send + Sync>;
type AsyncCall = Arc<dyn Fn(Invocation) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

#[derive(Clone)]
enum Call {
    Plain(SyncCall),
    Suspending(AsyncCall),
}

/// A callable with declared dependency names.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use warren_container::injectable::Injectable;
///
/// struct Config { url: String }
/// struct Pool { url: String }
///
/// let create = Injectable::new(["config"], |inv| {
///     let config: Arc<Config> = inv.arg(0)?;
///     Ok::<_, warren_container::WarrenError>(Pool { url: config.url.clone() })
/// });
/// assert_eq!(create.params(), ["config"]);
/// assert!(!create.is_async());
/// ```
#[derive(Clone)]
pub struct Injectable {
    params: Arc<[String]>,
    call: Call,
}

impl Injectable {
    /// A plain callable; its `Ok` value is wrapped in a fresh [`Value`].
    pub fn new<I, S, F, T, E>(params: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Invocation) -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Any + Send + Sync,
        E: Into<BoxError>,
    {
        Self::from_value_fn(params, move |inv| {
            f(inv).map(Value::new).map_err(WarrenError::user)
        })
    }

    /// A suspending callable; the container awaits its future.
    pub fn new_async<I, S, F, Fut, T, E>(params: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Any + Send + Sync,
        E: Into<BoxError>,
    {
        Self::from_value_async_fn(params, move |inv| {
            f(inv).map(|result| result.map(Value::new).map_err(WarrenError::user))
        })
    }

    /// A plain callable producing a [`Value`] directly.
    ///
    /// Use this to hand back an existing instance without re-wrapping it.
    pub fn from_value_fn<I, S, F>(params: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            params: collect_params(params),
            call: Call::Plain(Arc::new(f)),
        }
    }

    /// A suspending callable producing a [`Value`] directly.
    pub fn from_value_async_fn<I, S, F, Fut>(params: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            params: collect_params(params),
            call: Call::Suspending(Arc::new(move |inv| f(inv).boxed())),
        }
    }

    /// Declared dependency names, in parameter order.
    #[inline]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// `true` if invoking this callable suspends.
    #[inline]
    pub fn is_async(&self) -> bool {
        matches!(self.call, Call::Suspending(_))
    }

    /// Invokes the callable with already-gathered arguments.
    pub fn call(&self, invocation: Invocation) -> Outcome {
        match &self.call {
            Call::Plain(f) => Outcome::Ready(f(invocation)),
            Call::Suspending(f) => Outcome::Deferred(f(invocation)),
        }
    }

    pub(crate) fn shared_params(&self) -> Arc<[String]> {
        self.params.clone()
    }
}

impl fmt::Debug for Injectable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injectable")
            .field("params", &self.params)
            .field("async", &self.is_async())
            .finish()
    }
}

fn collect_params<I, S>(params: I) -> Arc<[String]>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    params.into_iter().map(Into::into).collect()
}

/// Result of invoking an [`Injectable`]: settled now, or later.
pub enum Outcome {
    Ready(Result<Value>),
    Deferred(BoxFuture<'static, Result<Value>>),
}

impl Outcome {
    #[inline]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Outcome::Deferred(_))
    }

    /// Awaits the outcome if it is deferred.
    pub async fn settle(self) -> Result<Value> {
        match self {
            Outcome::Ready(result) => result,
            Outcome::Deferred(future) => future.await,
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Outcome::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// Everything a callable receives when it is invoked.
pub struct Invocation {
    scope: Container,
    receiver: Option<Value>,
    params: Arc<[String]>,
    args: Vec<Value>,
}

impl Invocation {
    pub(crate) fn new(
        scope: Container,
        receiver: Option<Value>,
        params: Arc<[String]>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            scope,
            receiver,
            params,
            args,
        }
    }

    /// The argument at `index`, converted to `T`.
    pub fn arg<T: FromValue>(&self, index: usize) -> Result<T> {
        match (self.params.get(index), self.args.get(index)) {
            (Some(name), Some(value)) => T::from_value(name, value),
            _ => Err(self.missing(format!("#{index}"))),
        }
    }

    /// The argument gathered for dependency `name`, converted to `T`.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T> {
        self.params
            .iter()
            .position(|param| param == name)
            .and_then(|index| self.args.get(index))
            .map_or_else(|| Err(self.missing(name.to_string())), |value| {
                T::from_value(name, value)
            })
    }

    /// The receiver the callable was bound to, converted to `T`.
    ///
    /// Actions are bound to the instance they act on; `create` has none.
    pub fn receiver<T: FromValue>(&self) -> Result<T> {
        match self.receiver {
            Some(ref value) => T::from_value("<receiver>", value),
            None => Err(self.missing("<receiver>".to_string())),
        }
    }

    #[inline]
    pub fn receiver_value(&self) -> Option<&Value> {
        self.receiver.as_ref()
    }

    #[inline]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The container the arguments were resolved against.
    #[inline]
    pub fn scope(&self) -> &Container {
        &self.scope
    }

    fn missing(&self, name: String) -> WarrenError {
        WarrenError::NotFound(NotFoundError {
            name,
            scope_path: self.scope.scope_path(),
            suggestions: self.params.to_vec(),
        })
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("scope", &self.scope.definition().name())
            .field("params", &self.params)
            .field("receiver", &self.receiver)
            .finish()
    }
}

/// Values supplied by the caller instead of resolving them.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    values: HashMap<String, Value>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an override, builder style.
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.values.insert(name.into(), Value::new(value));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.values.insert(name.into(), value);
        self
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
