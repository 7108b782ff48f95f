//! Items registered in a definition: constants and resolvers.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ConfigurationError, Result, WarrenError};
use crate::injectable::Injectable;
use crate::value::Value;

/// Name of the mandatory resolver action.
pub const CREATE: &str = "create";

/// An immutable entry in a definition.
#[derive(Clone, Debug)]
pub enum Item {
    /// A fixed value, returned as is and never memoized.
    Constant(Value),
    /// A set of actions; `create` builds the instance.
    Resolver(Resolver),
}

impl Item {
    #[inline]
    pub fn is_resolver(&self) -> bool {
        matches!(self, Item::Resolver(_))
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Item::Constant(value) => Some(value),
            Item::Resolver(_) => None,
        }
    }

    pub fn as_resolver(&self) -> Option<&Resolver> {
        match self {
            Item::Resolver(resolver) => Some(resolver),
            Item::Constant(_) => None,
        }
    }
}

/// Named lifecycle actions, in registration order.
///
/// ```
/// use warren_container::item::Actions;
/// use warren_container::injectable::Injectable;
///
/// let actions = Actions::create(Injectable::new(["config"], |_| Ok::<_, std::io::Error>(())))
///     .action("close", Injectable::new(["logger"], |_| Ok::<_, std::io::Error>(())));
/// assert_eq!(actions.names().collect::<Vec<_>>(), ["create", "close"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Actions {
    actions: IndexMap<String, Injectable>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a set with the `create` action.
    pub fn create(create: Injectable) -> Self {
        Self::new().action(CREATE, create)
    }

    /// Adds (or replaces) an action.
    pub fn action(mut self, name: impl Into<String>, injectable: Injectable) -> Self {
        self.actions.insert(name.into(), injectable);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

/// What [`Definition::resolver`](crate::definition::Definition::resolver) accepts.
///
/// A lone [`Injectable`] is shorthand for `{ create }`.
#[derive(Debug)]
pub struct ResolverSpec(Actions);

impl From<Injectable> for ResolverSpec {
    fn from(create: Injectable) -> Self {
        ResolverSpec(Actions::create(create))
    }
}

impl From<Actions> for ResolverSpec {
    fn from(actions: Actions) -> Self {
        ResolverSpec(actions)
    }
}

/// A validated set of actions with a `create` entry.
#[derive(Clone)]
pub struct Resolver {
    actions: Arc<IndexMap<String, Injectable>>,
}

impl Resolver {
    /// Validates `spec` for the item called `name`.
    ///
    /// # Errors
    /// [`ConfigurationError::MissingCreate`] if there is no `create` action.
    pub fn from_spec(name: &str, spec: impl Into<ResolverSpec>) -> Result<Self> {
        let ResolverSpec(Actions { actions }) = spec.into();

        if !actions.contains_key(CREATE) {
            return Err(WarrenError::Configuration(ConfigurationError::MissingCreate {
                name: name.to_string(),
            }));
        }

        Ok(Self {
            actions: Arc::new(actions),
        })
    }

    pub fn create(&self) -> &Injectable {
        &self.actions[CREATE]
    }

    pub fn action(&self, name: &str) -> Option<&Injectable> {
        self.actions.get(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
