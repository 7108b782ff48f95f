//! Definitions: named scope templates holding items.
//!
//! A definition owns its items and points at its parent. Item lookup checks
//! the definition's own map first, then walks up the parent chain, so a
//! child may shadow any name declared above it.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{ConfigurationError, Result, WarrenError};
use crate::item::{Item, Resolver, ResolverSpec};
use crate::provider::Module;
use crate::registry::{Registry, RegistryInner, RegistrySettings};
use crate::value::Value;

/// A named scope template. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Definition {
    inner: Arc<DefinitionInner>,
}

struct DefinitionInner {
    name: String,
    parent: Option<Definition>,
    items: RwLock<IndexMap<String, Item>>,
    registry: Weak<RegistryInner>,
    settings: RegistrySettings,
}

impl Definition {
    pub(crate) fn new(
        name: String,
        parent: Option<Definition>,
        registry: Weak<RegistryInner>,
        settings: RegistrySettings,
    ) -> Self {
        Self {
            inner: Arc::new(DefinitionInner {
                name,
                parent,
                items: RwLock::new(IndexMap::new()),
                registry,
                settings,
            }),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[inline]
    pub fn parent(&self) -> Option<&Definition> {
        self.inner.parent.as_ref()
    }

    /// The registry this definition belongs to.
    ///
    /// # Errors
    /// [`ConfigurationError::RegistryDropped`] once every registry handle is gone.
    pub fn registry(&self) -> Result<Registry> {
        Registry::upgrade(&self.inner.registry).ok_or_else(|| {
            WarrenError::Configuration(ConfigurationError::RegistryDropped {
                definition: self.name().to_string(),
            })
        })
    }

    #[inline]
    pub(crate) fn settings(&self) -> &RegistrySettings {
        &self.inner.settings
    }

    /// Defines a child of this definition in the same registry.
    pub fn define_child(&self, name: impl Into<String>) -> Result<Definition> {
        self.registry()?.define(name, Some(self.name()))
    }

    /// Registers a resolver under `name`.
    ///
    /// Accepts a single [`Injectable`](crate::injectable::Injectable) as
    /// shorthand for `{ create }`, or a full [`Actions`](crate::item::Actions) set.
    ///
    /// # Errors
    /// - [`ConfigurationError::MissingCreate`] without a `create` action
    /// - [`ConfigurationError::DuplicateItem`] if this definition already owns `name`
    pub fn resolver(&self, name: impl Into<String>, spec: impl Into<ResolverSpec>) -> Result<&Self> {
        let name = name.into();
        let resolver = Resolver::from_spec(&name, spec)?;
        self.insert_item(name, Item::Resolver(resolver))
    }

    /// Registers a constant under `name`.
    pub fn constant<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) -> Result<&Self> {
        self.constant_value(name, Value::new(value))
    }

    /// Registers an existing [`Value`] as a constant, keeping its identity.
    pub fn constant_value(&self, name: impl Into<String>, value: Value) -> Result<&Self> {
        self.insert_item(name.into(), Item::Constant(value))
    }

    /// Runs a [`Module`]'s registrations against this definition.
    pub fn install(&self, module: &dyn Module) -> Result<&Self> {
        debug!(definition = %self.name(), module = module.name(), "Installing module");
        module.register(self)?;
        Ok(self)
    }

    /// Nearest item called `name`, searching this definition then its ancestors.
    pub fn get_item(&self, name: &str) -> Option<Item> {
        let mut current = Some(self);
        while let Some(definition) = current {
            if let Some(item) = definition.own_item(name) {
                trace!(name, found_in = %definition.name(), "Item lookup hit");
                return Some(item);
            }
            current = definition.parent();
        }
        None
    }

    /// The item called `name` owned by this exact definition.
    pub fn own_item(&self, name: &str) -> Option<Item> {
        self.inner.items.read().get(name).cloned()
    }

    #[inline]
    pub fn has_own_item(&self, name: &str) -> bool {
        self.inner.items.read().contains_key(name)
    }

    /// Names owned by this definition, in registration order.
    pub fn own_item_names(&self) -> Vec<String> {
        self.inner.items.read().keys().cloned().collect()
    }

    /// Definition names from this one up to the root.
    pub fn chain(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = Some(self);
        while let Some(definition) = current {
            names.push(definition.name().to_string());
            current = definition.parent();
        }
        names
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Definition) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn insert_item(&self, name: String, item: Item) -> Result<&Self> {
        let mut items = self.inner.items.write();

        if items.contains_key(&name) && !self.settings().allow_item_override {
            return Err(WarrenError::Configuration(ConfigurationError::DuplicateItem {
                definition: self.name().to_string(),
                name,
            }));
        }

        debug!(
            definition = %self.name(),
            name = %name,
            kind = if item.is_resolver() { "resolver" } else { "constant" },
            "Registered item"
        );
        items.insert(name, item);
        Ok(self)
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name())
            .field("parent", &self.parent().map(Definition::name))
            .field("items", &self.own_item_names())
            .finish()
    }
}
