//! Definition registry: owns every named definition.
//!
//! The registry enforces global uniqueness of definition names, resolves
//! parent names when defining children, and creates root containers.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use tracing::{debug, info};
use warren_support::rendering::suggest_similar;

use crate::container::Container;
use crate::definition::Definition;
use crate::error::{ConfigurationError, Result, WarrenError};

/// Behaviour switches shared by every definition and container of a registry.
///
/// Deserializable so hosts can carry it in their own configuration files.
///
/// ```
/// use warren_container::registry::RegistrySettings;
///
/// let settings = RegistrySettings::default().single_flight(false);
/// assert!(!settings.single_flight);
/// assert!(!settings.allow_item_override);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Coalesce concurrent resolutions of the same unresolved instance.
    ///
    /// When disabled, every concurrent caller runs `create` and the last
    /// write to the instance slot wins.
    pub single_flight: bool,
    /// Let a definition re-register one of its own names, replacing the item.
    pub allow_item_override: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            single_flight: true,
            allow_item_override: false,
        }
    }
}

impl RegistrySettings {
    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    pub fn allow_item_override(mut self, allow: bool) -> Self {
        self.allow_item_override = allow;
        self
    }
}

/// Stores all definitions by name. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    definitions: DashMap<String, Definition>,
    settings: RegistrySettings,
}

impl Registry {
    /// Creates an empty registry with default settings.
    pub fn new() -> Self {
        Self::with_settings(RegistrySettings::default())
    }

    pub fn with_settings(settings: RegistrySettings) -> Self {
        info!(?settings, "Creating definition registry");
        Self {
            inner: Arc::new(RegistryInner {
                definitions: DashMap::new(),
                settings,
            }),
        }
    }

    pub(crate) fn upgrade(inner: &Weak<RegistryInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    #[inline]
    pub fn settings(&self) -> &RegistrySettings {
        &self.inner.settings
    }

    /// Creates a definition, optionally as a child of `parent`.
    ///
    /// # Errors
    /// - [`ConfigurationError::UnknownDefinition`] if `parent` is not registered
    /// - [`ConfigurationError::DuplicateDefinition`] if `name` is taken
    pub fn define(&self, name: impl Into<String>, parent: Option<&str>) -> Result<Definition> {
        let name = name.into();

        // Parent first: holding the entry lock while reading another key can
        // deadlock when both keys share a shard.
        let parent = parent.map(|parent| self.get_definition(parent)).transpose()?;

        match self.inner.definitions.entry(name) {
            Entry::Occupied(entry) => Err(WarrenError::Configuration(
                ConfigurationError::DuplicateDefinition {
                    name: entry.key().clone(),
                },
            )),
            Entry::Vacant(entry) => {
                let definition = Definition::new(
                    entry.key().clone(),
                    parent,
                    Arc::downgrade(&self.inner),
                    self.inner.settings,
                );
                info!(
                    definition = %definition.name(),
                    parent = definition.parent().map(Definition::name),
                    "Defined scope"
                );
                entry.insert(definition.clone());
                Ok(definition)
            }
        }
    }

    /// Fetches a definition by name.
    pub fn get_definition(&self, name: &str) -> Result<Definition> {
        if let Some(definition) = self.inner.definitions.get(name) {
            return Ok(definition.value().clone());
        }

        let known = self.definitions();
        Err(WarrenError::Configuration(ConfigurationError::UnknownDefinition {
            name: name.to_string(),
            suggestions: suggest_similar(name, &known, 3),
        }))
    }

    /// Creates a parentless container bound to the root definition `name`.
    ///
    /// # Errors
    /// [`ConfigurationError::RootHasParent`] if the definition has a parent.
    pub fn create_root(&self, name: &str) -> Result<Container> {
        let definition = self.get_definition(name)?;

        if let Some(parent) = definition.parent() {
            return Err(WarrenError::Configuration(ConfigurationError::RootHasParent {
                name: name.to_string(),
                parent: parent.name().to_string(),
            }));
        }

        debug!(definition = %name, "Creating root container");
        Ok(Container::new(self.clone(), definition, None))
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.definitions.contains_key(name)
    }

    /// Registered definition names, sorted.
    pub fn definitions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .definitions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.definitions.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("definitions", &self.definitions())
            .field("settings", &self.inner.settings)
            .finish()
    }
}
