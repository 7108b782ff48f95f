//! Error types for Warren container operations.
//!
//! Registration mistakes surface as [`ConfigurationError`], container trees
//! that do not mirror their definitions as [`MismatchError`], and unknown
//! names as [`NotFoundError`]. Failures raised by user factories are carried
//! through untouched in [`WarrenError::User`].

use std::fmt;

use warren_support::rendering::render_chain;

/// Boxed error produced by user factories and actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Warren operations.
#[derive(Debug, thiserror::Error)]
pub enum WarrenError {
    /// Invalid registration: duplicate names, unknown parents, missing `create`.
    #[error("{}", .0)]
    Configuration(ConfigurationError),

    /// A container was created under a parent bound to the wrong definition.
    #[error("{}", .0)]
    Mismatch(MismatchError),

    /// Name absent from both the instance chain and the item chain.
    #[error("{}", .0)]
    NotFound(NotFoundError),

    /// A resolved value could not be viewed as the requested type.
    #[error("Type mismatch for {name:?}: expected {expected}")]
    TypeMismatch { name: String, expected: String },

    /// A `create` or action callable failed.
    #[error(transparent)]
    User(BoxError),

    /// A broadcast action task panicked or was aborted before settling.
    #[error("Action {action:?} on {name:?} did not settle: the task was aborted")]
    ActionAborted { action: String, name: String },
}

impl WarrenError {
    /// Wraps a user failure, leaving an existing `WarrenError` as is.
    pub fn user(error: impl Into<BoxError>) -> Self {
        let error = error.into();
        match error.downcast::<WarrenError>() {
            Ok(inner) => *inner,
            Err(other) => WarrenError::User(other),
        }
    }

    /// Returns the user failure, if this error carries one.
    pub fn as_user(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            WarrenError::User(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WarrenError::NotFound(_))
    }
}

/// Registration-time failures.
#[derive(Debug)]
pub enum ConfigurationError {
    DuplicateDefinition {
        name: String,
    },
    UnknownDefinition {
        name: String,
        suggestions: Vec<String>,
    },
    DuplicateItem {
        definition: String,
        name: String,
    },
    MissingCreate {
        name: String,
    },
    RootHasParent {
        name: String,
        parent: String,
    },
    RegistryDropped {
        definition: String,
    },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::DuplicateDefinition { name } => {
                write!(f, "Definition name is not unique: {name:?}")
            }
            ConfigurationError::UnknownDefinition { name, suggestions } => {
                write!(f, "Unknown definition: {name:?}")?;
                write_suggestions(f, suggestions)
            }
            ConfigurationError::DuplicateItem { definition, name } => {
                write!(
                    f,
                    "Item {name:?} is already registered in definition {definition:?}"
                )?;
                write!(
                    f,
                    "\n  Hint: Register it in a child definition to shadow it instead"
                )
            }
            ConfigurationError::MissingCreate { name } => {
                write!(f, "Resolver {name:?} has no \"create\" action")
            }
            ConfigurationError::RootHasParent { name, parent } => {
                write!(
                    f,
                    "Definition {name:?} has parent {parent:?} and cannot back a root container"
                )?;
                write!(f, "\n  Hint: Create it with .create_child() on a {parent:?} container")
            }
            ConfigurationError::RegistryDropped { definition } => {
                write!(f, "The registry owning definition {definition:?} has been dropped")
            }
        }
    }
}

/// Container/definition parent relationship violated.
#[derive(Debug)]
pub struct MismatchError {
    /// The definition the new container was asked to bind.
    pub requested: String,
    /// Definition of the container `create_child` was called on.
    pub expected_parent: String,
    /// The requested definition's actual parent, if any.
    pub actual_parent: Option<String>,
}

impl fmt::Display for MismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Definition does not match parent: {:?} cannot be a child of a {:?} container",
            self.requested, self.expected_parent,
        )?;
        match self.actual_parent {
            Some(ref parent) => write!(f, "\n  Its parent definition is {parent:?}"),
            None => write!(f, "\n  It is a root definition; use Registry::create_root()"),
        }
    }
}

/// Error when a name resolves nowhere in the scope chain.
#[derive(Debug)]
pub struct NotFoundError {
    /// The requested name.
    pub name: String,
    /// Definition names searched, innermost first.
    pub scope_path: Vec<String>,
    /// Close names that are registered somewhere in the chain.
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not resolve instance with name: {:?}", self.name)?;

        if !self.scope_path.is_empty() {
            write!(f, "\n  Searched: {}", render_chain(&self.scope_path))?;
        }

        write_suggestions(f, &self.suggestions)
    }
}

fn write_suggestions(f: &mut fmt::Formatter<'_>, suggestions: &[String]) -> fmt::Result {
    if !suggestions.is_empty() {
        write!(f, "\n  Did you mean one of:")?;
        for suggestion in suggestions {
            write!(f, "\n    - {suggestion}")?;
        }
    }
    Ok(())
}

/// Convenient Result type for Warren operations.
pub type Result<T> = std::result::Result<T, WarrenError>;
