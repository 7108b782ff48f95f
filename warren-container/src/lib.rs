//! Core container implementation for Warren DI.

pub mod container;
pub mod definition;
pub mod error;
pub mod injectable;
pub mod item;
pub mod provider;
pub mod registry;
pub mod value;

pub use container::{Container, prelude};
pub use definition::Definition;
pub use error::{BoxError, Result, WarrenError};
pub use injectable::{Injectable, Invocation, Outcome, Overrides};
pub use item::{Actions, Item, Resolver};
pub use provider::Module;
pub use registry::{Registry, RegistrySettings};
pub use value::{FromValue, Value};
