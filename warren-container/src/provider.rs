//! Modules: groups of related registrations.
//!
//! A module registers a coherent set of constants and resolvers into a
//! definition, much like a service provider in other IoC containers.
//!
//! # Examples
//! ```rust,ignore
//! struct MailModule;
//!
//! impl Module for MailModule {
//!     fn register(&self, definition: &Definition) -> Result<()> {
//!         definition.constant("smtpHost", "localhost")?;
//!         definition.resolver("mailer", create_mailer())?;
//!         Ok(())
//!     }
//! }
//!
//! registry.define("global", None)?.install(&MailModule)?;
//! ```

use crate::definition::Definition;
use crate::error::Result;

/// A set of registrations applied to one definition.
///
/// Split registrations by concern so each module can be installed (and
/// tested) on its own:
///
/// ```rust,ignore
/// global.install(&DatabaseModule)?;
/// global.install(&MailModule)?;
/// request.install(&SessionModule)?;
/// ```
pub trait Module: Send + Sync {
    /// Registers items into `definition`.
    ///
    /// Stops at the first failing registration; items already added stay.
    fn register(&self, definition: &Definition) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
