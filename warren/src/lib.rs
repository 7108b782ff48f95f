//! # Warren: hierarchical dependency injection for Rust
//!
//! Declare named scopes (definitions) in a tree, register constants and
//! resolvers in each, then create containers mirroring the tree at runtime.
//! Resolving a name walks up the scope chain, memoizes resolver results at
//! the level that defines them, and fills each factory's arguments by
//! matching its declared dependency names.
//!
//! ```rust
//! use std::convert::Infallible;
//! use std::result::Result;
//! use std::sync::Arc;
//! use warren::prelude::*;
//! use warren::injectable;
//!
//! struct RootInst { name: &'static str }
//! struct DepTester { b: Arc<RootInst> }
//!
//! #[injectable]
//! fn create_dep_tester(#[inject(name = "rootInst")] root: Arc<RootInst>) -> Result<DepTester, Infallible> {
//!     Ok(DepTester { b: root })
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let registry = Registry::new();
//! registry.define("global", None)?.constant("rootInst", RootInst { name: "rootInst" })?;
//! registry.define("request", Some("global"))?.resolver("depTester", create_dep_tester())?;
//!
//! let request = registry.create_root("global")?.create_child("request")?;
//! let dep: Arc<DepTester> = request.resolve_as("depTester").await?;
//! assert_eq!(dep.b.name, "rootInst");
//! # Ok::<(), WarrenError>(())
//! # }).unwrap();
//! ```

pub use warren_container::*;
pub use warren_macros::*;
pub use warren_support::*;
