//! Procedural macros for Warren DI.
//!
//! [`macro@injectable`] turns a function into a Warren `Injectable`, taking its
//! dependency names from the parameter names at compile time.

use proc_macro::TokenStream;
use syn::{ItemFn, parse_macro_input};

mod injectable;

/// Turns a function into a factory for a Warren `Injectable`.
///
/// Each parameter becomes a dependency named after the parameter. The
/// annotated function is replaced by a zero-argument function of the same
/// name returning the `Injectable`. `async fn`s become suspending callables.
///
/// Parameter attributes:
/// - `#[inject(name = "rootInst")]` resolves a different name than the identifier
/// - `#[receiver]` binds the parameter to the receiver (the instance an action runs on)
///
/// Parameter types must implement `FromValue` (`Value` or `Arc<T>`), and the
/// function must return `Result<T, E>` with `E: Into<BoxError>`.
///
/// ```rust,ignore
/// #[injectable]
/// fn create_dep_tester(#[inject(name = "rootInst")] root: Arc<Root>) -> Result<DepTester, Infallible> {
///     Ok(DepTester { b: root })
/// }
///
/// request.resolver("depTester", create_dep_tester())?;
/// ```
///
/// Use `#[injectable(krate = "my_reexport::warren")]` when the runtime crate
/// is not reachable as `::warren`.
#[proc_macro_attribute]
pub fn injectable(args: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as ItemFn);

    injectable::injectable_impl(args.into(), input).into()
}
