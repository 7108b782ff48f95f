//! Type-erased values stored in definitions and containers.
//!
//! Everything a container hands out is a [`Value`]: a shared handle to
//! some `Any + Send + Sync` payload. Two values are "the same instance"
//! when they point at the same allocation, see [`Value::ptr_eq`].

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use warren_support::rendering::shorten_type_name;

use crate::error::{Result, WarrenError};

/// A cheaply-clonable, type-erased shared value.
///
/// # Examples
/// ```
/// use warren_container::value::Value;
///
/// let value = Value::new(String::from("postgres://localhost"));
/// let url = value.downcast::<String>().unwrap();
/// assert_eq!(url.as_str(), "postgres://localhost");
/// assert!(value.ptr_eq(&value.clone()));
/// ```
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wraps `value` in a new shared allocation.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Shares an existing allocation; identity is preserved.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_name: type_name::<T>(),
        }
    }

    /// Returns the payload as `Arc<T>`, or `None` if it holds another type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    /// Borrows the payload as `&T`.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    #[inline]
    pub fn is<T: Any + Send + Sync>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// `true` if both handles point at the same instance.
    #[inline]
    pub fn ptr_eq(&self, other: &Value) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }

    /// Name of the payload type, as recorded at construction.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", shorten_type_name(self.type_name))
    }
}

/// Conversion from a resolved [`Value`] into an argument type.
///
/// Implemented for [`Value`] itself and for `Arc<T>`. The `name` is the
/// dependency being converted and only feeds error messages.
pub trait FromValue: Sized {
    fn from_value(name: &str, value: &Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(_name: &str, value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl<T: Any + Send + Sync> FromValue for Arc<T> {
    fn from_value(name: &str, value: &Value) -> Result<Self> {
        value.downcast::<T>().ok_or_else(|| WarrenError::TypeMismatch {
            name: name.to_string(),
            expected: format!(
                "{} (found {})",
                shorten_type_name(type_name::<T>()),
                shorten_type_name(value.type_name()),
            ),
        })
    }
}

impl<T: Any + Send + Sync> From<Arc<T>> for Value {
    fn from(value: Arc<T>) -> Self {
        Value::from_arc(value)
    }
}
