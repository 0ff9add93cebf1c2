//! Context passed through dispatch to middleware and handlers.
//!
//! The registries never look inside a [`Context`]. It carries whatever the
//! caller wants its handlers to see: request-scoped values, deadlines, a
//! cancellation flag, a database handle.
//!
//! # Example
//!
//! ```
//! use typemux::Context;
//!
//! struct RequestId(u64);
//!
//! let ctx = Context::new().with_value(RequestId(42));
//! assert_eq!(ctx.value::<RequestId>().map(|r| r.0), Some(42));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Immutable bag of values keyed by their type.
///
/// `Context` is cheap to clone and safe to share across threads. Adding a
/// value with [`Context::with_value`] returns a new context and leaves the
/// original untouched, so middleware can hand an enriched context down the
/// chain without affecting the caller.
#[derive(Clone, Default)]
pub struct Context {
    values: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this context that also holds `value`.
    ///
    /// A value of the same type already present is shadowed in the copy.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        let mut values = HashMap::clone(&self.values);
        values.insert(TypeId::of::<T>(), Arc::new(value));
        Self {
            values: Arc::new(values),
        }
    }

    /// Get the value of type `T`, if present.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.as_ref().downcast_ref::<T>())
    }

    /// Returns true if a value of type `T` is present.
    #[inline]
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    /// Number of values held.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the context holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("values", &self.values.len())
            .finish()
    }
}
