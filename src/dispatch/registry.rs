//! Dispatch registries: the mutable [`DispatchRegistry`] and its sealed,
//! lock-free snapshot [`SealedDispatchRegistry`].
//!
//! # Example
//!
//! ```
//! use typemux::{Context, DispatchRegistry, Dispatcher};
//!
//! let registry = DispatchRegistry::new();
//! registry.register(|_ctx, n: &u32| {
//!     assert_eq!(*n, 7);
//!     Ok(())
//! });
//!
//! let sealed = registry.seal();
//! sealed.dispatch(&Context::new(), &7u32, &[]).unwrap();
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Dispatcher, Event, Handler, HandlerEntry, HandlerTable, Middleware};
use crate::context::Context;
use crate::error::Result;
use crate::key::{Pointer, PointerTarget, TypeKey};

/// Thread-safe registry of typed handlers.
///
/// Reads (dispatch) share a read lock, registration takes the write lock.
/// The lock is only held for the map access itself; handlers run unlocked,
/// so a handler may register further handlers without deadlocking.
#[derive(Default)]
pub struct DispatchRegistry {
    table: RwLock<HandlerTable>,
}

impl DispatchRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for values of type `T`.
    ///
    /// A handler already registered for `T` is replaced.
    pub fn register<T, F>(&self, handler: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Context, &T) -> Result<()> + Send + Sync + 'static,
    {
        self.register_with(handler, []);
    }

    /// Register a handler for values of type `T`, wrapped by `middleware`.
    ///
    /// The first middleware is outermost, the last one runs right before the
    /// handler. A handler already registered for `T` is replaced together
    /// with its middleware.
    pub fn register_with<T, F, I>(&self, handler: F, middleware: I)
    where
        T: Any + Send + Sync,
        F: Fn(&Context, &T) -> Result<()> + Send + Sync + 'static,
        I: IntoIterator<Item = Middleware<T>>,
        I::IntoIter: DoubleEndedIterator,
    {
        let handler: Handler<T> = Arc::new(handler);
        self.insert(HandlerEntry::new(handler, middleware));
    }

    /// Let values of pointer type `P` fall back to the handler for
    /// `P::Target`.
    ///
    /// `Box<T>` and `Arc<T>` need no registration. The relation may be
    /// registered before or after the handler for the target.
    pub fn register_pointer<P: Pointer>(&self) {
        let ptr = PointerTarget::of::<P>();
        if !self.table.write().insert_pointer(ptr) {
            tracing::trace!("Registered pointer {} -> {}", ptr.pointer(), ptr.target());
        }
    }

    /// Store a prebuilt entry.
    pub fn insert(&self, entry: HandlerEntry) {
        let key = entry.type_key();
        let replaced = self.table.write().insert(entry);

        if replaced {
            tracing::debug!("Replaced handler for {}", key);
        } else {
            tracing::trace!("Registered handler for {}", key);
        }
    }

    /// Returns true if a handler is registered for exactly `T`.
    pub fn contains<T: Any>(&self) -> bool {
        self.table.read().contains(&TypeKey::of::<T>())
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Returns true if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take a point-in-time snapshot that needs no locking.
    ///
    /// Handlers registered on `self` afterwards are not visible in the
    /// snapshot.
    pub fn seal(&self) -> SealedDispatchRegistry {
        let table = self.table.read().clone();
        tracing::debug!("Sealed dispatch registry with {} handlers", table.len());
        SealedDispatchRegistry { table }
    }
}

impl Dispatcher for DispatchRegistry {
    fn call(&self, ctx: &Context, event: Event<'_>) -> Result<()> {
        let (handler, event) = {
            let table = self.table.read();
            let (handler, event) = table.resolve(event)?;
            (Arc::clone(handler), event)
        };
        handler(ctx, &event)
    }

    fn pointer_target(&self, key: &TypeKey) -> Option<PointerTarget> {
        self.table.read().pointer_target(key)
    }
}

impl fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}

/// Immutable snapshot of a [`DispatchRegistry`].
///
/// Holds no lock: every operation is a plain read of a map nobody writes to.
/// Share it behind an `Arc` for unbounded concurrent dispatch.
pub struct SealedDispatchRegistry {
    table: HandlerTable,
}

impl SealedDispatchRegistry {
    /// Returns true if a handler is registered for exactly `T`.
    pub fn contains<T: Any>(&self) -> bool {
        self.table.contains(&TypeKey::of::<T>())
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Dispatcher for SealedDispatchRegistry {
    #[inline]
    fn call(&self, ctx: &Context, event: Event<'_>) -> Result<()> {
        let (handler, event) = self.table.resolve(event)?;
        handler(ctx, &event)
    }

    fn pointer_target(&self, key: &TypeKey) -> Option<PointerTarget> {
        self.table.pointer_target(key)
    }
}

impl fmt::Debug for SealedDispatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedDispatchRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}
