//! Dispatch module - routing values to handlers by their concrete type.
//!
//! Provides:
//! - [`Handler`] / [`Middleware`] - typed handler and registration-time middleware
//! - [`DispatchMiddleware`] - cross-cutting middleware applied per dispatch call
//! - [`Dispatcher`] - read capability shared by mutable and sealed registries
//! - [`DispatchRegistry`] / [`SealedDispatchRegistry`] - the registries
//!
//! # Resolution
//!
//! A value is routed by its [`TypeKey`]. When no handler matches exactly and
//! the value is a `Box<T>` or `Arc<T>`, the handler for `T` is called with
//! the pointee. The opposite direction never falls back: a handler registered
//! for `Arc<T>` is not reachable with a bare `T`.
//!
//! # Middleware order
//!
//! Both tiers run outermost-first: the first middleware in a list is entered
//! first and left last, the last one sits right around the handler.
//!
//! # Example
//!
//! ```
//! use typemux::{Context, DispatchRegistry, Dispatcher, Middleware};
//!
//! struct UserCreated {
//!     name: String,
//! }
//!
//! let registry = DispatchRegistry::new();
//! registry.register_with(
//!     |_ctx, event: &UserCreated| {
//!         println!("User created: {}", event.name);
//!         Ok(())
//!     },
//!     [Middleware::guard(|_ctx, event: &UserCreated| Ok(!event.name.is_empty()))],
//! );
//!
//! let event = UserCreated { name: "Alice".into() };
//! registry.dispatch(&Context::new(), &event, &[]).unwrap();
//! ```

mod registry;

pub use registry::{DispatchRegistry, SealedDispatchRegistry};

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::key::{AnyRef, AnyValue, PointerTarget, TypeKey};

/// Typed handler for values of type `T`.
pub type Handler<T> = Arc<dyn Fn(&Context, &T) -> Result<()> + Send + Sync>;

/// Remainder of a typed middleware chain.
pub type Next<'a, T> = &'a (dyn Fn(&Context, &T) -> Result<()> + Send + Sync);

/// Remainder of a cross-cutting middleware chain.
pub type DispatchNext<'a> = &'a dyn Fn(&Context) -> Result<()>;

/// Typed middleware, bound to a handler when it is registered.
///
/// A middleware receives the value and the rest of the chain. It may run code
/// before and after calling `next`, hand a different context down, or return
/// without calling `next` at all.
pub struct Middleware<T> {
    inner: Arc<dyn Fn(&Context, &T, Next<'_, T>) -> Result<()> + Send + Sync>,
}

impl<T: 'static> Middleware<T> {
    /// Create middleware from a function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context, &T, Next<'_, T>) -> Result<()> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Create middleware from a check that decides whether the chain goes on.
    ///
    /// `Ok(true)` continues to the next link, `Ok(false)` stops with success,
    /// `Err` stops with that error.
    pub fn guard<F>(check: F) -> Self
    where
        F: Fn(&Context, &T) -> Result<bool> + Send + Sync + 'static,
    {
        Self::new(move |ctx, value, next| {
            if check(ctx, value)? {
                next(ctx, value)
            } else {
                Ok(())
            }
        })
    }

    #[inline]
    fn call(&self, ctx: &Context, value: &T, next: Next<'_, T>) -> Result<()> {
        (self.inner)(ctx, value, next)
    }
}

impl<T> Clone for Middleware<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Middleware<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("type", &type_name::<T>())
            .finish_non_exhaustive()
    }
}

/// Cross-cutting middleware, supplied at dispatch time.
///
/// Sees the value only as an [`Event`], so the same middleware applies to
/// every registered type.
#[derive(Clone)]
pub struct DispatchMiddleware {
    inner: Arc<dyn Fn(&Context, &Event<'_>, DispatchNext<'_>) -> Result<()> + Send + Sync>,
}

impl DispatchMiddleware {
    /// Create middleware from a function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context, &Event<'_>, DispatchNext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    #[inline]
    fn call(&self, ctx: &Context, event: &Event<'_>, next: DispatchNext<'_>) -> Result<()> {
        (self.inner)(ctx, event, next)
    }
}

impl fmt::Debug for DispatchMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchMiddleware").finish_non_exhaustive()
    }
}

/// A value on its way to a handler, together with its type identity.
#[derive(Clone, Copy)]
pub struct Event<'a> {
    key: TypeKey,
    value: AnyRef<'a>,
}

impl<'a> Event<'a> {
    /// Borrow `value` as an event.
    ///
    /// An [`AnyValue`] is unwrapped: the event is the value it holds.
    pub fn new<V: Any + Send + Sync>(value: &'a V) -> Self {
        let erased: AnyRef<'a> = value;
        match erased.downcast_ref::<AnyValue>() {
            Some(inner) => Self::erased(inner.type_key(), inner.as_any()),
            None => Self::erased(TypeKey::of::<V>(), erased),
        }
    }

    fn erased(key: TypeKey, value: AnyRef<'a>) -> Self {
        Self { key, value }
    }

    /// Type identity of the value.
    #[inline]
    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    /// Type name of the value.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.key.name()
    }

    /// Borrow the value as `T`.
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&'a T> {
        self.value.downcast_ref::<T>()
    }

    /// Borrow the value, erased.
    #[inline]
    pub fn as_any(&self) -> AnyRef<'a> {
        self.value
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.key.name())
            .finish_non_exhaustive()
    }
}

/// Type-erased handler as stored in a registry.
type ErasedHandler = Arc<dyn Fn(&Context, &Event<'_>) -> Result<()> + Send + Sync>;

/// A typed handler bound to its middleware and erased, ready to be stored.
///
/// Building an entry is pure composition; nothing is invoked.
#[derive(Clone)]
pub struct HandlerEntry {
    key: TypeKey,
    handler: ErasedHandler,
    pointers: [PointerTarget; 2],
}

impl HandlerEntry {
    /// Bind `handler` for values of type `T`, wrapped by `middleware`.
    ///
    /// The last middleware in the list ends up innermost.
    pub fn new<T, I>(handler: Handler<T>, middleware: I) -> Self
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = Middleware<T>>,
        I::IntoIter: DoubleEndedIterator,
    {
        let typed = apply_middleware(handler, middleware);
        Self {
            key: TypeKey::of::<T>(),
            handler: erase(typed),
            pointers: PointerTarget::all_for::<T>(),
        }
    }

    /// Type this entry handles.
    #[inline]
    pub fn type_key(&self) -> TypeKey {
        self.key
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("type", &self.key)
            .finish_non_exhaustive()
    }
}

fn apply_middleware<T, I>(base: Handler<T>, middleware: I) -> Handler<T>
where
    T: Any + Send + Sync,
    I: IntoIterator<Item = Middleware<T>>,
    I::IntoIter: DoubleEndedIterator,
{
    middleware.into_iter().rev().fold(base, |next, mw| {
        let wrapped: Handler<T> =
            Arc::new(move |ctx: &Context, value: &T| mw.call(ctx, value, &*next));
        wrapped
    })
}

fn erase<T: Any + Send + Sync>(handler: Handler<T>) -> ErasedHandler {
    Arc::new(move |ctx, event| match event.downcast_ref::<T>() {
        Some(value) => handler(ctx, value),
        None => Err(Error::DataTypeNotSupported {
            expected: type_name::<T>(),
            actual: event.type_name(),
        }),
    })
}

/// Handler map plus the pointer relations of every registered type.
#[derive(Clone, Default)]
pub(crate) struct HandlerTable {
    handlers: HashMap<TypeKey, ErasedHandler>,
    pointers: HashMap<TypeKey, PointerTarget>,
}

impl HandlerTable {
    /// Insert an entry, replacing any previous handler for the same type.
    /// Returns true if a handler was replaced.
    pub(crate) fn insert(&mut self, entry: HandlerEntry) -> bool {
        for ptr in entry.pointers {
            self.pointers.insert(ptr.pointer(), ptr);
        }
        self.handlers.insert(entry.key, entry.handler).is_some()
    }

    /// Find the handler for `event`, following one pointer level if needed.
    ///
    /// On fallback the returned event is the pointee.
    pub(crate) fn resolve<'s, 'a>(
        &'s self,
        event: Event<'a>,
    ) -> Result<(&'s ErasedHandler, Event<'a>)> {
        if let Some(handler) = self.handlers.get(&event.key) {
            return Ok((handler, event));
        }

        if let Some(ptr) = self.pointers.get(&event.key) {
            if let Some(handler) = self.handlers.get(&ptr.target()) {
                if let Some(inner) = ptr.deref(event.value) {
                    return Ok((handler, Event::erased(ptr.target(), inner)));
                }
            }
        }

        Err(Error::HandlerNotFound(event.key))
    }

    /// Record a pointer relation. Returns true if one was already recorded
    /// for the same pointer type.
    pub(crate) fn insert_pointer(&mut self, ptr: PointerTarget) -> bool {
        self.pointers.insert(ptr.pointer(), ptr).is_some()
    }

    /// Pointee of `key`, if `key` is a known pointer type.
    pub(crate) fn pointer_target(&self, key: &TypeKey) -> Option<PointerTarget> {
        self.pointers.get(key).copied()
    }

    pub(crate) fn contains(&self, key: &TypeKey) -> bool {
        self.handlers.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }
}

/// Read side of a dispatch registry.
///
/// Implemented by the mutable and the sealed registries alike, so code that
/// only dispatches can take either.
pub trait Dispatcher {
    /// Resolve the handler for `event` and invoke it.
    ///
    /// This is the bare call without cross-cutting middleware; most callers
    /// want [`Dispatcher::dispatch`].
    fn call(&self, ctx: &Context, event: Event<'_>) -> Result<()>;

    /// Pointee of `key` if `key` is a pointer type that can fall back to a
    /// registered handler.
    fn pointer_target(&self, key: &TypeKey) -> Option<PointerTarget>;

    /// Dispatch an already-built [`Event`] through `middleware`.
    fn dispatch_event(
        &self,
        ctx: &Context,
        event: Event<'_>,
        middleware: &[DispatchMiddleware],
    ) -> Result<()> {
        if middleware.is_empty() {
            return self.call(ctx, event);
        }
        run_chain(middleware, ctx, &event, &|ctx: &Context| self.call(ctx, event))
    }

    /// Dispatch `value` to the handler registered for its type.
    ///
    /// `middleware` runs outermost-first around the handler (and around its
    /// registration-time middleware). Returns [`Error::HandlerNotFound`] if
    /// no handler matches, or whatever error the chain produced.
    fn dispatch<V>(&self, ctx: &Context, value: &V, middleware: &[DispatchMiddleware]) -> Result<()>
    where
        V: Any + Send + Sync,
        Self: Sized,
    {
        self.dispatch_event(ctx, Event::new(value), middleware)
    }
}

fn run_chain(
    chain: &[DispatchMiddleware],
    ctx: &Context,
    event: &Event<'_>,
    last: DispatchNext<'_>,
) -> Result<()> {
    match chain.split_first() {
        None => last(ctx),
        Some((outer, rest)) => outer.call(ctx, event, &|ctx: &Context| {
            run_chain(rest, ctx, event, last)
        }),
    }
}
