//! Composite registry holding both handlers and factories.
//!
//! [`Registry`] pairs a [`DispatchRegistry`] with a [`FactoryRegistry`] and
//! delegates to them; the two halves know nothing of each other.
//! [`Registry::seal`] seals both and returns a [`SealedRegistry`].
//!
//! The [`RegistryBuilder`] provides a fluent API for wiring everything up
//! front.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use serde::Deserialize;
//! use typemux::{Context, Registry, Router};
//!
//! #[derive(Deserialize)]
//! struct UserCreated {
//!     name: String,
//! }
//!
//! let registry = Registry::builder()
//!     .json_factory::<UserCreated, _>("user_created")
//!     .handle(|_ctx, e: &UserCreated| {
//!         println!("User created: {}", e.name);
//!         Ok(())
//!     })
//!     .seal();
//!
//! let data = Bytes::from_static(br#"{"name":"Alice"}"#);
//! registry.route(&Context::new(), &"user_created", data, &[]).unwrap();
//! ```

use std::any::Any;
use std::fmt;
use std::hash::Hash;

use serde::de::DeserializeOwned;

use crate::codec::{json_factory, msgpack_factory};
use crate::context::Context;
use crate::dispatch::{
    DispatchMiddleware, DispatchRegistry, Dispatcher, Event, Middleware, SealedDispatchRegistry,
};
use crate::error::Result;
use crate::factory::{Data, FactoryRegistry, FactoryResolver, KeyRef, SealedFactoryRegistry};
use crate::key::{AnyValue, Pointer, PointerTarget, TypeKey};

/// Mutable registry of handlers and factories.
#[derive(Debug, Default)]
pub struct Registry {
    dispatch: DispatchRegistry,
    factory: FactoryRegistry,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Register a handler for values of type `T`. See
    /// [`DispatchRegistry::register`].
    pub fn register<T, F>(&self, handler: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Context, &T) -> Result<()> + Send + Sync + 'static,
    {
        self.dispatch.register(handler);
    }

    /// Register a handler with typed middleware. See
    /// [`DispatchRegistry::register_with`].
    pub fn register_with<T, F, I>(&self, handler: F, middleware: I)
    where
        T: Any + Send + Sync,
        F: Fn(&Context, &T) -> Result<()> + Send + Sync + 'static,
        I: IntoIterator<Item = Middleware<T>>,
        I::IntoIter: DoubleEndedIterator,
    {
        self.dispatch.register_with(handler, middleware);
    }

    /// Let values of pointer type `P` fall back to the handler for
    /// `P::Target`. See [`DispatchRegistry::register_pointer`].
    pub fn register_pointer<P: Pointer>(&self) {
        self.dispatch.register_pointer::<P>();
    }

    /// Register a factory under `key`. See [`FactoryRegistry::register`].
    pub fn register_factory<K, D, T, F>(&self, key: K, ctor: F)
    where
        K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
        D: Any + Send,
        T: Any + Send + Sync,
        F: Fn(D) -> Result<T> + Send + Sync + 'static,
    {
        self.factory.register(key, ctor);
    }

    /// The dispatch half.
    pub fn dispatcher(&self) -> &DispatchRegistry {
        &self.dispatch
    }

    /// The factory half.
    pub fn factories(&self) -> &FactoryRegistry {
        &self.factory
    }

    /// Seal both halves into a lock-free snapshot.
    pub fn seal(&self) -> SealedRegistry {
        SealedRegistry {
            dispatch: self.dispatch.seal(),
            factory: self.factory.seal(),
        }
    }
}

impl Dispatcher for Registry {
    #[inline]
    fn call(&self, ctx: &Context, event: Event<'_>) -> Result<()> {
        self.dispatch.call(ctx, event)
    }

    fn pointer_target(&self, key: &TypeKey) -> Option<PointerTarget> {
        self.dispatch.pointer_target(key)
    }
}

impl FactoryResolver for Registry {
    #[inline]
    fn create_erased(&self, key: KeyRef<'_>, data: Data) -> Result<AnyValue> {
        self.factory.create_erased(key, data)
    }

    fn contains_erased(&self, key: KeyRef<'_>) -> bool {
        self.factory.contains_erased(key)
    }
}

/// Immutable snapshot of a [`Registry`], safe for concurrent use with no
/// lock overhead.
#[derive(Debug)]
pub struct SealedRegistry {
    dispatch: SealedDispatchRegistry,
    factory: SealedFactoryRegistry,
}

impl SealedRegistry {
    /// The dispatch half.
    pub fn dispatcher(&self) -> &SealedDispatchRegistry {
        &self.dispatch
    }

    /// The factory half.
    pub fn factories(&self) -> &SealedFactoryRegistry {
        &self.factory
    }
}

impl Dispatcher for SealedRegistry {
    #[inline]
    fn call(&self, ctx: &Context, event: Event<'_>) -> Result<()> {
        self.dispatch.call(ctx, event)
    }

    fn pointer_target(&self, key: &TypeKey) -> Option<PointerTarget> {
        self.dispatch.pointer_target(key)
    }
}

impl FactoryResolver for SealedRegistry {
    #[inline]
    fn create_erased(&self, key: KeyRef<'_>, data: Data) -> Result<AnyValue> {
        self.factory.create_erased(key, data)
    }

    fn contains_erased(&self, key: KeyRef<'_>) -> bool {
        self.factory.contains_erased(key)
    }
}

/// Create-then-dispatch, for anything that can do both.
pub trait Router: Dispatcher + FactoryResolver {
    /// Build a value from `data` with the factory under `key`, then dispatch
    /// it through `middleware`.
    ///
    /// Errors from either step are returned unchanged.
    fn route<K, D>(
        &self,
        ctx: &Context,
        key: &K,
        data: D,
        middleware: &[DispatchMiddleware],
    ) -> Result<()>
    where
        K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
        D: Any + Send,
        Self: Sized,
    {
        let value = self.create(key, data)?;
        self.dispatch(ctx, &value, middleware)
    }
}

impl<R: Dispatcher + FactoryResolver> Router for R {}

/// Builder for configuring a [`Registry`].
///
/// Use the fluent API to register handlers and factories, then call
/// [`build`](Self::build) for a mutable registry or [`seal`](Self::seal) for
/// a sealed one.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for values of type `T`.
    pub fn handle<T, F>(self, handler: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Context, &T) -> Result<()> + Send + Sync + 'static,
    {
        self.registry.register(handler);
        self
    }

    /// Register a handler for values of type `T` wrapped by `middleware`.
    pub fn handle_with<T, F, I>(self, handler: F, middleware: I) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Context, &T) -> Result<()> + Send + Sync + 'static,
        I: IntoIterator<Item = Middleware<T>>,
        I::IntoIter: DoubleEndedIterator,
    {
        self.registry.register_with(handler, middleware);
        self
    }

    /// Let values of pointer type `P` reach the handler for `P::Target`.
    pub fn pointer<P: Pointer>(self) -> Self {
        self.registry.register_pointer::<P>();
        self
    }

    /// Register a factory under `key`.
    pub fn factory<K, D, T, F>(self, key: K, ctor: F) -> Self
    where
        K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
        D: Any + Send,
        T: Any + Send + Sync,
        F: Fn(D) -> Result<T> + Send + Sync + 'static,
    {
        self.registry.register_factory(key, ctor);
        self
    }

    /// Register a factory decoding JSON payloads into `T` under `key`.
    pub fn json_factory<T, K>(self, key: K) -> Self
    where
        T: DeserializeOwned + Any + Send + Sync,
        K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    {
        self.factory(key, json_factory::<T>())
    }

    /// Register a factory decoding MessagePack payloads into `T` under `key`.
    pub fn msgpack_factory<T, K>(self, key: K) -> Self
    where
        T: DeserializeOwned + Any + Send + Sync,
        K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    {
        self.factory(key, msgpack_factory::<T>())
    }

    /// Finish and return the mutable registry.
    pub fn build(self) -> Registry {
        self.registry
    }

    /// Finish and return a sealed registry.
    pub fn seal(self) -> SealedRegistry {
        self.registry.seal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Deserialize, Debug, Clone, PartialEq)]
    struct UserCreated {
        id: String,
        name: String,
    }

    #[derive(Deserialize, Debug, Clone, PartialEq)]
    struct OrderPlaced {
        order_id: String,
        amount: i64,
    }

    #[test]
    fn test_halves_are_independent() {
        let registry = Registry::new();
        registry.register(|_ctx, _e: &UserCreated| Ok(()));
        registry.register_factory("n", |d: u8| Ok(d));

        assert_eq!(registry.dispatcher().len(), 1);
        assert_eq!(registry.factories().len(), 1);

        let sealed = registry.seal();
        assert_eq!(sealed.dispatcher().len(), 1);
        assert_eq!(sealed.factories().len(), 1);
    }

    #[test]
    fn test_route_create_then_dispatch() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = out.clone();

        let registry = Registry::builder()
            .json_factory::<UserCreated, _>("user_created")
            .handle(move |_ctx, e: &UserCreated| {
                sink.lock().push(format!("User created: {}", e.name));
                Ok(())
            })
            .build();

        let data = Bytes::from_static(br#"{"id":"u1","name":"Alice"}"#);
        registry
            .route(&Context::new(), &"user_created", data.clone(), &[])
            .unwrap();
        registry
            .seal()
            .route(&Context::new(), &"user_created".to_string(), data, &[])
            .unwrap();

        assert_eq!(*out.lock(), ["User created: Alice", "User created: Alice"]);
    }

    #[test]
    fn test_route_pointer_factory_falls_back() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();

        let registry = Registry::builder()
            .json_factory::<Arc<OrderPlaced>, _>("order_placed")
            .handle(move |_ctx, e: &OrderPlaced| {
                *sink.lock() = Some(e.clone());
                Ok(())
            })
            .seal();

        let data = Bytes::from_static(br#"{"order_id":"o1","amount":100}"#);
        registry
            .route(&Context::new(), &"order_placed", data, &[])
            .unwrap();

        assert_eq!(
            *seen.lock(),
            Some(OrderPlaced {
                order_id: "o1".into(),
                amount: 100
            })
        );
    }

    #[test]
    fn test_route_constructor_returning_any_value() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let registry = Registry::new();
        registry.register_factory("dynamic", |amount: i64| {
            Ok(AnyValue::new(OrderPlaced {
                order_id: "dyn".into(),
                amount,
            }))
        });
        registry.register(move |_ctx, e: &OrderPlaced| {
            sink.lock().push(e.amount);
            Ok(())
        });

        let value = registry.create(&"dynamic", 5i64).unwrap();
        assert_eq!(value.type_key(), TypeKey::of::<OrderPlaced>());

        registry
            .route(&Context::new(), &"dynamic", 7i64, &[])
            .unwrap();
        registry
            .seal()
            .route(&Context::new(), &"dynamic", 9i64, &[])
            .unwrap();

        assert_eq!(*seen.lock(), [7, 9]);
    }

    #[test]
    fn test_builder_registers_custom_pointer() {
        struct Handle(Box<OrderPlaced>);

        impl Pointer for Handle {
            type Target = OrderPlaced;

            fn target(&self) -> &OrderPlaced {
                &self.0
            }
        }

        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();

        let registry = Registry::builder()
            .pointer::<Handle>()
            .factory("handle", |order_id: String| {
                Ok(Handle(Box::new(OrderPlaced {
                    order_id,
                    amount: 1,
                })))
            })
            .handle(move |_ctx, e: &OrderPlaced| {
                *sink.lock() = Some(e.order_id.clone());
                Ok(())
            })
            .seal();

        registry
            .route(&Context::new(), &"handle", "h1".to_string(), &[])
            .unwrap();
        assert_eq!(seen.lock().as_deref(), Some("h1"));
    }

    #[test]
    fn test_route_errors() {
        let registry = Registry::builder()
            .json_factory::<OrderPlaced, _>("order_placed")
            .seal();

        let err = registry
            .route(&Context::new(), &"missing", Bytes::new(), &[])
            .unwrap_err();
        assert!(matches!(err, Error::FactoryNotFound(_)));

        let data = Bytes::from_static(br#"{"order_id":"o1","amount":1}"#);
        let err = registry
            .route(&Context::new(), &"order_placed", data, &[])
            .unwrap_err();
        assert!(matches!(err, Error::HandlerNotFound(_)));
    }

    #[test]
    fn test_builder_typed_middleware() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();

        let registry = Registry::builder()
            .handle_with(
                move |_ctx, e: &UserCreated| {
                    sink.lock().push(e.id.clone());
                    Ok(())
                },
                [Middleware::guard(|_ctx, e: &UserCreated| {
                    if e.name.is_empty() {
                        return Err(Error::custom("user name cannot be empty"));
                    }
                    Ok(true)
                })],
            )
            .seal();

        let ok = UserCreated {
            id: "1".into(),
            name: "Alice".into(),
        };
        let bad = UserCreated {
            id: "2".into(),
            name: String::new(),
        };

        registry.dispatch(&Context::new(), &ok, &[]).unwrap();
        let err = registry.dispatch(&Context::new(), &bad, &[]).unwrap_err();

        assert_eq!(err.to_string(), "user name cannot be empty");
        assert_eq!(*log.lock(), ["1"]);
    }

    #[test]
    fn test_msgpack_builder() {
        let registry = Registry::builder()
            .msgpack_factory::<(u8, String), _>(1u8)
            .seal();

        let data = Bytes::from(crate::codec::MsgPackCodec::encode(&(3u8, "x")).unwrap());
        let value = registry.create(&1u8, data).unwrap();
        assert_eq!(
            value.downcast_ref::<(u8, String)>(),
            Some(&(3u8, "x".to_string()))
        );
    }
}
