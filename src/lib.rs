//! # typemux
//!
//! Type-keyed dispatch and typed value construction.
//!
//! This crate routes a value to the handler registered for its concrete
//! type, and builds typed values out of raw data (wire payloads) by key.
//!
//! ## Architecture
//!
//! - **Dispatch** ([`DispatchRegistry`]): type -> handler, with typed
//!   middleware bound at registration and cross-cutting middleware supplied
//!   per call. A `Box<T>` or `Arc<T>` reaches a handler written for `T`.
//! - **Factories** ([`FactoryRegistry`]): key -> constructor, guarded by a
//!   check on the data type the constructor takes.
//! - **Sealing**: every mutable registry can be sealed into an immutable,
//!   lock-free snapshot for the hot path.
//!
//! ## Example
//!
//! ```
//! use bytes::Bytes;
//! use serde::Deserialize;
//! use typemux::{middleware, Context, Registry, Router};
//!
//! #[derive(Deserialize)]
//! struct UserCreated {
//!     id: String,
//!     name: String,
//! }
//!
//! let registry = Registry::new();
//! registry.register_factory("user_created", typemux::codec::json_factory::<UserCreated>());
//! registry.register(|_ctx: &Context, e: &UserCreated| {
//!     println!("User created: {} ({})", e.name, e.id);
//!     Ok(())
//! });
//!
//! let sealed = registry.seal();
//! let data = Bytes::from_static(br#"{"id":"u1","name":"Alice"}"#);
//! sealed
//!     .route(&Context::new(), &"user_created", data, &[middleware::logging()])
//!     .unwrap();
//! ```

pub mod codec;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod key;
pub mod middleware;

mod registry;

pub use context::Context;
pub use dispatch::{
    DispatchMiddleware, DispatchNext, DispatchRegistry, Dispatcher, Event, Handler, HandlerEntry,
    Middleware, Next, SealedDispatchRegistry,
};
pub use error::{BoxError, Error, Result};
pub use factory::{FactoryEntry, FactoryKey, FactoryRegistry, FactoryResolver, SealedFactoryRegistry};
pub use key::{AnyValue, Pointer, PointerTarget, TypeKey};
pub use registry::{Registry, RegistryBuilder, Router, SealedRegistry};
