//! Codec module - decoding raw payloads into typed values.
//!
//! The registries never decode anything themselves. This module is the
//! serializer they lean on through the factory conveniences:
//!
//! - [`JsonCodec`] - JSON using `serde_json`
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (structs as maps)
//! - [`json_factory`] / [`msgpack_factory`] - constructors ready to register
//!
//! Both factories take their payload as [`bytes::Bytes`]. Passing any other
//! data type to them fails with
//! [`Error::DataTypeNotSupported`](crate::Error::DataTypeNotSupported).
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects,
//! so the payload format is picked at registration time.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use serde::Deserialize;
//! use typemux::codec::json_factory;
//! use typemux::{FactoryRegistry, FactoryResolver};
//!
//! #[derive(Deserialize)]
//! struct UserCreated {
//!     id: String,
//!     name: String,
//! }
//!
//! let registry = FactoryRegistry::new();
//! registry.register("user_created", json_factory::<UserCreated>());
//!
//! let data = Bytes::from_static(br#"{"id":"u1","name":"Alice"}"#);
//! let value = registry.create(&"user_created", data).unwrap();
//! let user = value.downcast_ref::<UserCreated>().unwrap();
//! assert_eq!((user.id.as_str(), user.name.as_str()), ("u1", "Alice"));
//! ```

mod json;
mod msgpack;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;

use std::any::Any;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Constructor that decodes a JSON payload into `T`.
pub fn json_factory<T>() -> impl Fn(Bytes) -> Result<T> + Clone + Send + Sync + 'static
where
    T: DeserializeOwned + Any + Send + Sync,
{
    |data: Bytes| JsonCodec::decode(&data)
}

/// Constructor that decodes a MessagePack payload into `T`.
pub fn msgpack_factory<T>() -> impl Fn(Bytes) -> Result<T> + Clone + Send + Sync + 'static
where
    T: DeserializeOwned + Any + Send + Sync,
{
    |data: Bytes| MsgPackCodec::decode(&data)
}
