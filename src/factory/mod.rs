//! Factory module - building typed values from raw data by key.
//!
//! Provides:
//! - [`FactoryEntry`] - a typed constructor bound to its key and erased
//! - [`FactoryResolver`] - read capability shared by mutable and sealed registries
//! - [`FactoryRegistry`] / [`SealedFactoryRegistry`] - the registries
//!
//! Keys are arbitrary `Hash + Eq + Clone + Debug` values (strings, integers,
//! enums) and may be mixed freely within one registry. String keys compare by
//! content whatever owns the text (`&'static str`, `String`, `Box<str>`,
//! `Arc<str>`, `Cow<'static, str>`), so a factory registered under
//! `"user_created"` is found with a `String` holding the same text.
//!
//! Each constructor declares the data type it takes. Calling it with data of
//! another type fails with [`Error::DataTypeNotSupported`] instead of
//! reaching the constructor.
//!
//! # Example
//!
//! ```
//! use typemux::{FactoryRegistry, FactoryResolver};
//!
//! #[derive(Debug, PartialEq)]
//! struct Celsius(f64);
//!
//! let registry = FactoryRegistry::new();
//! registry.register("celsius", |raw: String| {
//!     raw.parse().map(Celsius).map_err(typemux::Error::custom)
//! });
//!
//! let value = registry.create(&"celsius", "21.5".to_string()).unwrap();
//! assert_eq!(value.downcast_ref::<Celsius>(), Some(&Celsius(21.5)));
//! ```

mod registry;

pub use registry::{FactoryRegistry, SealedFactoryRegistry};

use std::any::{type_name, Any, TypeId};
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::key::{AnyValue, TypeKey};

mod private {
    use std::any::Any;
    use std::fmt;
    use std::hash::Hasher;

    use super::FactoryKey;

    /// Object-safe view of a factory key.
    pub trait DynKey: Send + Sync {
        fn as_any(&self) -> &dyn Any;
        fn as_str(&self) -> Option<&str>;
        fn to_key(&self) -> FactoryKey;
        fn dyn_eq(&self, other: &dyn DynKey) -> bool;
        fn dyn_hash(&self, state: &mut dyn Hasher);
        fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
    }
}

use private::DynKey;

impl<K> DynKey for K
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_str(&self) -> Option<&str> {
        let any = self.as_any();
        if let Some(s) = any.downcast_ref::<&'static str>() {
            return Some(*s);
        }
        if let Some(s) = any.downcast_ref::<String>() {
            return Some(s.as_str());
        }
        if let Some(s) = any.downcast_ref::<Box<str>>() {
            return Some(&**s);
        }
        if let Some(s) = any.downcast_ref::<Arc<str>>() {
            return Some(&**s);
        }
        any.downcast_ref::<Cow<'static, str>>().map(|s| &**s)
    }

    fn to_key(&self) -> FactoryKey {
        FactoryKey::new(self.clone())
    }

    fn dyn_eq(&self, other: &dyn DynKey) -> bool {
        match (self.as_str(), other.as_str()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => other
                .as_any()
                .downcast_ref::<K>()
                .is_some_and(|other| other == self),
            _ => false,
        }
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        match self.as_str() {
            Some(s) => {
                TypeId::of::<str>().hash(&mut state);
                s.hash(&mut state);
            }
            None => {
                TypeId::of::<K>().hash(&mut state);
                self.hash(&mut state);
            }
        }
    }

    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl PartialEq for dyn DynKey {
    fn eq(&self, other: &Self) -> bool {
        self.dyn_eq(other)
    }
}

impl Eq for dyn DynKey {}

impl Hash for dyn DynKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dyn_hash(state);
    }
}

/// Owned, type-erased factory key.
///
/// Carried by [`Error::FactoryNotFound`], so the missing key can be
/// recovered with [`downcast_ref`](Self::downcast_ref) or
/// [`as_str`](Self::as_str).
#[derive(Clone)]
pub struct FactoryKey(Arc<dyn DynKey>);

impl FactoryKey {
    /// Erase `key`. Erasing a `FactoryKey` returns it unchanged.
    pub fn new<K>(key: K) -> Self
    where
        K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    {
        let any: &dyn Any = &key;
        match any.downcast_ref::<FactoryKey>() {
            Some(key) => key.clone(),
            None => Self(Arc::new(key)),
        }
    }

    /// Borrow the key as `K`.
    pub fn downcast_ref<K: Any>(&self) -> Option<&K> {
        self.0.as_any().downcast_ref::<K>()
    }

    /// Text of a string key, whatever type it was registered with.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }
}

impl Borrow<dyn DynKey> for FactoryKey {
    fn borrow(&self) -> &(dyn DynKey + 'static) {
        self.0.as_ref()
    }
}

impl PartialEq for FactoryKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl Eq for FactoryKey {}

impl Hash for FactoryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

impl fmt::Debug for FactoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.dyn_fmt(f)
    }
}

/// Borrowed, type-erased factory key used for lookups.
#[derive(Clone, Copy)]
pub struct KeyRef<'a>(&'a (dyn DynKey + 'static));

impl<'a> KeyRef<'a> {
    /// Borrow `key` for a lookup.
    pub fn new<K>(key: &'a K) -> Self
    where
        K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    {
        Self(key)
    }

    fn to_not_found(self) -> Error {
        Error::FactoryNotFound(self.0.to_key())
    }
}

impl fmt::Debug for KeyRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.dyn_fmt(f)
    }
}

/// Raw data handed to a factory, with its type name for diagnostics.
pub struct Data {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl Data {
    /// Erase `value`.
    pub fn new<D: Any + Send>(value: D) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<D>(),
        }
    }

    /// Type name of the held data.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Type-erased constructor as stored in a registry.
type ErasedFactory = Arc<dyn Fn(Data) -> Result<AnyValue> + Send + Sync>;

/// A typed constructor bound to its key and erased, ready to be stored.
#[derive(Clone)]
pub struct FactoryEntry {
    key: FactoryKey,
    factory: ErasedFactory,
    data: &'static str,
    output: TypeKey,
}

impl FactoryEntry {
    /// Bind `ctor`, which builds a `T` out of a `D`, to `key`.
    pub fn new<K, D, T, F>(key: K, ctor: F) -> Self
    where
        K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
        D: Any + Send,
        T: Any + Send + Sync,
        F: Fn(D) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            key: FactoryKey::new(key),
            factory: erase(ctor),
            data: type_name::<D>(),
            output: TypeKey::of::<T>(),
        }
    }

    /// Key the entry is registered under.
    #[inline]
    pub fn key(&self) -> &FactoryKey {
        &self.key
    }

    /// Type name of the data the constructor takes.
    #[inline]
    pub fn data_type(&self) -> &'static str {
        self.data
    }

    /// Type the constructor produces.
    #[inline]
    pub fn output_type(&self) -> TypeKey {
        self.output
    }
}

impl fmt::Debug for FactoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryEntry")
            .field("key", &self.key)
            .field("data", &self.data)
            .field("output", &self.output)
            .finish()
    }
}

fn erase<D, T, F>(ctor: F) -> ErasedFactory
where
    D: Any + Send,
    T: Any + Send + Sync,
    F: Fn(D) -> Result<T> + Send + Sync + 'static,
{
    Arc::new(move |data: Data| {
        let Data { value, type_name } = data;
        match value.downcast::<D>() {
            Ok(value) => ctor(*value).map(AnyValue::new),
            Err(_) => Err(Error::DataTypeNotSupported {
                expected: std::any::type_name::<D>(),
                actual: type_name,
            }),
        }
    })
}

/// Factory map. Entries are shared between a registry and its snapshots.
#[derive(Clone, Default)]
pub(crate) struct FactoryTable {
    factories: HashMap<FactoryKey, FactoryEntry>,
}

impl FactoryTable {
    /// Insert an entry, replacing any previous factory under the same key.
    /// Returns true if a factory was replaced.
    pub(crate) fn insert(&mut self, entry: FactoryEntry) -> bool {
        self.factories
            .insert(entry.key.clone(), entry)
            .is_some()
    }

    pub(crate) fn get(&self, key: KeyRef<'_>) -> Option<&ErasedFactory> {
        self.factories.get(key.0).map(|entry| &entry.factory)
    }

    pub(crate) fn len(&self) -> usize {
        self.factories.len()
    }
}

/// Read side of a factory registry.
///
/// Implemented by the mutable and the sealed registries alike.
pub trait FactoryResolver {
    /// Look up the factory for `key` and run it on `data`.
    fn create_erased(&self, key: KeyRef<'_>, data: Data) -> Result<AnyValue>;

    /// Returns true if a factory is registered under `key`.
    fn contains_erased(&self, key: KeyRef<'_>) -> bool;

    /// Build a value from `data` with the factory registered under `key`.
    ///
    /// Returns [`Error::FactoryNotFound`] for an unknown key,
    /// [`Error::DataTypeNotSupported`] if `data` is not of the type the
    /// constructor takes, and the constructor's own error unchanged.
    fn create<K, D>(&self, key: &K, data: D) -> Result<AnyValue>
    where
        K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
        D: Any + Send,
        Self: Sized,
    {
        self.create_erased(KeyRef::new(key), Data::new(data))
    }

    /// Returns true if a factory is registered under `key`.
    fn contains_key<K>(&self, key: &K) -> bool
    where
        K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
        Self: Sized,
    {
        self.contains_erased(KeyRef::new(key))
    }
}
