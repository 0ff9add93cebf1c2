//! Factory registries: the mutable [`FactoryRegistry`] and its sealed,
//! lock-free snapshot [`SealedFactoryRegistry`].

use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Data, FactoryEntry, FactoryResolver, FactoryTable, KeyRef};
use crate::error::Result;
use crate::key::AnyValue;

/// Thread-safe registry of typed constructors.
///
/// Lookups share a read lock, registration takes the write lock. The lock
/// is released before the constructor runs.
#[derive(Default)]
pub struct FactoryRegistry {
    table: RwLock<FactoryTable>,
}

impl FactoryRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ctor` under `key`. It builds a `T` from data of type `D`.
    ///
    /// A factory already registered under `key` is replaced.
    pub fn register<K, D, T, F>(&self, key: K, ctor: F)
    where
        K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
        D: Any + Send,
        T: Any + Send + Sync,
        F: Fn(D) -> Result<T> + Send + Sync + 'static,
    {
        self.insert(FactoryEntry::new(key, ctor));
    }

    /// Store a prebuilt entry.
    pub fn insert(&self, entry: FactoryEntry) {
        tracing::trace!(
            "Registering factory {:?} ({} -> {})",
            entry.key(),
            entry.data_type(),
            entry.output_type()
        );

        let key = entry.key().clone();
        if self.table.write().insert(entry) {
            tracing::debug!("Replaced factory for key {:?}", key);
        }
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Returns true if no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take a point-in-time snapshot that needs no locking.
    ///
    /// Factories registered on `self` afterwards are not visible in the
    /// snapshot.
    pub fn seal(&self) -> SealedFactoryRegistry {
        let table = self.table.read().clone();
        tracing::debug!("Sealed factory registry with {} factories", table.len());
        SealedFactoryRegistry { table }
    }
}

impl FactoryResolver for FactoryRegistry {
    fn create_erased(&self, key: KeyRef<'_>, data: Data) -> Result<AnyValue> {
        let factory = self
            .table
            .read()
            .get(key)
            .map(Arc::clone)
            .ok_or_else(|| key.to_not_found())?;
        factory(data)
    }

    fn contains_erased(&self, key: KeyRef<'_>) -> bool {
        self.table.read().get(key).is_some()
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("factories", &self.len())
            .finish()
    }
}

/// Immutable snapshot of a [`FactoryRegistry`].
pub struct SealedFactoryRegistry {
    table: FactoryTable,
}

impl SealedFactoryRegistry {
    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FactoryResolver for SealedFactoryRegistry {
    #[inline]
    fn create_erased(&self, key: KeyRef<'_>, data: Data) -> Result<AnyValue> {
        match self.table.get(key) {
            Some(factory) => factory(data),
            None => Err(key.to_not_found()),
        }
    }

    fn contains_erased(&self, key: KeyRef<'_>) -> bool {
        self.table.get(key).is_some()
    }
}

impl fmt::Debug for SealedFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedFactoryRegistry")
            .field("factories", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[derive(Debug, Clone, PartialEq)]
    struct UserCreated {
        id: String,
        name: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct OrderPlaced {
        order_id: String,
    }

    fn user_from_csv(data: String) -> Result<UserCreated> {
        let (id, name) = data
            .split_once(',')
            .ok_or_else(|| Error::custom(format!("malformed record: {data}")))?;
        Ok(UserCreated {
            id: id.to_string(),
            name: name.to_string(),
        })
    }

    #[test]
    fn test_create_standard_and_sealed() {
        let registry = FactoryRegistry::new();
        registry.register("user_created", user_from_csv);

        let value = registry
            .create(&"user_created", "123,John".to_string())
            .unwrap();
        assert_eq!(
            value.downcast_ref::<UserCreated>(),
            Some(&UserCreated {
                id: "123".into(),
                name: "John".into()
            })
        );

        let sealed = registry.seal();
        let value = sealed
            .create(&"user_created", "124,Jane".to_string())
            .unwrap();
        assert_eq!(
            value.downcast_ref::<UserCreated>().map(|u| u.name.as_str()),
            Some("Jane")
        );
    }

    #[test]
    fn test_factory_not_found() {
        let registry = FactoryRegistry::new();
        let err = registry.create(&"unknown", Vec::<u8>::new()).unwrap_err();

        match err {
            Error::FactoryNotFound(key) => {
                assert_eq!(key.as_str(), Some("unknown"));
                assert_eq!(format!("{key:?}"), "\"unknown\"");
            }
            other => panic!("expected FactoryNotFound, got {other:?}"),
        }
        match registry.seal().create(&7u8, ()) {
            Err(Error::FactoryNotFound(key)) => assert_eq!(key.downcast_ref::<u8>(), Some(&7)),
            other => panic!("expected FactoryNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_factory_replaces_existing() {
        let registry = FactoryRegistry::new();
        registry.register("event", |_: ()| {
            Ok(OrderPlaced {
                order_id: "first".into(),
            })
        });
        registry.register("event", |_: ()| {
            Ok(OrderPlaced {
                order_id: "second".into(),
            })
        });
        assert_eq!(registry.len(), 1);

        let sealed = registry.seal();
        let value = sealed.create(&"event", ()).unwrap();
        assert_eq!(
            value.downcast_ref::<OrderPlaced>().map(|o| o.order_id.as_str()),
            Some("second")
        );
    }

    #[test]
    fn test_different_key_types() {
        let registry = FactoryRegistry::new();
        registry.register("string_key", |_: ()| Ok("from_string"));
        registry.register(42, |_: ()| Ok(42u64));

        let sealed = registry.seal();
        assert_eq!(
            sealed
                .create(&"string_key", ())
                .unwrap()
                .downcast_ref::<&str>(),
            Some(&"from_string")
        );
        assert_eq!(
            sealed.create(&42, ()).unwrap().downcast_ref::<u64>(),
            Some(&42)
        );
        assert!(!sealed.contains_key(&43));
        assert!(sealed.contains_key(&"string_key".to_string()));
    }

    #[test]
    fn test_wrong_data_type() {
        let registry = FactoryRegistry::new();
        registry.register("user", user_from_csv);

        let err = registry.seal().create(&"user", b"1,a".to_vec()).unwrap_err();
        assert!(matches!(
            err,
            Error::DataTypeNotSupported {
                expected: "alloc::string::String",
                ..
            }
        ));
    }

    #[test]
    fn test_constructor_error_passes_through() {
        let registry = FactoryRegistry::new();
        registry.register("user", user_from_csv);

        let err = registry.create(&"user", "no-comma".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "malformed record: no-comma");
    }

    #[test]
    fn test_seal_snapshot_isolation() {
        let registry = FactoryRegistry::new();
        registry.register("before", |_: ()| Ok(1u8));
        let sealed = registry.seal();
        registry.register("after", |_: ()| Ok(2u8));

        assert_eq!(sealed.len(), 1);
        assert!(sealed.create(&"before", ()).is_ok());
        assert!(matches!(
            sealed.create(&"after", ()),
            Err(Error::FactoryNotFound(_))
        ));
        assert!(registry.create(&"after", ()).is_ok());
    }
}
