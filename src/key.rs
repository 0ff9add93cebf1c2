//! Type identity - the map key behind type-keyed dispatch.
//!
//! A [`TypeKey`] names the concrete type of a value. Two values of the same
//! type produce equal keys, values of different types never do, and `T`,
//! `Box<T>` and `Arc<T>` are three different keys.
//!
//! The relation "this key is a pointer to that key" is expressed by
//! [`PointerTarget`], built from the [`Pointer`] trait. The dispatch table
//! records it when a handler is registered so that a `Box<T>` or `Arc<T>`
//! can reach a handler written for `T`.
//!
//! [`AnyValue`] is the type-erased value produced by factories. It is
//! transparent for dispatch: its key is the key of the value it holds.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Borrowed, type-erased value as stored and passed around by the registries.
pub type AnyRef<'a> = &'a (dyn Any + Send + Sync);

/// Stable identity of a concrete type, usable as a map key.
///
/// Equality and hashing only look at the [`TypeId`]; the type name is kept
/// for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key of type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Key of the type of `value`.
    #[inline]
    pub fn of_val<T: ?Sized + 'static>(_value: &T) -> Self {
        Self::of::<T>()
    }

    /// Underlying [`TypeId`].
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.name).finish()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A pointer whose pointee may be dispatched to in its place.
///
/// Implemented for `Box<T>` and `Arc<T>`, whose relation to `T` is recorded
/// whenever a handler for `T` is registered. Other implementors take part in
/// fallback once registered with
/// [`DispatchRegistry::register_pointer`](crate::DispatchRegistry::register_pointer).
pub trait Pointer: Any + Send + Sync {
    /// Type pointed to.
    type Target: Any + Send + Sync;

    /// Borrow the pointee.
    fn target(&self) -> &Self::Target;
}

impl<T: Any + Send + Sync> Pointer for Box<T> {
    type Target = T;

    #[inline]
    fn target(&self) -> &T {
        self
    }
}

impl<T: Any + Send + Sync> Pointer for Arc<T> {
    type Target = T;

    #[inline]
    fn target(&self) -> &T {
        self
    }
}

/// Monomorphized dereference of an erased pointer value.
type DerefFn = for<'a> fn(AnyRef<'a>) -> Option<AnyRef<'a>>;

/// Records that `pointer` is a pointer to `target`, and how to follow it on
/// an erased value.
#[derive(Clone, Copy)]
pub struct PointerTarget {
    pointer: TypeKey,
    target: TypeKey,
    deref: DerefFn,
}

impl PointerTarget {
    /// Relation for pointer type `P`.
    pub fn of<P: Pointer>() -> Self {
        Self {
            pointer: TypeKey::of::<P>(),
            target: TypeKey::of::<P::Target>(),
            deref: deref_pointer::<P>,
        }
    }

    /// Pointer forms a value of type `T` may be dispatched as.
    pub(crate) fn all_for<T: Any + Send + Sync>() -> [Self; 2] {
        [Self::of::<Box<T>>(), Self::of::<Arc<T>>()]
    }

    /// Key of the pointer type.
    #[inline]
    pub fn pointer(&self) -> TypeKey {
        self.pointer
    }

    /// Key of the pointee type.
    #[inline]
    pub fn target(&self) -> TypeKey {
        self.target
    }

    /// Follow the pointer. Returns `None` if `value` is not of the pointer type.
    #[inline]
    pub fn deref<'a>(&self, value: AnyRef<'a>) -> Option<AnyRef<'a>> {
        (self.deref)(value)
    }
}

impl fmt::Debug for PointerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerTarget")
            .field("pointer", &self.pointer)
            .field("target", &self.target)
            .finish()
    }
}

fn deref_pointer<P: Pointer>(value: AnyRef<'_>) -> Option<AnyRef<'_>> {
    value
        .downcast_ref::<P>()
        .map(|ptr| ptr.target() as AnyRef<'_>)
}

/// Owned, type-erased value that remembers its [`TypeKey`].
///
/// Returned by factories. Dispatching an `AnyValue` dispatches the value it
/// holds.
pub struct AnyValue {
    key: TypeKey,
    value: Box<dyn Any + Send + Sync>,
}

impl AnyValue {
    /// Erase `value`.
    ///
    /// Erasing an `AnyValue` returns it unchanged, so a constructor that
    /// already returns `AnyValue` still yields the concrete type.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let value: Box<dyn Any + Send + Sync> = Box::new(value);
        match value.downcast::<AnyValue>() {
            Ok(inner) => *inner,
            Err(value) => Self {
                key: TypeKey::of::<T>(),
                value,
            },
        }
    }

    /// Key of the held value.
    #[inline]
    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    /// Type name of the held value.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.key.name()
    }

    /// Returns true if the held value is a `T`.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrow the held value as `T`.
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the held value as `T`, or get `self` back on mismatch.
    pub fn downcast<T: Any>(self) -> std::result::Result<T, Self> {
        let key = self.key;
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self { key, value }),
        }
    }

    /// Borrow the held value, erased.
    #[inline]
    pub fn as_any(&self) -> AnyRef<'_> {
        self.value.as_ref()
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyValue")
            .field("type", &self.key.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order {
        id: u32,
    }

    #[test]
    fn test_key_equality() {
        assert_eq!(TypeKey::of::<Order>(), TypeKey::of::<Order>());
        assert_ne!(TypeKey::of::<Order>(), TypeKey::of::<u32>());
        assert_eq!(TypeKey::of_val(&Order { id: 1 }), TypeKey::of::<Order>());
    }

    #[test]
    fn test_pointer_keys_differ_from_pointee() {
        assert_ne!(TypeKey::of::<Box<Order>>(), TypeKey::of::<Order>());
        assert_ne!(TypeKey::of::<Arc<Order>>(), TypeKey::of::<Order>());
        assert_ne!(TypeKey::of::<Arc<Order>>(), TypeKey::of::<Box<Order>>());
    }

    #[test]
    fn test_any_value_does_not_nest() {
        let value = AnyValue::new(AnyValue::new(Order { id: 3 }));

        assert_eq!(value.type_key(), TypeKey::of::<Order>());
        assert_eq!(value.downcast_ref::<Order>().map(|o| o.id), Some(3));
        assert!(!value.is::<AnyValue>());
    }

    #[test]
    fn test_key_name() {
        let key = TypeKey::of::<u64>();
        assert_eq!(key.name(), "u64");
        assert_eq!(key.to_string(), "u64");
    }

    #[test]
    fn test_pointer_target_relation() {
        let rel = PointerTarget::of::<Arc<Order>>();
        assert_eq!(rel.pointer(), TypeKey::of::<Arc<Order>>());
        assert_eq!(rel.target(), TypeKey::of::<Order>());

        let shared = Arc::new(Order { id: 7 });
        let inner = rel.deref(&shared).and_then(|v| v.downcast_ref::<Order>());
        assert_eq!(inner.map(|o| o.id), Some(7));

        // Wrong pointer type does not deref.
        let boxed = Box::new(Order { id: 8 });
        assert!(rel.deref(&boxed).is_none());
    }

    #[test]
    fn test_all_for_covers_box_and_arc() {
        let [boxed, shared] = PointerTarget::all_for::<Order>();
        assert_eq!(boxed.pointer(), TypeKey::of::<Box<Order>>());
        assert_eq!(shared.pointer(), TypeKey::of::<Arc<Order>>());
        assert_eq!(boxed.target(), shared.target());
    }

    #[test]
    fn test_any_value() {
        let value = AnyValue::new(Order { id: 3 });
        assert_eq!(value.type_key(), TypeKey::of::<Order>());
        assert!(value.is::<Order>());
        assert!(!value.is::<u32>());
        assert_eq!(value.downcast_ref::<Order>().map(|o| o.id), Some(3));

        let value = value.downcast::<u32>().unwrap_err();
        assert_eq!(value.type_key(), TypeKey::of::<Order>());
        assert_eq!(value.downcast::<Order>().ok().map(|o| o.id), Some(3));
    }
}
