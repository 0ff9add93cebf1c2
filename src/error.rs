//! Error types for typemux.

use thiserror::Error;

use crate::factory::FactoryKey;
use crate::key::TypeKey;

/// Boxed error used to carry foreign errors through handlers and factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for all typemux operations.
///
/// Errors produced by handlers, middleware and constructors are returned to
/// the caller as-is. The registry never wraps, retries or logs them.
#[derive(Debug, Error)]
pub enum Error {
    /// No handler registered for the dispatched value's type, neither exact
    /// nor through pointer fallback.
    #[error("typemux: handler not found for type {0}")]
    HandlerNotFound(TypeKey),

    /// No factory registered under the given key.
    #[error("typemux: factory not found for key {0:?}")]
    FactoryNotFound(FactoryKey),

    /// A factory was found but the supplied data has a different type than
    /// the one its constructor takes.
    #[error("typemux: data type not supported: expected {expected}, got {actual}")]
    DataTypeNotSupported {
        /// Data type the constructor was registered with.
        expected: &'static str,
        /// Data type that was supplied.
        actual: &'static str,
    },

    /// JSON decoding error (JSON factory).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error (MsgPack factory).
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Application error raised by a handler, middleware or constructor.
    #[error(transparent)]
    Custom(BoxError),
}

impl Error {
    /// Wrap an application error so it can be returned from a handler,
    /// middleware or constructor.
    pub fn custom<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Custom(err.into())
    }

    /// Borrow the application error carried by [`Error::Custom`] as `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::Custom(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns true if no handler or no factory matched.
    ///
    /// A factory that was found but given the wrong data type is not a miss;
    /// see [`Error::DataTypeNotSupported`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::HandlerNotFound(_) | Error::FactoryNotFound(_))
    }
}

/// Result type alias using typemux [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
