//! MsgPack codec using `rmp-serde`.
//!
//! Encoding always goes through `to_vec_named`, so structs are written as
//! maps keyed by field name. Producers on other runtimes (`@msgpack/msgpack`
//! and friends) emit that layout, and the decoder accepts both.
//!
//! # Example
//!
//! ```
//! use typemux::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Message {
//!     id: u32,
//!     content: String,
//! }
//!
//! let msg = Message { id: 42, content: "hello".to_string() };
//! let encoded = MsgPackCodec::encode(&msg).unwrap();
//! let decoded: Message = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use crate::error::Result;

/// MessagePack codec for structured data.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes, structs as maps.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct InventoryReserved {
        sku: String,
        quantity: u32,
        backorder: bool,
    }

    #[test]
    fn test_struct_written_as_map() {
        let event = InventoryReserved {
            sku: "A-1".to_string(),
            quantity: 3,
            backorder: false,
        };

        let encoded = MsgPackCodec::encode(&event).unwrap();

        // fixmap with 3 entries, not fixarray (0x93)
        assert_eq!(encoded[0], 0x83);

        let decoded: InventoryReserved = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_decode_positional_layout() {
        // Same struct written as an array by a positional encoder.
        let encoded = rmp_serde::to_vec(&InventoryReserved {
            sku: "B-2".to_string(),
            quantity: 1,
            backorder: true,
        })
        .unwrap();
        assert_eq!(encoded[0], 0x93);

        let decoded: InventoryReserved = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded.sku, "B-2");
        assert!(decoded.backorder);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let invalid = b"not valid msgpack";
        let result: Result<InventoryReserved> = MsgPackCodec::decode(invalid);
        assert!(matches!(result, Err(crate::Error::MsgPackDecode(_))));
    }

    #[test]
    fn test_null_decodes_to_none() {
        let encoded = MsgPackCodec::encode(&None::<i32>).unwrap();
        assert_eq!(encoded, vec![0xc0]);

        let decoded: Option<i32> = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, None);
    }
}
