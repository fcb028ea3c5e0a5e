//! Key and value codecs.
//!
//! A codec turns one key or value into the bytes stored in a record and back.
//! `None` stands for the null block, which sets and nullable values use in
//! place of a payload.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Encodes and decodes one key or value type.
pub trait Codec<T>: Send + Sync {
    /// Encodes a value; `None` is written as the null block.
    fn encode(&self, value: &T) -> Result<Option<Vec<u8>>>;

    /// Decodes a value from a block read from disk.
    fn decode(&self, bytes: Option<Vec<u8>>) -> Result<T>;
}

/// The key codec and the value codec of one map.
pub struct Codecs<K, V> {
    /// Codec for keys.
    pub key: Arc<dyn Codec<K>>,
    /// Codec for values.
    pub value: Arc<dyn Codec<V>>,
}

impl<K, V> Codecs<K, V> {
    /// Pairs a key codec with a value codec.
    pub fn new(key: impl Codec<K> + 'static, value: impl Codec<V> + 'static) -> Self {
        Self { key: Arc::new(key), value: Arc::new(value) }
    }
}

impl Codecs<String, String> {
    /// UTF-8 keys and values.
    pub fn strings() -> Self {
        Self::new(StringCodec, StringCodec)
    }
}

impl<K> Codecs<K, ()> {
    /// Codecs for a set: the given key codec and a null value.
    pub fn set(key: impl Codec<K> + 'static) -> Self {
        Self::new(key, UnitCodec)
    }
}

impl<K, V> Clone for Codecs<K, V> {
    fn clone(&self) -> Self {
        Self { key: Arc::clone(&self.key), value: Arc::clone(&self.value) }
    }
}

impl<K, V> fmt::Debug for Codecs<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codecs").finish_non_exhaustive()
    }
}

fn require(bytes: Option<Vec<u8>>, type_name: &str) -> Result<Vec<u8>> {
    bytes.ok_or_else(|| Error::invalid_data(format!("Unexpected null {}", type_name)))
}

/// UTF-8 strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn encode(&self, value: &String) -> Result<Option<Vec<u8>>> {
        Ok(Some(value.as_bytes().to_vec()))
    }

    fn decode(&self, bytes: Option<Vec<u8>>) -> Result<String> {
        String::from_utf8(require(bytes, "string")?)
            .map_err(|e| Error::invalid_data(format!("Invalid UTF-8 string: {}", e)))
    }
}

/// Raw byte vectors, stored as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawBytesCodec;

impl Codec<Vec<u8>> for RawBytesCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Option<Vec<u8>>> {
        Ok(Some(value.clone()))
    }

    fn decode(&self, bytes: Option<Vec<u8>>) -> Result<Vec<u8>> {
        require(bytes, "byte array")
    }
}

/// Shared byte buffers, stored as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesCodec;

impl Codec<Bytes> for BytesCodec {
    fn encode(&self, value: &Bytes) -> Result<Option<Vec<u8>>> {
        Ok(Some(value.to_vec()))
    }

    fn decode(&self, bytes: Option<Vec<u8>>) -> Result<Bytes> {
        require(bytes, "byte buffer").map(Bytes::from)
    }
}

macro_rules! int_codec {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl Codec<$ty> for $name {
            fn encode(&self, value: &$ty) -> Result<Option<Vec<u8>>> {
                Ok(Some(value.to_be_bytes().to_vec()))
            }

            fn decode(&self, bytes: Option<Vec<u8>>) -> Result<$ty> {
                let bytes = require(bytes, stringify!($ty))?;
                let array = bytes.as_slice().try_into().map_err(|_| {
                    Error::invalid_data(format!(
                        "Invalid {} length: {} bytes",
                        stringify!($ty),
                        bytes.len()
                    ))
                })?;
                Ok(<$ty>::from_be_bytes(array))
            }
        }
    };
}

int_codec!(
    /// Big-endian `i16`.
    I16Codec,
    i16
);
int_codec!(
    /// Big-endian `i32`.
    I32Codec,
    i32
);
int_codec!(
    /// Big-endian `i64`.
    I64Codec,
    i64
);
int_codec!(
    /// Big-endian `u32`.
    U32Codec,
    u32
);
int_codec!(
    /// Big-endian `u64`.
    U64Codec,
    u64
);
int_codec!(
    /// One `i8` byte.
    I8Codec,
    i8
);
int_codec!(
    /// One `u8` byte.
    U8Codec,
    u8
);
int_codec!(
    /// Raw bits of an `f32`, big-endian.
    F32Codec,
    f32
);
int_codec!(
    /// Raw bits of an `f64`, big-endian.
    F64Codec,
    f64
);

/// One byte, 1 for true and 0 for false.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoolCodec;

impl Codec<bool> for BoolCodec {
    fn encode(&self, value: &bool) -> Result<Option<Vec<u8>>> {
        Ok(Some(vec![u8::from(*value)]))
    }

    fn decode(&self, bytes: Option<Vec<u8>>) -> Result<bool> {
        match require(bytes, "bool")?.as_slice() {
            [0] => Ok(false),
            [1] => Ok(true),
            other => Err(Error::invalid_data(format!("Invalid bool: {:?}", other))),
        }
    }
}

/// A `char` as its big-endian scalar value.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharCodec;

impl Codec<char> for CharCodec {
    fn encode(&self, value: &char) -> Result<Option<Vec<u8>>> {
        U32Codec.encode(&u32::from(*value))
    }

    fn decode(&self, bytes: Option<Vec<u8>>) -> Result<char> {
        let scalar = U32Codec.decode(bytes)?;
        char::from_u32(scalar).ok_or_else(|| Error::invalid_data(format!("Invalid char: {:#x}", scalar)))
    }
}

/// The value of a set entry: always the null block.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnitCodec;

impl Codec<()> for UnitCodec {
    fn encode(&self, _value: &()) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn decode(&self, _bytes: Option<Vec<u8>>) -> Result<()> {
        Ok(())
    }
}

/// Nullable values: `None` is stored as the null block.
#[derive(Debug, Default, Clone, Copy)]
pub struct OptionCodec<C>(pub C);

impl<T, C: Codec<T>> Codec<Option<T>> for OptionCodec<C> {
    fn encode(&self, value: &Option<T>) -> Result<Option<Vec<u8>>> {
        match value {
            Some(value) => self.0.encode(value),
            None => Ok(None),
        }
    }

    fn decode(&self, bytes: Option<Vec<u8>>) -> Result<Option<T>> {
        match bytes {
            Some(bytes) => self.0.decode(Some(bytes)).map(Some),
            None => Ok(None),
        }
    }
}

/// Any serde type, encoded with bincode.
pub struct BincodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    /// Creates a bincode codec.
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BincodeCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BincodeCodec")
    }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for BincodeCodec<T> {
    fn encode(&self, value: &T) -> Result<Option<Vec<u8>>> {
        Ok(Some(bincode::serialize(value)?))
    }

    fn decode(&self, bytes: Option<Vec<u8>>) -> Result<T> {
        let bytes = require(bytes, "bincode value")?;
        bincode::deserialize(&bytes).map_err(|e| Error::invalid_data(format!("Undecodable bincode value: {}", e)))
    }
}
