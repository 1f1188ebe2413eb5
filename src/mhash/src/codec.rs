//! Bucket encoding and decoding.
//!
//! # Layout
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       1     Format version
//! 1       32    Branch bitset
//! 33      4     Item count (u32, big-endian)
//! 37      ...   Items: [len u32][len bytes] repeated
//! ```

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::bitset::{BitSet, BIT_SET_BYTES};
use crate::bucket::Bucket;
use crate::error::{MhashError, MhashResult};

/// Current bucket format version.
pub const BUCKET_FORMAT_VERSION: u8 = 1;

/// Size of the fixed bucket header in bytes.
pub const BUCKET_HEADER_SIZE: usize = 1 + BIT_SET_BYTES + 4;

/// A value that can be stored in the cache.
pub trait Value: Clone + Send + Sync + 'static {
    /// Encode the value to bytes.
    fn marshal(&self) -> MhashResult<Bytes>;
}

/// Decodes a value from its cached bytes.
pub type Unmarshaler<T> = Arc<dyn Fn(&[u8]) -> MhashResult<T> + Send + Sync>;

impl<T: Value> Value for Bucket<T> {
    fn marshal(&self) -> MhashResult<Bytes> {
        let encoded = self
            .items
            .iter()
            .map(Value::marshal)
            .collect::<MhashResult<Vec<_>>>()?;

        let body_size: usize = encoded.iter().map(|b| 4 + b.len()).sum();
        let mut buf = BytesMut::with_capacity(BUCKET_HEADER_SIZE + body_size);

        buf.put_u8(BUCKET_FORMAT_VERSION);
        buf.put_slice(self.bitset.as_bytes());
        buf.put_u32(to_u32(encoded.len(), "item count")?);
        for item in &encoded {
            buf.put_u32(to_u32(item.len(), "item size")?);
            buf.put_slice(item);
        }

        Ok(buf.freeze())
    }
}

fn to_u32(n: usize, what: &str) -> MhashResult<u32> {
    u32::try_from(n).map_err(|_| MhashError::encode(format!("{} {} exceeds u32", what, n)))
}

/// Build a bucket unmarshaler from an item unmarshaler.
pub fn bucket_unmarshaler<T>(item_unmarshaler: Unmarshaler<T>) -> Unmarshaler<Bucket<T>>
where
    T: Send + Sync + 'static,
{
    Arc::new(move |data: &[u8]| decode_bucket(data, item_unmarshaler.as_ref()))
}

fn decode_bucket<T>(
    mut data: &[u8],
    item_unmarshaler: &(dyn Fn(&[u8]) -> MhashResult<T> + Send + Sync),
) -> MhashResult<Bucket<T>> {
    if data.len() < BUCKET_HEADER_SIZE {
        return Err(MhashError::decode(format!(
            "Bucket data too small: {} bytes, expected at least {}",
            data.len(),
            BUCKET_HEADER_SIZE
        )));
    }

    let version = data.get_u8();
    if version != BUCKET_FORMAT_VERSION {
        return Err(MhashError::decode(format!(
            "Unsupported bucket version {}, expected {}",
            version, BUCKET_FORMAT_VERSION
        )));
    }

    let mut bits = [0u8; BIT_SET_BYTES];
    data.copy_to_slice(&mut bits);
    let count = data.get_u32() as usize;

    // Every item needs at least its length prefix.
    if count > data.remaining() / 4 {
        return Err(MhashError::decode(format!(
            "Item count {} does not fit in {} remaining bytes",
            count,
            data.remaining()
        )));
    }

    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        if data.remaining() < 4 {
            return Err(MhashError::decode(format!("Truncated length of item {}", i)));
        }
        let len = data.get_u32() as usize;
        if data.remaining() < len {
            return Err(MhashError::decode(format!(
                "Item {} needs {} bytes, only {} left",
                i,
                len,
                data.remaining()
            )));
        }
        items.push(item_unmarshaler(&data[..len])?);
        data.advance(len);
    }

    if data.has_remaining() {
        return Err(MhashError::decode(format!(
            "{} trailing bytes after bucket",
            data.remaining()
        )));
    }

    Ok(Bucket::new(items, BitSet::from_bytes(bits)))
}
