//! Leaf record: an `i64` key followed by a 120-byte payload.
//!
//! The payload is read as fifteen `i64` columns. Tables with fewer columns
//! leave the tail zeroed.

use crate::common::config::{MAX_VALUES, VALUE_SIZE};
use crate::common::{Error, Result};

/// One leaf entry.
///
/// # Example
/// ```
/// use bptdb::storage::page::Record;
///
/// let record = Record::new(7, &[1, 2, 3]).unwrap();
/// assert_eq!(record.key, 7);
/// assert_eq!(record.values(3), &[1, 2, 3]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub key: i64,
    pub values: [i64; MAX_VALUES],
}

impl Record {
    /// Build a record from up to `MAX_VALUES` value columns.
    ///
    /// # Errors
    /// Returns `Error::ColumnCountMismatch` if more than `MAX_VALUES` values
    /// are supplied.
    pub fn new(key: i64, values: &[i64]) -> Result<Self> {
        if values.len() > MAX_VALUES {
            return Err(Error::ColumnCountMismatch {
                expected: MAX_VALUES,
                actual: values.len(),
            });
        }
        let mut record = Record {
            key,
            values: [0; MAX_VALUES],
        };
        record.values[..values.len()].copy_from_slice(values);
        Ok(record)
    }

    /// Build a record from a raw payload.
    pub fn with_payload(key: i64, payload: &[u8; VALUE_SIZE]) -> Self {
        let mut values = [0i64; MAX_VALUES];
        for (value, chunk) in values.iter_mut().zip(payload.chunks_exact(8)) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            *value = i64::from_ne_bytes(buf);
        }
        Record { key, values }
    }

    /// The first `count` value columns.
    pub fn values(&self, count: usize) -> &[i64] {
        &self.values[..count.min(MAX_VALUES)]
    }

    /// The payload as it is laid out on disk.
    pub fn payload(&self) -> [u8; VALUE_SIZE] {
        let mut payload = [0u8; VALUE_SIZE];
        for (chunk, value) in payload.chunks_exact_mut(8).zip(self.values.iter()) {
            chunk.copy_from_slice(&value.to_ne_bytes());
        }
        payload
    }
}
