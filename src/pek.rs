//! The Password Encryption Key table.
//!
//! The PEK table is derived once per database from the domain boot key, outside
//! this crate. The engine only consumes it: an ordered table of 16-byte AES/RC4
//! keys, indexed from 0 by the header of each encrypted blob. It is never
//! mutated after construction, so a single table can be shared by reference
//! across any number of concurrent record decryptions.

use crate::error::{DitError, DitResult};

/// Immutable table of per-database 16-byte encryption keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PekTable(Vec<[u8; 16]>);

impl PekTable {
    pub fn new(keys: Vec<[u8; 16]>) -> Self {
        PekTable(keys)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a key by blob-supplied index.
    pub fn key(&self, index: usize) -> DitResult<&[u8; 16]> {
        self.0.get(index).ok_or(DitError::KeyIndexOutOfRange {
            index,
            len: self.0.len(),
        })
    }
}

impl From<Vec<[u8; 16]>> for PekTable {
    fn from(keys: Vec<[u8; 16]>) -> Self {
        PekTable::new(keys)
    }
}
