//! The seams of the crate: a [Key] identifies a unit of cacheable work, a [DiskCache] maps keys to locations of
//! persisted bytes, and a [ResourceDecoder] turns one of those locations into an in-memory resource.
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use sha2::{Digest, Sha256};

/// Options handed to a [ResourceDecoder] untouched.
pub type DecodeOptions = HashMap<String, OptionValue, ahash::RandomState>;

/// A single decode option.
#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Identifies a unit of cacheable work.
///
/// Two keys refer to the same work iff they are equal; the same logical key may be built any number of times by
/// different callers.  The bytes fed to [Key::update_disk_cache_key] decide where the key lives on disk, so they must
/// be stable across runs.
pub trait Key: Hash + Eq + Debug + Send + Sync {
    fn update_disk_cache_key(&self, hasher: &mut Sha256);
}

impl Key for str {
    fn update_disk_cache_key(&self, hasher: &mut Sha256) {
        hasher.update(self.as_bytes());
    }
}

impl Key for String {
    fn update_disk_cache_key(&self, hasher: &mut Sha256) {
        self.as_str().update_disk_cache_key(hasher);
    }
}

/// Hex SHA-256 of a key's disk cache bytes, safe to use as a file name.
pub fn safe_key<K: Key + ?Sized>(key: &K) -> String {
    let mut hasher = Sha256::new();
    key.update_disk_cache_key(&mut hasher);
    hex::encode(hasher.finalize())
}

/// A persistent store of byte blobs addressed by [Key].
///
/// Deleting a key which isn't present must be a no-op.  Once a key is deleted, `get` must not return it again until
/// something repopulates it.
pub trait DiskCache: Send + Sync {
    /// Where the bytes for an entry live, for example a path.
    type Location;

    fn get<K: Key + ?Sized>(&self, key: &K) -> Option<Self::Location>;

    fn delete<K: Key + ?Sized>(&self, key: &K);
}

impl<D: DiskCache + ?Sized> DiskCache for Arc<D> {
    type Location = D::Location;

    fn get<K: Key + ?Sized>(&self, key: &K) -> Option<Self::Location> {
        (**self).get(key)
    }

    fn delete<K: Key + ?Sized>(&self, key: &K) {
        (**self).delete(key)
    }
}

/// Knows how to get from a persisted location to a decoded representation in memory.
///
/// `Ok(None)` means the bytes were readable but aren't a valid resource, for example because they were truncated.
pub trait ResourceDecoder<Location> {
    type Output;
    type Error: std::error::Error;

    fn decode(
        &self,
        location: &Location,
        width: u32,
        height: u32,
        options: &DecodeOptions,
    ) -> Result<Option<Self::Output>, Self::Error>;
}
