//! A [ModelCache] memoizes values derived from a model at a given size, keeping at most a fixed number of them.
//!
//! The dimensions are part of the key: the same model requested at two sizes occupies two entries, since derived
//! values for image-like models commonly depend on the requested size.
use std::borrow::Borrow;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::lru_list::LruList;

/// The composite identity of a memoized value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelKey<M> {
    pub model: M,
    pub width: u32,
    pub height: u32,
}

/// A [ModelKey] seen through references, so that lookups don't need an owned model.
///
/// Owned keys and borrowed `(&M, width, height)` triples hash and compare through [KeyView::parts], which keeps the
/// two forms interchangeable in the index.
trait KeyView<M> {
    fn parts(&self) -> (&M, u32, u32);
}

impl<M> KeyView<M> for ModelKey<M> {
    fn parts(&self) -> (&M, u32, u32) {
        (&self.model, self.width, self.height)
    }
}

impl<M> KeyView<M> for (&M, u32, u32) {
    fn parts(&self) -> (&M, u32, u32) {
        (self.0, self.1, self.2)
    }
}

impl<M: Hash> Hash for ModelKey<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts().hash(state);
    }
}

impl<'a, M: Hash> Hash for dyn KeyView<M> + 'a {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts().hash(state);
    }
}

impl<'a, M: PartialEq> PartialEq for dyn KeyView<M> + 'a {
    fn eq(&self, other: &Self) -> bool {
        self.parts() == other.parts()
    }
}

impl<'a, M: Eq> Eq for dyn KeyView<M> + 'a {}

impl<'a, M: 'a> Borrow<dyn KeyView<M> + 'a> for Arc<ModelKey<M>> {
    fn borrow(&self) -> &(dyn KeyView<M> + 'a) {
        &**self
    }
}

impl<M> ModelKey<M> {
    pub fn new(model: M, width: u32, height: u32) -> ModelKey<M> {
        ModelKey {
            model,
            width,
            height,
        }
    }
}

/// A fixed-capacity, least-recently-used cache keyed on [ModelKey].
///
/// Every `get` and `put` updates recency, so both take the one internal lock.
pub struct ModelCache<M: Hash + Eq, V> {
    capacity: usize,
    entries: Mutex<LruList<ModelKey<M>, V>>,
}

impl<M: Hash + Eq, V> ModelCache<M, V> {
    pub fn new(capacity: usize) -> ModelCache<M, V> {
        ModelCache {
            capacity,
            entries: Mutex::new(LruList::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruList<ModelKey<M>, V>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the value for `model` at exactly this size, marking it as the most recently used.
    pub fn get(&self, model: &M, width: u32, height: u32) -> Option<Arc<V>> {
        let key = (model, width, height);
        self.lock().get(&key as &dyn KeyView<M>)
    }

    /// Insert or replace the value for `model` at this size, returning the replaced value.
    ///
    /// If this pushes the cache over capacity, the least recently used entry is evicted.
    pub fn put(&self, model: M, width: u32, height: u32, value: V) -> Option<Arc<V>> {
        self.put_shared(model, width, height, Arc::new(value))
    }

    /// Like [ModelCache::put], for a value the caller wants to keep sharing.
    pub fn put_shared(&self, model: M, width: u32, height: u32, value: Arc<V>) -> Option<Arc<V>> {
        self.lock()
            .insert(ModelKey::new(model, width, height), value)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
