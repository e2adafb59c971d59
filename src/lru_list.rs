//! An [LruList] is an Lru cache which holds at most a fixed number of entries.
//!
//! Entries sit in a `Vec` of slots threaded into a recency chain by index, most recent at the head.  A hash map from key
//! to slot index makes lookups constant time, and slots vacated by eviction or removal are kept on a free chain for the
//! next insert.  Values are handed out as `Arc` clones so callers may keep them after they fall out of the list.
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use ahash::RandomState;

struct Occupied<K, V> {
    key: Arc<K>,
    value: Arc<V>,
    /// Towards the most recently used end.
    prev: Option<usize>,
    /// Towards the least recently used end.
    next: Option<usize>,
}

enum Slot<K, V> {
    /// Free, possibly pointing at the next free slot.
    Free { next_free: Option<usize> },
    Occupied(Occupied<K, V>),
}

impl<K, V> Slot<K, V> {
    fn occupied_mut(&mut self) -> &mut Occupied<K, V> {
        match self {
            Slot::Occupied(ref mut x) => x,
            _ => panic!("Slot should be occupied"),
        }
    }

    fn occupied(&self) -> &Occupied<K, V> {
        match self {
            Slot::Occupied(ref x) => x,
            _ => panic!("Slot should be occupied"),
        }
    }
}

pub(crate) struct LruList<K: Hash + Eq, V> {
    slots: Vec<Slot<K, V>>,
    index: HashMap<Arc<K>, usize, RandomState>,
    capacity: usize,
    /// Most recently used.
    head: Option<usize>,
    /// Least recently used; the next eviction candidate.
    tail: Option<usize>,
    free_head: Option<usize>,
}

impl<K: Hash + Eq, V> LruList<K, V> {
    pub(crate) fn new(capacity: usize) -> LruList<K, V> {
        LruList {
            slots: Default::default(),
            index: Default::default(),
            capacity,
            head: None,
            tail: None,
            free_head: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    /// Take an occupied slot out of the list without freeing it.
    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let entry = self.slots[slot].occupied();
            (entry.prev, entry.next)
        };

        match prev {
            Some(p) => self.slots[p].occupied_mut().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].occupied_mut().prev = prev,
            None => self.tail = prev,
        }

        let entry = self.slots[slot].occupied_mut();
        entry.prev = None;
        entry.next = None;
    }

    /// Link an occupied, unlinked slot in as the most recent entry.
    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        self.slots[slot].occupied_mut().next = old_head;
        if let Some(h) = old_head {
            self.slots[h].occupied_mut().prev = Some(slot);
        }
        self.head = Some(slot);

        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    /// Look up by any borrowed form of the key, as `HashMap` does.
    pub(crate) fn get<Q>(&mut self, key: &Q) -> Option<Arc<V>>
    where
        Arc<K>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        self.unlink(slot);
        self.push_front(slot);
        Some(self.slots[slot].occupied().value.clone())
    }

    /// Free an occupied slot, returning its value.
    fn free(&mut self, slot: usize) -> Arc<V> {
        self.unlink(slot);
        let old = std::mem::replace(
            &mut self.slots[slot],
            Slot::Free {
                next_free: self.free_head,
            },
        );
        self.free_head = Some(slot);
        match old {
            Slot::Occupied(Occupied { key, value, .. }) => {
                self.index.remove(&key);
                value
            }
            _ => panic!("Should have been occupied"),
        }
    }

    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<Arc<V>>
    where
        Arc<K>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        Some(self.free(slot))
    }

    fn take_free_slot(&mut self) -> usize {
        if let Some(f) = self.free_head {
            self.free_head = match self.slots[f] {
                Slot::Free { next_free } => next_free,
                _ => panic!("Slot should be free"),
            };
            return f;
        }

        self.slots.push(Slot::Free { next_free: None });
        self.slots.len() - 1
    }

    /// Insert or replace an entry, making it the most recent.  Returns the replaced value, if any.
    ///
    /// With a capacity of zero the entry is evicted again immediately.
    pub(crate) fn insert(&mut self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        let replaced = self.remove::<K>(&key);
        let key = Arc::new(key);
        let slot = self.take_free_slot();
        self.slots[slot] = Slot::Occupied(Occupied {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.index.insert(key, slot);
        self.push_front(slot);

        self.evict_to_capacity();
        replaced
    }

    fn evict_to_capacity(&mut self) {
        while self.len() > self.capacity {
            let lru = match self.tail {
                Some(t) => t,
                None => panic!("Not enough entries to explain length"),
            };
            self.free(lru);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
        self.free_head = None;
    }

    /// Iterator visiting entries in most-recently-used order.
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            let slot = cur?;
            let entry = self.slots[slot].occupied();
            cur = entry.next;
            Some((&*entry.key, &*entry.value))
        })
    }
}
