//! A [CoalescingLoader] stops multiple threads from loading the same key at once.
//!
//! The first caller for a key runs the load; anyone asking for that key while it is in flight waits for it and gets
//! the same `Arc` back, or the same `None`.  Nothing is remembered once the load finishes; this is not a cache.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::*;

type InFlightMap<K, R> = HashMap<K, Arc<InFlight<R>>, ahash::RandomState>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The result slot for one in-progress load.
struct InFlight<R> {
    /// `None` until the leader publishes.
    result: Mutex<Option<Option<Arc<R>>>>,
    ready: Condvar,
    /// Callers waiting on the leader.
    waiters: AtomicUsize,
}

impl<R> InFlight<R> {
    fn new() -> InFlight<R> {
        InFlight {
            result: Mutex::new(None),
            ready: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    fn publish(&self, result: Option<Arc<R>>) {
        *lock(&self.result) = Some(result);
        self.ready.notify_all();
    }

    /// Register as a waiter.  Must be called with the in-flight map locked, and paired with [InFlight::wait].
    fn attach(self: &Arc<Self>) -> Arc<Self> {
        self.waiters.fetch_add(1, Ordering::SeqCst);
        self.clone()
    }

    fn wait(&self) -> Option<Arc<R>> {
        let mut guard = lock(&self.result);
        loop {
            if let Some(r) = &*guard {
                self.waiters.fetch_sub(1, Ordering::SeqCst);
                return r.clone();
            }
            guard = self
                .ready
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Publishes and unregisters the leader's load even if the decoder panics, so waiters are never stranded.
struct LeaderGuard<'a, K: Key + Clone, R> {
    in_flight: &'a Mutex<InFlightMap<K, R>>,
    key: &'a K,
    flight: Arc<InFlight<R>>,
    published: bool,
}

impl<'a, K: Key + Clone, R> LeaderGuard<'a, K, R> {
    fn finish(mut self, result: Option<Arc<R>>) {
        self.release(result);
    }

    fn release(&mut self, result: Option<Arc<R>>) {
        lock(self.in_flight).remove(self.key);
        self.flight.publish(result);
        self.published = true;
    }
}

impl<'a, K: Key + Clone, R> Drop for LeaderGuard<'a, K, R> {
    fn drop(&mut self) {
        if !self.published {
            self.release(None);
        }
    }
}

pub struct CoalescingLoader<D, K: Key + Clone, R> {
    loader: CacheLoader<D>,
    in_flight: Mutex<InFlightMap<K, R>>,
}

impl<D: DiskCache, K: Key + Clone, R> CoalescingLoader<D, K, R> {
    pub fn new(loader: CacheLoader<D>) -> CoalescingLoader<D, K, R> {
        CoalescingLoader {
            loader,
            in_flight: Default::default(),
        }
    }

    pub fn cache_loader(&self) -> &CacheLoader<D> {
        &self.loader
    }

    /// Number of keys currently being loaded.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Load `key` through the wrapped [CacheLoader], sharing the work with any concurrent load of the same key.
    pub fn load<Dec>(
        &self,
        key: &K,
        decoder: &Dec,
        width: u32,
        height: u32,
        options: &DecodeOptions,
    ) -> Option<Arc<R>>
    where
        Dec: ResourceDecoder<D::Location, Output = R>,
    {
        let (flight, leader) = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(key) {
                Some(f) => (f.attach(), false),
                None => {
                    let f = Arc::new(InFlight::new());
                    in_flight.insert(key.clone(), f.clone());
                    (f, true)
                }
            }
        };

        if !leader {
            log::trace!("Waiting on in-flight load of {:?}", key);
            return flight.wait();
        }

        let guard = LeaderGuard {
            in_flight: &self.in_flight,
            key,
            flight,
            published: false,
        };
        let result = self
            .loader
            .load(key, decoder, width, height, options)
            .map(Arc::new);
        guard.finish(result.clone());
        result
    }
}
