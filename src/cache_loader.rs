//! The [CacheLoader] reads a resource back out of a [DiskCache], throwing away entries which no longer decode.
//!
//! A decoder failing, or decoding to nothing, is always taken to mean that the entry on disk is bad: the entry is
//! deleted so that nobody pays for the doomed decode again, and the caller sees the same thing as for an entry which
//! was never there.  Whether to regenerate the data is up to the caller.
use crate::*;

#[derive(Debug)]
pub struct CacheLoader<D> {
    disk_cache: D,
}

impl<D: DiskCache> CacheLoader<D> {
    pub fn new(disk_cache: D) -> CacheLoader<D> {
        CacheLoader { disk_cache }
    }

    pub fn disk_cache(&self) -> &D {
        &self.disk_cache
    }

    /// Decode the entry for `key`, returning `None` if there isn't a usable one.
    ///
    /// `width`, `height` and `options` are handed to the decoder as-is.  Decoder errors never escape this function;
    /// they are logged and the entry is deleted.
    pub fn load<K, Dec>(
        &self,
        key: &K,
        decoder: &Dec,
        width: u32,
        height: u32,
        options: &DecodeOptions,
    ) -> Option<Dec::Output>
    where
        K: Key + ?Sized,
        Dec: ResourceDecoder<D::Location>,
    {
        let location = match self.disk_cache.get(key) {
            Some(l) => l,
            None => {
                log::trace!("No disk cache entry for {:?}", key);
                return None;
            }
        };

        match decoder.decode(&location, width, height, options) {
            Ok(Some(resource)) => Some(resource),
            Ok(None) => {
                log::debug!(
                    "Disk cache entry for {:?} decoded to nothing, deleting it",
                    key
                );
                self.disk_cache.delete(key);
                None
            }
            Err(e) => {
                log::warn!(
                    "Failed to decode disk cache entry for {:?}, deleting it: {}",
                    key,
                    e
                );
                self.disk_cache.delete(key);
                None
            }
        }
    }
}
