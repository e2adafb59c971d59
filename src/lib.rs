//! The caching end of a resource loading pipeline.
//!
//! Producing a resource (fetching bytes over the network, then decoding them into an image or similar) is costly, so
//! the results are written to a persistent cache and read back on later requests.  The bytes on disk can't be trusted
//! blindly: a crash mid-write or a format change can leave entries which no longer decode.  This crate provides:
//!
//! - [CacheLoader], which looks a key up in a [DiskCache], decodes it with a [ResourceDecoder], and deletes the entry
//!   if the decoder fails or produces nothing.  Callers only ever see a resource or `None`.
//! - [CoalescingLoader], which layers "at most one load per key at a time" on top of a [CacheLoader].
//! - [ModelCache], a fixed-capacity Lru cache keyed on a model plus the requested width and height, used to memoize
//!   values derived from models so that equal requests share them.
//! - [FilesystemDiskCache], a [DiskCache] which stores each entry as a file named after the hash of its key.
//! - The [ModelLoader] family of traits, which turn a model into a [DataFetcher] for its bytes, plus [UrlLoader], an
//!   implementation for URLs which shares parsed models through a [ModelCache].
//!
//! To use the disk half, implement [Key] for your keys and [ResourceDecoder] for your resources, then construct a
//! [CacheLoader] over a [FilesystemDiskCache] or your own [DiskCache].
mod cache_loader;
mod coalescing_loader;
mod filesystem_disk_cache;
mod lru_list;
mod model_cache;
mod model_loader;
#[cfg(test)]
mod test_support;
mod traits;
mod url_loader;

pub use cache_loader::*;
pub use coalescing_loader::*;
pub use filesystem_disk_cache::*;
pub use model_cache::*;
pub use model_loader::*;
pub use traits::*;
pub use url_loader::*;
