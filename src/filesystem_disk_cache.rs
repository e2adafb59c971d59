use std::fs::File;
use std::io::{Error as IoError, ErrorKind, Result as IoResult, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::*;

const ENTRY_SUFFIX: &str = ".0";
const TEMP_SUFFIX: &str = ".tmp";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, thiserror::Error)]
pub enum DiskCacheError {
    #[error("disk cache I/O failed: {0}")]
    Io(#[from] IoError),
    #[error("disk cache root {0:?} is not a directory")]
    NotADirectory(PathBuf),
}

#[derive(Clone, Debug, derive_builder::Builder)]
pub struct FilesystemDiskCacheConfig {
    /// Directory holding the entries.
    #[builder(setter(into))]
    pub root_path: PathBuf,
    /// Create the root directory (and its parents) if it is missing.
    #[builder(default = "true")]
    pub create_root: bool,
}

/// A [DiskCache] which is backed by a given root directory.
///
/// Every entry is a single file whose name is the [safe_key] of its key, so keys never have to be valid paths and can
/// never escape the root.  Writes go through a temporary file which is renamed into place, so a reader never sees a
/// half-written entry from this process, though it may still see a corrupt one left behind by a crash.
#[derive(Debug)]
pub struct FilesystemDiskCache {
    root_path: PathBuf,
}

impl FilesystemDiskCache {
    pub fn new(config: FilesystemDiskCacheConfig) -> Result<FilesystemDiskCache, DiskCacheError> {
        if config.create_root {
            std::fs::create_dir_all(&config.root_path)?;
        }
        if !config.root_path.is_dir() {
            return Err(DiskCacheError::NotADirectory(config.root_path));
        }

        Ok(FilesystemDiskCache {
            root_path: config.root_path,
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Where the entry for `key` lives, whether or not it exists.
    pub fn entry_path<K: Key + ?Sized>(&self, key: &K) -> PathBuf {
        self.root_path
            .join(format!("{}{}", safe_key(key), ENTRY_SUFFIX))
    }

    /// Populate the entry for `key` by handing `writer` a fresh file.
    ///
    /// If `writer` fails, any previous entry is left alone and the partial file is removed.
    pub fn put<K, F>(&self, key: &K, writer: F) -> Result<PathBuf, DiskCacheError>
    where
        K: Key + ?Sized,
        F: FnOnce(&mut File) -> IoResult<()>,
    {
        let final_path = self.entry_path(key);
        let temp_path = self.root_path.join(format!(
            "{}.{}.{}{}",
            safe_key(key),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
            TEMP_SUFFIX
        ));

        let written = File::create(&temp_path).and_then(|mut file| {
            writer(&mut file)?;
            file.flush()?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| std::fs::rename(&temp_path, &final_path)) {
            if let Err(cleanup) = remove_if_exists(&temp_path) {
                log::warn!(
                    "Unable to remove temporary disk cache file {:?}: {}",
                    temp_path,
                    cleanup
                );
            }
            return Err(e.into());
        }

        log::trace!("Wrote disk cache entry for {:?} to {:?}", key, final_path);
        Ok(final_path)
    }

    /// Convenience wrapper over [FilesystemDiskCache::put] for in-memory data.
    pub fn put_bytes<K: Key + ?Sized>(
        &self,
        key: &K,
        bytes: &[u8],
    ) -> Result<PathBuf, DiskCacheError> {
        self.put(key, |f| f.write_all(bytes))
    }

    /// Remove every entry, plus any temporary files left over from interrupted writes.
    pub fn clear(&self) -> Result<(), DiskCacheError> {
        for dirent in std::fs::read_dir(&self.root_path)? {
            let path = dirent?.path();
            let ours = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(ENTRY_SUFFIX) || n.ends_with(TEMP_SUFFIX))
                .unwrap_or(false);
            if ours && path.is_file() {
                remove_if_exists(&path)?;
            }
        }
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> IoResult<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        r => r,
    }
}

impl DiskCache for FilesystemDiskCache {
    type Location = PathBuf;

    fn get<K: Key + ?Sized>(&self, key: &K) -> Option<PathBuf> {
        let path = self.entry_path(key);
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }

    fn delete<K: Key + ?Sized>(&self, key: &K) {
        let path = self.entry_path(key);
        if let Err(e) = remove_if_exists(&path) {
            log::warn!("Unable to delete disk cache entry {:?}: {}", path, e);
        }
    }
}
