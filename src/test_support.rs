//! Recording fakes for the cache traits, shared by the unit tests.
use std::collections::HashMap;
use std::io::{Error as IoError, ErrorKind};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::*;

/// A disk cache wrapping a `HashMap` from safe key to path, which remembers every delete.
pub(crate) struct RecordingDiskCache {
    entries: Mutex<HashMap<String, PathBuf>>,
    deleted: Mutex<Vec<String>>,
}

impl RecordingDiskCache {
    pub(crate) fn new() -> RecordingDiskCache {
        RecordingDiskCache {
            entries: Default::default(),
            deleted: Default::default(),
        }
    }

    pub(crate) fn insert<K: Key + ?Sized>(&self, key: &K, location: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(safe_key(key), PathBuf::from(location));
    }

    /// Safe keys passed to `delete`, in call order.
    pub(crate) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

impl DiskCache for RecordingDiskCache {
    type Location = PathBuf;

    fn get<K: Key + ?Sized>(&self, key: &K) -> Option<PathBuf> {
        self.entries.lock().unwrap().get(&safe_key(key)).cloned()
    }

    fn delete<K: Key + ?Sized>(&self, key: &K) {
        let key = safe_key(key);
        self.entries.lock().unwrap().remove(&key);
        self.deleted.lock().unwrap().push(key);
    }
}

#[derive(Clone)]
enum Outcome {
    Decode(String),
    Fail,
    Invalid,
}

pub(crate) type DecodeCall = (PathBuf, u32, u32, DecodeOptions);

/// A decoder which always gives the same answer and records what it was asked.
pub(crate) struct ScriptedDecoder {
    outcome: Outcome,
    calls: Mutex<Vec<DecodeCall>>,
}

impl ScriptedDecoder {
    fn new(outcome: Outcome) -> ScriptedDecoder {
        ScriptedDecoder {
            outcome,
            calls: Default::default(),
        }
    }

    pub(crate) fn returning(value: &str) -> ScriptedDecoder {
        ScriptedDecoder::new(Outcome::Decode(value.to_string()))
    }

    pub(crate) fn failing() -> ScriptedDecoder {
        ScriptedDecoder::new(Outcome::Fail)
    }

    pub(crate) fn invalid() -> ScriptedDecoder {
        ScriptedDecoder::new(Outcome::Invalid)
    }

    pub(crate) fn calls(&self) -> Vec<DecodeCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl ResourceDecoder<PathBuf> for ScriptedDecoder {
    type Output = String;
    type Error = IoError;

    fn decode(
        &self,
        location: &PathBuf,
        width: u32,
        height: u32,
        options: &DecodeOptions,
    ) -> Result<Option<String>, IoError> {
        self.calls
            .lock()
            .unwrap()
            .push((location.clone(), width, height, options.clone()));
        match &self.outcome {
            Outcome::Decode(v) => Ok(Some(v.clone())),
            Outcome::Fail => Err(IoError::new(ErrorKind::InvalidData, "Test")),
            Outcome::Invalid => Ok(None),
        }
    }
}
