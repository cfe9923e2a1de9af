//! Backing stores for fetched line lists.

use super::{DatabaseSource, LineRecord, WavenumberRange};
use std::{
    collections::HashMap,
    fmt, io,
    sync::{Mutex, PoisonError},
};

#[cfg(feature = "json")]
use super::fln;
#[cfg(feature = "json")]
use crate::io::utils;
#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "json")]
use std::path::{Path, PathBuf};

/// Identifies one cached line list.
///
/// Range bounds are compared by their bit patterns, so only requests for
/// exactly the same range share an entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    molecule_id: u8,
    isotopes: Vec<u8>,
    range_bits: (u64, u64),
    source: DatabaseSource,
}

impl CacheKey {
    pub fn new(
        molecule_id: u8,
        isotopes: &[u8],
        range: WavenumberRange,
        source: DatabaseSource,
    ) -> Self {
        Self {
            molecule_id,
            isotopes: isotopes.to_vec(),
            range_bits: (range.min().to_bits(), range.max().to_bits()),
            source,
        }
    }

    pub fn molecule_id(&self) -> u8 {
        self.molecule_id
    }

    pub fn isotopes(&self) -> &[u8] {
        &self.isotopes
    }

    pub fn source(&self) -> DatabaseSource {
        self.source
    }

    /// Returns the lower and upper wavenumber bound [cm⁻¹].
    pub fn range(&self) -> (f64, f64) {
        (
            f64::from_bits(self.range_bits.0),
            f64::from_bits(self.range_bits.1),
        )
    }

    /// Name that uniquely identifies the key and is safe to use as a file name.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{:02}_{}_{:016x}_{:016x}",
            self.source,
            self.molecule_id,
            self.isotopes
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join("-"),
            self.range_bits.0,
            self.range_bits.1
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (min, max) = self.range();
        write!(
            f,
            "{} molecule {} isotopes {:?} [{}, {}] cm⁻¹",
            self.source, self.molecule_id, self.isotopes, min, max
        )
    }
}

/// Persistent storage of line lists that survives the process.
pub trait LineStore: Send + Sync {
    /// Returns the stored lines for the key, or `None` if nothing is stored.
    fn load(&self, key: &CacheKey) -> io::Result<Option<Vec<LineRecord>>>;

    fn save(&self, key: &CacheKey, lines: &[LineRecord]) -> io::Result<()>;
}

/// Store that keeps nothing, so every new key goes to the remote.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLineStore;

impl LineStore for NoLineStore {
    fn load(&self, _key: &CacheKey) -> io::Result<Option<Vec<LineRecord>>> {
        Ok(None)
    }

    fn save(&self, _key: &CacheKey, _lines: &[LineRecord]) -> io::Result<()> {
        Ok(())
    }
}

/// Store holding line lists in memory, mainly for testing.
#[derive(Debug, Default)]
pub struct MemoryLineStore {
    lines: Mutex<HashMap<CacheKey, Vec<LineRecord>>>,
}

impl MemoryLineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LineStore for MemoryLineStore {
    fn load(&self, key: &CacheKey) -> io::Result<Option<Vec<LineRecord>>> {
        Ok(self
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn save(&self, key: &CacheKey, lines: &[LineRecord]) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), lines.to_vec());
        Ok(())
    }
}

#[cfg(feature = "json")]
#[derive(Serialize, Deserialize)]
struct StoredLines {
    source: DatabaseSource,
    molecule_id: u8,
    isotopes: Vec<u8>,
    range: (fln, fln),
    lines: Vec<LineRecord>,
}

/// Store writing one JSON file per key into a cache directory.
#[cfg(feature = "json")]
#[derive(Clone, Debug)]
pub struct JsonLineStore {
    directory: PathBuf,
}

#[cfg(feature = "json")]
impl JsonLineStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_path(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(format!("{}.json", key.file_stem()))
    }
}

#[cfg(feature = "json")]
impl LineStore for JsonLineStore {
    fn load(&self, key: &CacheKey) -> io::Result<Option<Vec<LineRecord>>> {
        let file_path = self.file_path(key);
        if !file_path.exists() {
            return Ok(None);
        }
        let text = utils::read_text_file(&file_path)?;
        let stored: StoredLines = serde_json::from_str(&text)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        let stored_key = CacheKey::new(
            stored.molecule_id,
            &stored.isotopes,
            WavenumberRange::new(stored.range.0, stored.range.1)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?,
            stored.source,
        );
        if &stored_key != key {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Stored lines in {} belong to {}",
                    file_path.display(),
                    stored_key
                ),
            ));
        }
        Ok(Some(stored.lines))
    }

    fn save(&self, key: &CacheKey, lines: &[LineRecord]) -> io::Result<()> {
        let stored = StoredLines {
            source: key.source(),
            molecule_id: key.molecule_id(),
            isotopes: key.isotopes().to_vec(),
            range: key.range(),
            lines: lines.to_vec(),
        };
        utils::write_atomically(&self.file_path(key), |writer| {
            serde_json::to_writer(writer, &stored)
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
        })
    }
}
