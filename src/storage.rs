//! Storage layout for taskgate
//!
//! All persistent state lives under the data root:
//!
//! ```text
//! .taskgate.toml                # Configuration (optional)
//! .taskgate/                    # Data directory
//!   store.json                  # Entity store snapshot
//!   store.lock                  # Exclusive lock guarding store.json
//!   actor                       # Persisted acting user id
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::config::CONFIG_FILE;
use crate::error::Result;
use crate::lock;

/// Name of the data directory under the root
pub const DATA_DIR: &str = ".taskgate";

/// Storage manager for taskgate state
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the `.taskgate/` directory
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn store_file(&self) -> PathBuf {
        self.data_dir().join("store.json")
    }

    pub fn store_lock_file(&self) -> PathBuf {
        self.data_dir().join("store.lock")
    }

    pub fn actor_file(&self) -> PathBuf {
        self.data_dir().join("actor")
    }

    // =========================================================================
    // Directory initialization
    // =========================================================================

    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.data_dir())?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.data_dir().exists()
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Write JSON data atomically (write to temp, then rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    /// Read JSON data from a file
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Read JSON data, or the type's default when the file is missing
    pub fn read_json_or_default<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T> {
        if !path.exists() {
            return Ok(T::default());
        }
        self.read_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn paths_are_rooted() {
        let storage = Storage::new(PathBuf::from("/tmp/work"));
        assert_eq!(storage.data_dir(), PathBuf::from("/tmp/work/.taskgate"));
        assert_eq!(
            storage.store_file(),
            PathBuf::from("/tmp/work/.taskgate/store.json")
        );
        assert_eq!(storage.config_file(), PathBuf::from("/tmp/work/.taskgate.toml"));
    }

    #[test]
    fn json_round_trip_and_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Storage::new(dir.path().to_path_buf());
        assert!(!storage.is_initialized());
        storage.init().expect("init");
        assert!(storage.is_initialized());

        let missing: BTreeMap<String, u32> = storage
            .read_json_or_default(&storage.store_file())
            .expect("default");
        assert!(missing.is_empty());

        let mut data = BTreeMap::new();
        data.insert("a".to_string(), 1u32);
        storage.write_json(&storage.store_file(), &data).expect("write");
        let loaded: BTreeMap<String, u32> =
            storage.read_json(&storage.store_file()).expect("read");
        assert_eq!(loaded, data);
    }
}
