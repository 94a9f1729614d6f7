//! On-disk store: one JSON document guarded by an exclusive file lock.
//!
//! Each call locks `.taskgate/store.lock`, loads `.taskgate/store.json`,
//! applies the change and, only when it succeeds, rewrites the document
//! atomically. Reads take the same lock so they never see a half-applied
//! write from another process.

use async_trait::async_trait;
use tracing::debug;

use super::{StateBackend, StoreState};
use crate::error::Result;
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::storage::Storage;

#[derive(Debug, Clone)]
pub struct FileStore {
    storage: Storage,
}

impl FileStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn lock(&self) -> Result<FileLock> {
        self.storage.init()?;
        FileLock::acquire(self.storage.store_lock_file(), DEFAULT_LOCK_TIMEOUT_MS)
    }

    fn load(&self) -> Result<StoreState> {
        self.storage
            .read_json_or_default(&self.storage.store_file())
    }
}

#[async_trait]
impl StateBackend for FileStore {
    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StoreState) -> Result<T> + Send,
    {
        let _guard = self.lock()?;
        let state = self.load()?;
        f(&state)
    }

    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut StoreState) -> Result<T> + Send,
    {
        let _guard = self.lock()?;
        let mut state = self.load()?;
        let value = f(&mut state)?;
        self.storage
            .write_json(&self.storage.store_file(), &state)?;
        debug!(path = %self.storage.store_file().display(), "store written");
        Ok(value)
    }
}
