//! In-process store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{StateBackend, StoreState};
use crate::error::Result;

/// Entity store kept in memory behind an async read/write lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> StoreState {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl StateBackend for MemoryStore {
    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StoreState) -> Result<T> + Send,
    {
        let state = self.state.read().await;
        f(&*state)
    }

    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut StoreState) -> Result<T> + Send,
    {
        let mut state = self.state.write().await;
        f(&mut *state)
    }
}
