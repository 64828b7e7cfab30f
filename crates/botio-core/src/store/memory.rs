//! In-memory store for tests.

use super::{sealed, Store};
use crate::error::{BotioError, Result};
use crate::models::Command;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// A map guarded by a mutex. Not durable.
///
/// Each instance owns its own map; nothing is shared between instances.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub const BACKEND: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> Result<T> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| BotioError::Other(format!("Failed to lock memory store: {}", e)))?;
        let entries = guard.as_mut().ok_or(BotioError::NotConnected {
            backend: Self::BACKEND,
        })?;
        Ok(f(entries))
    }
}

impl sealed::Sealed for MemoryStore {}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        Self::BACKEND
    }

    async fn connect(&self) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| BotioError::Other(format!("Failed to lock memory store: {}", e)))?;
        guard.get_or_insert_with(BTreeMap::new);
        Ok(())
    }

    async fn add(&self, command: &Command) -> Result<()> {
        self.with_entries(|entries| {
            entries.insert(command.name.clone(), command.response.clone());
        })
    }

    async fn get(&self, name: &str) -> Result<Command> {
        self.with_entries(|entries| entries.get(name).cloned())?
            .map(|response| Command::new(name, response))
            .ok_or_else(|| BotioError::NotFound {
                name: name.to_string(),
            })
    }

    async fn get_all(&self) -> Result<Vec<Command>> {
        self.with_entries(|entries| {
            entries
                .iter()
                .map(|(name, response)| Command::new(name.clone(), response.clone()))
                .collect()
        })
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.remove(name);
        })
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| BotioError::Other(format!("Failed to lock memory store: {}", e)))?;
        guard.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    async fn connected() -> MemoryStore {
        let store = MemoryStore::new();
        store.connect().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_add_get_update_remove() {
        let store = connected().await;

        store.add(&Command::new("start", "hi")).await.unwrap();
        assert_eq!(store.get("start").await.unwrap(), Command::new("start", "hi"));

        store.update(&Command::new("start", "hello")).await.unwrap();
        assert_eq!(store.get("start").await.unwrap().response, "hello");

        store.remove("start").await.unwrap();
        store.remove("start").await.unwrap();
        assert_eq!(store.get("start").await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_inserts_missing() {
        let store = connected().await;
        store.update(&Command::new("help", "ask")).await.unwrap();
        assert_eq!(store.get_all().await.unwrap(), vec![Command::new("help", "ask")]);
    }

    #[tokio::test]
    async fn test_operations_fail_before_connect_and_after_close() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get("start").await,
            Err(BotioError::NotConnected { .. })
        ));

        store.connect().await.unwrap();
        store.close().await.unwrap();
        assert!(matches!(
            store.add(&Command::new("a", "b")).await,
            Err(BotioError::NotConnected { .. })
        ));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_instances_are_isolated() {
        let a = connected().await;
        let b = connected().await;
        a.add(&Command::new("start", "hi")).await.unwrap();
        assert!(b.get_all().await.unwrap().is_empty());
    }
}
