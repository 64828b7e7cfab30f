//! Embedded key-value store backed by `sled`.
//!
//! Commands live in one tree (the collection) of a single-file database.
//! Keys are command names, values are responses, both UTF-8.

use super::{join_error, sealed, Store};
use crate::error::{BotioError, Result};
use crate::models::Command;
use async_trait::async_trait;
use sled::{Db, IVec, Tree};
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug)]
pub struct EmbeddedStore {
    path: PathBuf,
    collection: String,
    handle: RwLock<Option<(Db, Tree)>>,
}

impl EmbeddedStore {
    pub const BACKEND: &'static str = "embedded";

    pub fn new(path: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            collection: collection.into(),
            handle: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn tree(&self) -> Result<Tree> {
        let guard = self
            .handle
            .read()
            .map_err(|e| BotioError::Other(format!("Failed to acquire read lock: {}", e)))?;
        guard
            .as_ref()
            .map(|(_, tree)| tree.clone())
            .ok_or(BotioError::NotConnected {
                backend: Self::BACKEND,
            })
    }

    /// Run `f` against the collection tree on the blocking pool.
    async fn with_tree<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tree) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tree = self.tree()?;
        tokio::task::spawn_blocking(move || f(&tree))
            .await
            .map_err(|e| join_error(Self::BACKEND, e))?
    }
}

fn decode(bytes: IVec, what: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| BotioError::Embedded {
        message: format!("stored {} is not valid UTF-8: {}", what, e),
        source: None,
    })
}

impl sealed::Sealed for EmbeddedStore {}

#[async_trait]
impl Store for EmbeddedStore {
    fn backend(&self) -> &'static str {
        Self::BACKEND
    }

    async fn connect(&self) -> Result<()> {
        if self.tree().is_ok() {
            return Ok(());
        }

        let path = self.path.clone();
        let collection = self.collection.clone();
        let opened = tokio::task::spawn_blocking(move || -> Result<(Db, Tree)> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| BotioError::io_with_path(e, parent))?;
            }
            let db = sled::open(&path)?;
            let tree = db.open_tree(collection.as_bytes())?;
            Ok((db, tree))
        })
        .await
        .map_err(|e| join_error(Self::BACKEND, e))??;

        let mut guard = self
            .handle
            .write()
            .map_err(|e| BotioError::Other(format!("Failed to acquire write lock: {}", e)))?;
        if guard.is_none() {
            *guard = Some(opened);
        }
        debug!("Opened embedded store at {:?}", self.path);
        Ok(())
    }

    async fn add(&self, command: &Command) -> Result<()> {
        let command = command.clone();
        self.with_tree(move |tree| {
            tree.insert(command.name.as_bytes(), command.response.as_bytes())?;
            tree.flush()?;
            Ok(())
        })
        .await
    }

    async fn get(&self, name: &str) -> Result<Command> {
        let name = name.to_string();
        self.with_tree(move |tree| match tree.get(name.as_bytes())? {
            Some(value) => {
                let response = decode(value, "response")?;
                Ok(Command::new(name, response))
            }
            None => Err(BotioError::NotFound { name }),
        })
        .await
    }

    async fn get_all(&self) -> Result<Vec<Command>> {
        self.with_tree(|tree| {
            tree.iter()
                .map(|entry| {
                    let (key, value) = entry?;
                    Ok(Command::new(
                        decode(key, "command")?,
                        decode(value, "response")?,
                    ))
                })
                .collect()
        })
        .await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.with_tree(move |tree| {
            tree.remove(name.as_bytes())?;
            tree.flush()?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let taken = self
            .handle
            .write()
            .map_err(|e| BotioError::Other(format!("Failed to acquire write lock: {}", e)))?
            .take();

        if let Some((db, _tree)) = taken {
            tokio::task::spawn_blocking(move || db.flush())
                .await
                .map_err(|e| join_error(Self::BACKEND, e))??;
            debug!("Closed embedded store at {:?}", self.path);
        }
        Ok(())
    }
}
