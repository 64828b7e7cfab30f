//! Persistent command storage.
//!
//! A [`Store`] is the source of truth for commands. Four backends implement
//! it and are chosen once, at construction, through [`StoreConfig::build`]:
//!
//! - **Embedded**: single-file `sled` database, one tree per collection
//! - **Sqlite**: single-file SQLite database via `rusqlite`
//! - **Postgres**: pooled `sqlx` connections
//! - **Memory**: a map guarded by a mutex, for tests only
//!
//! `add` and `update` are the same operation on every backend: an upsert
//! keyed by command name. The last write wins.

mod embedded;
mod memory;
mod postgres;
mod sql;
mod sqlite;

pub use embedded::EmbeddedStore;
pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresStore};
pub use sql::{Dialect, Statements, TableName};
pub use sqlite::SqliteStore;

use crate::config::StoreDefaults;
use crate::error::{BotioError, Result};
use crate::models::Command;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

mod sealed {
    pub trait Sealed {}
}

/// Command storage backend.
///
/// `connect` must succeed before any other call. After `close`, every
/// operation fails with [`BotioError::NotConnected`].
#[async_trait]
pub trait Store: sealed::Sealed + Send + Sync + std::fmt::Debug {
    /// Short backend name used in logs and errors.
    fn backend(&self) -> &'static str;

    /// Open the underlying handle and create the collection if missing.
    ///
    /// Calling `connect` on a connected store is a no-op.
    async fn connect(&self) -> Result<()>;

    /// Insert or overwrite the entry for `command.name`.
    async fn add(&self, command: &Command) -> Result<()>;

    /// Fetch a command, failing with [`BotioError::NotFound`] if absent.
    async fn get(&self, name: &str) -> Result<Command>;

    /// Every stored command. Order is backend-defined.
    async fn get_all(&self) -> Result<Vec<Command>>;

    /// Replace the response of `command.name`, inserting it if absent.
    async fn update(&self, command: &Command) -> Result<()> {
        self.add(command).await
    }

    /// Remove a command. Removing an absent command succeeds.
    async fn remove(&self, name: &str) -> Result<()>;

    /// Release the underlying handle.
    async fn close(&self) -> Result<()>;
}

/// Selects and configures a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Embedded { path: PathBuf, collection: String },
    Sqlite { path: PathBuf, table: String },
    Postgres(PostgresConfig),
    Memory,
}

impl StoreConfig {
    /// Embedded store at the default path and collection.
    pub fn embedded_default() -> Self {
        StoreConfig::Embedded {
            path: PathBuf::from(StoreDefaults::EMBEDDED_PATH),
            collection: StoreDefaults::COLLECTION.to_string(),
        }
    }

    /// Backend name for this configuration.
    pub fn backend(&self) -> &'static str {
        match self {
            StoreConfig::Embedded { .. } => EmbeddedStore::BACKEND,
            StoreConfig::Sqlite { .. } => SqliteStore::BACKEND,
            StoreConfig::Postgres(_) => PostgresStore::BACKEND,
            StoreConfig::Memory => MemoryStore::BACKEND,
        }
    }

    /// Build the configured backend. The returned store is not connected yet.
    pub fn build(&self) -> Result<Arc<dyn Store>> {
        let store: Arc<dyn Store> = match self {
            StoreConfig::Embedded { path, collection } => {
                if collection.is_empty() {
                    return Err(BotioError::invalid_argument(
                        "collection",
                        "collection name cannot be an empty string",
                    ));
                }
                Arc::new(EmbeddedStore::new(path.clone(), collection.clone()))
            }
            StoreConfig::Sqlite { path, table } => {
                Arc::new(SqliteStore::new(path.clone(), TableName::parse(table)?))
            }
            StoreConfig::Postgres(config) => Arc::new(PostgresStore::new(config.clone())?),
            StoreConfig::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(store)
    }
}

/// Map a failed blocking task into a store error.
pub(crate) fn join_error(backend: &'static str, err: tokio::task::JoinError) -> BotioError {
    BotioError::Other(format!("{} store task failed: {}", backend, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_selects_backend() {
        let store = StoreConfig::Memory.build().unwrap();
        assert_eq!(store.backend(), "memory");

        let store = StoreConfig::Sqlite {
            path: PathBuf::from("unused.sqlite"),
            table: "commands".into(),
        }
        .build()
        .unwrap();
        assert_eq!(store.backend(), "sqlite");

        assert_eq!(StoreConfig::embedded_default().backend(), "embedded");
    }

    #[test]
    fn test_build_rejects_bad_identifiers() {
        let err = StoreConfig::Sqlite {
            path: PathBuf::from("unused.sqlite"),
            table: "commands; DROP TABLE commands".into(),
        }
        .build()
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);

        let err = StoreConfig::Embedded {
            path: PathBuf::from("unused.db"),
            collection: String::new(),
        }
        .build()
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
    }
}
