//! SQLite store backed by `rusqlite`.

use super::sql::{Dialect, Statements, TableName};
use super::{join_error, sealed, Store};
use crate::error::{BotioError, Result};
use crate::models::Command;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Single-file SQLite store.
///
/// The connection sits behind a mutex and every statement runs on the
/// blocking pool.
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    table: TableName,
    statements: Arc<Statements>,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    pub const BACKEND: &'static str = "sqlite";

    pub fn new(path: impl Into<PathBuf>, table: TableName) -> Self {
        let statements = Arc::new(Statements::new(&table, Dialect::Sqlite));
        Self {
            path: path.into(),
            table,
            statements,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Run `f` against the open connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &Statements) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let statements = Arc::clone(&self.statements);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|e| BotioError::Database {
                message: format!("Failed to lock database: {}", e),
                source: None,
            })?;
            let conn = guard.as_ref().ok_or(BotioError::NotConnected {
                backend: Self::BACKEND,
            })?;
            f(conn, &statements)
        })
        .await
        .map_err(|e| join_error(Self::BACKEND, e))?
    }
}

impl sealed::Sealed for SqliteStore {}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> &'static str {
        Self::BACKEND
    }

    async fn connect(&self) -> Result<()> {
        let path = self.path.clone();
        let conn = Arc::clone(&self.conn);
        let statements = Arc::clone(&self.statements);

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut guard = conn.lock().map_err(|e| BotioError::Database {
                message: format!("Failed to lock database: {}", e),
                source: None,
            })?;
            if guard.is_some() {
                return Ok(());
            }

            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| BotioError::Io {
                    message: format!("Failed to create database directory: {}", e),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }

            let opened = Connection::open(&path).map_err(|e| BotioError::Database {
                message: format!("Failed to open database: {}", e),
                source: Some(e),
            })?;

            opened
                .execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
                .map_err(|e| BotioError::Database {
                    message: format!("Failed to set pragmas: {}", e),
                    source: Some(e),
                })?;

            opened
                .execute(&statements.create_table, [])
                .map_err(|e| BotioError::Database {
                    message: format!("Failed to create table: {}", e),
                    source: Some(e),
                })?;

            debug!("Opened SQLite store at {:?}", path);
            *guard = Some(opened);
            Ok(())
        })
        .await
        .map_err(|e| join_error(Self::BACKEND, e))?
    }

    async fn add(&self, command: &Command) -> Result<()> {
        let command = command.clone();
        self.with_conn(move |conn, stmts| {
            conn.execute(&stmts.upsert, params![command.name, command.response])?;
            Ok(())
        })
        .await
    }

    async fn get(&self, name: &str) -> Result<Command> {
        let name = name.to_string();
        self.with_conn(move |conn, stmts| {
            let response: Option<String> = conn
                .query_row(&stmts.select_one, params![name], |row| row.get(0))
                .optional()?;
            match response {
                Some(response) => Ok(Command::new(name, response)),
                None => Err(BotioError::NotFound { name }),
            }
        })
        .await
    }

    async fn get_all(&self) -> Result<Vec<Command>> {
        self.with_conn(|conn, stmts| {
            let mut stmt = conn.prepare(&stmts.select_all)?;
            let rows = stmt.query_map([], |row| {
                Ok(Command {
                    name: row.get(0)?,
                    response: row.get(1)?,
                })
            })?;

            let mut commands = Vec::new();
            for row in rows {
                commands.push(row?);
            }
            Ok(commands)
        })
        .await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.with_conn(move |conn, stmts| {
            conn.execute(&stmts.delete, params![name])?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let taken = conn
                .lock()
                .map_err(|e| BotioError::Database {
                    message: format!("Failed to lock database: {}", e),
                    source: None,
                })?
                .take();

            if let Some(open) = taken {
                open.close().map_err(|(_, e)| BotioError::Database {
                    message: format!("Failed to close database: {}", e),
                    source: Some(e),
                })?;
            }
            Ok(())
        })
        .await
        .map_err(|e| join_error(Self::BACKEND, e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SqliteStore {
        SqliteStore::new(
            dir.path().join("botio.sqlite"),
            TableName::parse("commands").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_crud() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.connect().await.unwrap();

        store.add(&Command::new("start", "hi")).await.unwrap();
        store.add(&Command::new("help", "ask")).await.unwrap();
        store.update(&Command::new("start", "hello")).await.unwrap();

        assert_eq!(store.get("start").await.unwrap().response, "hello");
        assert_eq!(
            store.get_all().await.unwrap(),
            vec![Command::new("help", "ask"), Command::new("start", "hello")]
        );

        store.remove("start").await.unwrap();
        store.remove("start").await.unwrap();
        assert!(store.get("start").await.unwrap_err().is_not_found());
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_values_are_bound_not_interpolated() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.connect().await.unwrap();

        let tricky = Command::new("x'); DROP TABLE commands; --", "it's fine");
        store.add(&tricky).await.unwrap();
        assert_eq!(store.get(&tricky.name).await.unwrap(), tricky);
        assert_eq!(store.get_all().await.unwrap().len(), 1);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_store_rejects_operations() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(
            store.get_all().await,
            Err(BotioError::NotConnected { .. })
        ));

        store.connect().await.unwrap();
        store.close().await.unwrap();
        store.close().await.unwrap();
        assert!(matches!(
            store.remove("start").await,
            Err(BotioError::NotConnected { .. })
        ));
    }
}
