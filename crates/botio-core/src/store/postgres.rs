//! PostgreSQL store backed by a `sqlx` connection pool.

use super::sql::{Dialect, Statements, TableName};
use super::{sealed, Store};
use crate::config::StoreDefaults;
use crate::error::{BotioError, Result};
use crate::models::Command;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for [`PostgresStore`].
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub table: String,
    pub max_connections: u32,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: StoreDefaults::POSTGRES_HOST.to_string(),
            port: StoreDefaults::POSTGRES_PORT,
            user: "postgres".to_string(),
            password: String::new(),
            database: StoreDefaults::POSTGRES_DATABASE.to_string(),
            table: StoreDefaults::COLLECTION.to_string(),
            max_connections: StoreDefaults::MAX_CONNECTIONS,
            max_lifetime: StoreDefaults::MAX_CONNECTION_LIFETIME,
        }
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("table", &self.table)
            .field("max_connections", &self.max_connections)
            .field("max_lifetime", &self.max_lifetime)
            .finish()
    }
}

impl PostgresConfig {
    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

#[derive(Debug)]
pub struct PostgresStore {
    config: PostgresConfig,
    statements: Statements,
    pool: RwLock<Option<PgPool>>,
}

impl PostgresStore {
    pub const BACKEND: &'static str = "postgres";

    /// Validates the table name; no connection is made yet.
    pub fn new(config: PostgresConfig) -> Result<Self> {
        let table = TableName::parse(&config.table)?;
        Ok(Self {
            statements: Statements::new(&table, Dialect::Postgres),
            config,
            pool: RwLock::new(None),
        })
    }

    pub fn statements(&self) -> &Statements {
        &self.statements
    }

    fn pool(&self) -> Result<PgPool> {
        let guard = self
            .pool
            .read()
            .map_err(|e| BotioError::Other(format!("Failed to acquire read lock: {}", e)))?;
        guard.clone().ok_or(BotioError::NotConnected {
            backend: Self::BACKEND,
        })
    }
}

impl sealed::Sealed for PostgresStore {}

#[async_trait]
impl Store for PostgresStore {
    fn backend(&self) -> &'static str {
        Self::BACKEND
    }

    async fn connect(&self) -> Result<()> {
        if self.pool().is_ok() {
            return Ok(());
        }

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .max_lifetime(self.config.max_lifetime)
            .connect_with(self.config.connect_options())
            .await
            .map_err(|e| BotioError::Postgres {
                message: format!(
                    "Failed to connect to {}:{}/{}: {}",
                    self.config.host, self.config.port, self.config.database, e
                ),
                source: Some(e),
            })?;

        sqlx::query(&self.statements.create_table)
            .execute(&pool)
            .await?;

        let mut guard = self
            .pool
            .write()
            .map_err(|e| BotioError::Other(format!("Failed to acquire write lock: {}", e)))?;
        if guard.is_none() {
            *guard = Some(pool);
            info!(
                "Connected to Postgres at {}:{}/{}",
                self.config.host, self.config.port, self.config.database
            );
        }
        Ok(())
    }

    async fn add(&self, command: &Command) -> Result<()> {
        let pool = self.pool()?;
        sqlx::query(&self.statements.upsert)
            .bind(&command.name)
            .bind(&command.response)
            .execute(&pool)
            .await?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Command> {
        let pool = self.pool()?;
        let response: Option<String> = sqlx::query_scalar::<_, String>(&self.statements.select_one)
            .bind(name)
            .fetch_optional(&pool)
            .await?;

        response
            .map(|response| Command::new(name, response))
            .ok_or_else(|| BotioError::NotFound {
                name: name.to_string(),
            })
    }

    async fn get_all(&self) -> Result<Vec<Command>> {
        let pool = self.pool()?;
        let rows: Vec<(String, String)> = sqlx::query_as::<_, (String, String)>(&self.statements.select_all)
            .fetch_all(&pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(name, response)| Command::new(name, response))
            .collect())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let pool = self.pool()?;
        sqlx::query(&self.statements.delete)
            .bind(name)
            .execute(&pool)
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let taken = self
            .pool
            .write()
            .map_err(|e| BotioError::Other(format!("Failed to acquire write lock: {}", e)))?
            .take();

        if let Some(pool) = taken {
            pool.close().await;
            debug!("Closed Postgres pool");
        }
        Ok(())
    }
}
