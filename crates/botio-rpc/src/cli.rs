//! Command-line interface definition.

use botio_core::config::{
    AppConfig, BotSettings, CacheSettings, DispatcherConfig, RpcConfig, StoreDefaults,
};
use botio_core::{PostgresConfig, StoreConfig};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = AppConfig::APP_NAME)]
#[command(about = "Command storage and chat bots", version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the RPC server and the HTTP/JSON gateway
    Server(ServerArgs),
    /// Run a chat bot backed by a Botio server
    Bot(BotArgs),
    /// Add a command
    Add(UpsertArgs),
    /// Print a command
    Get(NameArgs),
    /// Print every command
    List(ClientArgs),
    /// Change the response of a command
    Update(UpsertArgs),
    /// Delete a command
    Delete(NameArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Embedded,
    Sqlite,
    Postgres,
    Memory,
}

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Storage backend
    #[arg(value_enum)]
    pub store: StoreKind,

    /// RPC listen address
    #[arg(long, default_value = RpcConfig::DEFAULT_ADDR)]
    pub listen: String,

    /// HTTP/JSON gateway listen address
    #[arg(long, default_value = RpcConfig::DEFAULT_GATEWAY_ADDR)]
    pub http: String,

    /// Do not start the HTTP/JSON gateway
    #[arg(long)]
    pub no_http: bool,

    /// Cache capacity budget
    #[arg(long, default_value_t = CacheSettings::DEFAULT_CAPACITY)]
    pub cache_capacity: u64,

    /// Shared secret clients must present
    #[arg(long, env = AppConfig::TOKEN_ENV_VAR, hide_env_values = true)]
    pub token: String,

    /// Database file for the embedded and sqlite stores
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Collection (embedded) or table (sqlite, postgres) holding the commands
    #[arg(long, default_value = StoreDefaults::COLLECTION)]
    pub collection: String,

    #[command(flatten)]
    pub postgres: PostgresArgs,
}

#[derive(Args, Debug)]
pub struct PostgresArgs {
    /// Postgres host
    #[arg(long = "pg-host", default_value = StoreDefaults::POSTGRES_HOST)]
    pub host: String,

    /// Postgres port
    #[arg(long = "pg-port", default_value_t = StoreDefaults::POSTGRES_PORT)]
    pub port: u16,

    /// Postgres user
    #[arg(long = "pg-user", default_value = "postgres")]
    pub user: String,

    /// Postgres password
    #[arg(long = "pg-password", env = "BOTIO_PG_PASSWORD", hide_env_values = true, default_value = "")]
    pub password: String,

    /// Postgres database
    #[arg(long = "pg-database", default_value = StoreDefaults::POSTGRES_DATABASE)]
    pub database: String,

    /// Maximum pooled connections
    #[arg(long = "pg-max-connections", default_value_t = StoreDefaults::MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// Maximum lifetime of a pooled connection, in seconds
    #[arg(long = "pg-max-lifetime", default_value_t = StoreDefaults::MAX_CONNECTION_LIFETIME.as_secs())]
    pub max_lifetime_secs: u64,
}

impl ServerArgs {
    pub fn store_config(&self) -> StoreConfig {
        match self.store {
            StoreKind::Embedded => StoreConfig::Embedded {
                path: self
                    .path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(StoreDefaults::EMBEDDED_PATH)),
                collection: self.collection.clone(),
            },
            StoreKind::Sqlite => StoreConfig::Sqlite {
                path: self
                    .path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(StoreDefaults::SQLITE_PATH)),
                table: self.collection.clone(),
            },
            StoreKind::Postgres => StoreConfig::Postgres(PostgresConfig {
                host: self.postgres.host.clone(),
                port: self.postgres.port,
                user: self.postgres.user.clone(),
                password: self.postgres.password.clone(),
                database: self.postgres.database.clone(),
                table: self.collection.clone(),
                max_connections: self.postgres.max_connections,
                max_lifetime: Duration::from_secs(self.postgres.max_lifetime_secs),
            }),
            StoreKind::Memory => StoreConfig::Memory,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Telegram,
    Discord,
}

#[derive(Args, Debug)]
pub struct BotArgs {
    /// Chat platform to connect to
    #[arg(long, value_enum)]
    pub platform: Platform,

    /// Platform bot token
    #[arg(long, env = "BOTIO_PLATFORM_TOKEN", hide_env_values = true)]
    pub platform_token: String,

    #[command(flatten)]
    pub client: ClientArgs,

    /// Outbound reply queue size
    #[arg(long, default_value_t = DispatcherConfig::DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Reply sent when a command cannot be resolved
    #[arg(long, default_value = BotSettings::DEFAULT_RESPONSE)]
    pub resp: String,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Botio RPC server address
    #[arg(long, default_value = RpcConfig::DEFAULT_ADDR)]
    pub addr: String,

    /// Shared secret for the Botio server
    #[arg(long, env = AppConfig::TOKEN_ENV_VAR, hide_env_values = true)]
    pub token: String,
}

#[derive(Args, Debug)]
pub struct NameArgs {
    /// Command name
    #[arg(long)]
    pub command: String,

    #[command(flatten)]
    pub client: ClientArgs,
}

#[derive(Args, Debug)]
pub struct UpsertArgs {
    /// Command name
    #[arg(long)]
    pub command: String,

    /// Command response
    #[arg(long)]
    pub response: String,

    #[command(flatten)]
    pub client: ClientArgs,
}
