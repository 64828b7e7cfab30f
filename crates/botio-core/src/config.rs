//! Centralized configuration for Botio.
//!
//! Constants for the RPC transport, cache, storage backends and chat bots.
//! Values supplied at runtime (CLI flags, environment) fall back to these.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "botio";
    /// Metadata key carrying the shared-secret token.
    pub const TOKEN_METADATA_KEY: &'static str = "token";
    /// Environment variable consulted for the shared secret.
    pub const TOKEN_ENV_VAR: &'static str = "BOTIO_TOKEN";
}

/// RPC transport configuration.
pub struct RpcConfig;

impl RpcConfig {
    pub const DEFAULT_ADDR: &'static str = "127.0.0.1:9091";
    pub const DEFAULT_GATEWAY_ADDR: &'static str = "127.0.0.1:8081";
    pub const MAX_MESSAGE_SIZE: usize = 1_048_576; // 1MB
    pub const MAX_CONNECTIONS: usize = 256;
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const JSONRPC_VERSION: &'static str = "2.0";
    /// Maximum accepted HTTP request body for the gateway.
    pub const MAX_GATEWAY_BODY_BYTES: usize = 10_240;
}

/// Bounded cache configuration.
pub struct CacheSettings;

impl CacheSettings {
    /// Default capacity budget (1 GiB).
    pub const DEFAULT_CAPACITY: u64 = 1 << 30;
    /// Cost charged for every entry regardless of its size.
    pub const ENTRY_COST: u32 = 1;
}

/// Storage backend defaults.
pub struct StoreDefaults;

impl StoreDefaults {
    pub const COLLECTION: &'static str = "commands";
    pub const EMBEDDED_PATH: &'static str = "./botio.db";
    pub const SQLITE_PATH: &'static str = "./botio.sqlite";
    pub const POSTGRES_HOST: &'static str = "postgres";
    pub const POSTGRES_PORT: u16 = 5432;
    pub const POSTGRES_DATABASE: &'static str = "botio";
    pub const MAX_CONNECTIONS: u32 = 10;
    pub const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(1800);
    /// Longest accepted table/collection identifier.
    pub const MAX_IDENTIFIER_LEN: usize = 63;
}

/// Response dispatcher configuration.
pub struct DispatcherConfig;

impl DispatcherConfig {
    pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
}

/// Chat bot configuration.
pub struct BotSettings;

impl BotSettings {
    pub const DEFAULT_RESPONSE: &'static str =
        "I'm sorry but something's happened and I can't answer that command right now";
    pub const TELEGRAM_API_BASE: &'static str = "https://api.telegram.org";
    pub const TELEGRAM_POLL_TIMEOUT: Duration = Duration::from_secs(30);
    pub const TELEGRAM_RETRY_DELAY: Duration = Duration::from_secs(3);
}
