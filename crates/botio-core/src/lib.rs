//! Botio Core - command storage and cache-aside resolution.
//!
//! Stores short "command → response" pairs in one of several backends and
//! serves them over a framed JSON-RPC transport, with a bounded in-process
//! cache in front of the store.
//!
//! # Example
//!
//! ```rust,ignore
//! use botio_core::{BotioServer, ServerConfig, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> botio_core::Result<()> {
//!     let config = ServerConfig::new("s3cret")
//!         .with_store(StoreConfig::embedded_default())
//!         .with_cache_capacity(1 << 30)
//!         .with_listen_addr("127.0.0.1:9091");
//!
//!     let server = BotioServer::start(config).await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod models;
pub mod rpc;
pub mod server;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use auth::TokenAuth;
pub use cache::{BoundedCache, Cache};
pub use cancel::{CallContext, CancellationToken, CancelledError};
pub use error::{BotioError, ErrorKind, Result};
pub use models::{BotCommand, BotCommands, Command, CommandRef, Empty, PendingResponse, Response};
pub use rpc::BotioClient;
pub use server::{BotioServer, BotioServerHandle, ServerConfig};
pub use service::CommandService;
pub use store::{PostgresConfig, Store, StoreConfig, TableName};
