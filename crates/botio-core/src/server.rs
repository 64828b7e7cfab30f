//! Server bootstrap: wires store, cache, service and RPC listener together.

use crate::auth::TokenAuth;
use crate::cache::{BoundedCache, Cache};
use crate::error::{BotioError, Result};
use crate::rpc::{CommandDispatch, RpcServer, RpcServerHandle};
use crate::service::CommandService;
use crate::store::{Store, StoreConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Everything needed to start a [`BotioServer`].
///
/// Validated once by [`ServerConfig::validate`]; a server is never started
/// with a missing collaborator.
///
/// # Example
///
/// ```rust,ignore
/// use botio_core::{ServerConfig, StoreConfig, BotioServer};
///
/// let config = ServerConfig::new("s3cret")
///     .with_store(StoreConfig::embedded_default())
///     .with_cache_capacity(1 << 30)
///     .with_listen_addr("127.0.0.1:9091");
/// let server = BotioServer::start(config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub store: Option<StoreConfig>,
    pub cache_capacity: Option<u64>,
    pub listen_addr: Option<String>,
    pub auth_token: String,
}

impl ServerConfig {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            store: None,
            cache_capacity: None,
            listen_addr: None,
            auth_token: auth_token.into(),
        }
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Use port 0 to let the OS pick one.
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Fail fast on a missing store, cache, listener or token.
    pub fn validate(&self) -> Result<()> {
        if self.store.is_none() {
            return Err(BotioError::config("no storage backend configured"));
        }
        if self.cache_capacity.is_none() {
            return Err(BotioError::config("no cache configured"));
        }
        if self.listen_addr.as_deref().map_or(true, str::is_empty) {
            return Err(BotioError::config("no listener configured"));
        }
        if self.auth_token.is_empty() {
            return Err(BotioError::config("authentication token cannot be empty"));
        }
        Ok(())
    }
}

/// Entry point for running the command service.
pub struct BotioServer;

impl BotioServer {
    /// Validate `config`, connect the store and start serving RPC.
    pub async fn start(config: ServerConfig) -> Result<BotioServerHandle> {
        config.validate()?;
        let (store_config, capacity, listen_addr) =
            match (config.store, config.cache_capacity, config.listen_addr) {
                (Some(s), Some(c), Some(l)) => (s, c, l),
                _ => return Err(BotioError::config("incomplete server configuration")),
            };

        let auth = TokenAuth::new(config.auth_token)?;
        let cache: Arc<dyn Cache> = Arc::new(BoundedCache::new(capacity)?);

        let store = store_config.build()?;
        store.connect().await.map_err(|e| {
            e.context(format!("while connecting to the {} store", store.backend()))
        })?;
        info!("Connected to {} store", store.backend());

        let service = CommandService::new(Arc::clone(&store), cache);
        let dispatch = Arc::new(CommandDispatch::new(service.clone(), auth.clone()));

        let rpc = match RpcServer::start(&listen_addr, dispatch).await {
            Ok(rpc) => rpc,
            Err(e) => {
                if let Err(close_err) = store.close().await {
                    error!("Failed to close store after bind failure: {}", close_err);
                }
                return Err(e);
            }
        };

        Ok(BotioServerHandle {
            rpc,
            store,
            service,
            auth,
        })
    }
}

/// A running server.
pub struct BotioServerHandle {
    rpc: RpcServerHandle,
    store: Arc<dyn Store>,
    service: CommandService,
    auth: TokenAuth,
}

impl BotioServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.rpc.addr()
    }

    /// The service behind the RPC listener, for in-process front ends.
    pub fn service(&self) -> &CommandService {
        &self.service
    }

    pub fn auth(&self) -> &TokenAuth {
        &self.auth
    }

    /// Stop the listener, wait for in-flight calls, then close the store.
    pub async fn shutdown(mut self) -> Result<()> {
        self.rpc.shutdown().await;
        self.store
            .close()
            .await
            .map_err(|e| e.context(format!("while closing the {} store", self.store.backend())))?;
        info!("Server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ServerConfig {
        ServerConfig::new("s3cret")
            .with_store(StoreConfig::Memory)
            .with_cache_capacity(64)
            .with_listen_addr("127.0.0.1:0")
    }

    #[test]
    fn test_validate_reports_missing_parts() {
        assert!(complete().validate().is_ok());

        let mut config = complete();
        config.store = None;
        assert!(config.validate().unwrap_err().to_string().contains("no storage backend"));

        let mut config = complete();
        config.cache_capacity = None;
        assert!(config.validate().unwrap_err().to_string().contains("no cache"));

        let mut config = complete();
        config.listen_addr = Some(String::new());
        assert!(config.validate().unwrap_err().to_string().contains("no listener"));

        let mut config = complete();
        config.auth_token = String::new();
        assert!(config.validate().unwrap_err().to_string().contains("token cannot be empty"));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let server = BotioServer::start(complete()).await.unwrap();
        assert!(server.addr().port() > 0);
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_cache_capacity_fails_start() {
        let err = BotioServer::start(complete().with_cache_capacity(0))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BotioError::Config { .. }));
    }
}
