//! TCP RPC client.
//!
//! Connects on first use and reconnects on the next call after the
//! connection breaks. Every request carries the shared-secret token.
//!
//! # Thread Safety
//!
//! The client uses a tokio `Mutex` to serialize access to the TCP stream,
//! allowing safe concurrent use from multiple async tasks.

use super::protocol::{methods, read_frame, write_frame, RpcRequest, RpcResponse};
use crate::config::RpcConfig;
use crate::models::{BotCommand, BotCommands, Command, CommandRef, Empty};
use crate::{BotioError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// Client for a Botio RPC server.
#[derive(Debug)]
pub struct BotioClient {
    addr: String,
    token: String,
    stream: Mutex<Option<TcpStream>>,
    next_id: AtomicU64,
}

impl BotioClient {
    /// Create a client for `addr`. No connection is made until the first call.
    pub fn new(addr: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            token: token.into(),
            stream: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn open(&self) -> Result<TcpStream> {
        let stream = tokio::time::timeout(RpcConfig::CONNECT_TIMEOUT, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| BotioError::Network {
                message: format!("Timed out connecting to {}", self.addr),
            })?
            .map_err(|e| BotioError::Network {
                message: format!("Failed to connect to {}: {}", self.addr, e),
            })?;

        debug!("RPC client connected to {}", self.addr);
        Ok(stream)
    }

    /// Call a JSON-RPC method and return its raw result.
    pub async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(method, params, id).with_token(self.token.clone());
        let request_bytes = serde_json::to_vec(&request)?;

        let mut guard = self.stream.lock().await;
        if guard.is_none() {
            *guard = Some(self.open().await?);
        }
        let stream = guard.as_mut().ok_or_else(|| BotioError::Network {
            message: format!("No connection to {}", self.addr),
        })?;

        let exchanged = Self::exchange(stream, &request_bytes).await;
        let response_bytes = match exchanged {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                guard.take();
                return Err(BotioError::Network {
                    message: format!("Connection to {} closed", self.addr),
                });
            }
            Err(e) => {
                guard.take();
                return Err(BotioError::Network {
                    message: format!("RPC to {} failed: {}", self.addr, e),
                });
            }
        };
        drop(guard);

        let response: RpcResponse =
            serde_json::from_slice(&response_bytes).map_err(|e| BotioError::Json {
                message: format!("Failed to parse RPC response: {}", e),
                source: Some(e),
            })?;

        response.into_result()
    }

    async fn exchange(stream: &mut TcpStream, request: &[u8]) -> Result<Option<Vec<u8>>> {
        let (mut reader, mut writer) = stream.split();
        write_frame(&mut writer, request).await?;
        read_frame(&mut reader).await
    }

    async fn typed<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R> {
        let value = self.call(method, serde_json::to_value(params)?).await?;
        serde_json::from_value(value).map_err(|e| BotioError::Json {
            message: format!("Unexpected {} result: {}", method, e),
            source: Some(e),
        })
    }

    pub async fn add_command(&self, command: Command) -> Result<()> {
        let _: Empty = self
            .typed(methods::ADD_COMMAND, BotCommand::from(command))
            .await?;
        Ok(())
    }

    pub async fn get_command(&self, name: &str) -> Result<Command> {
        let found: BotCommand = self
            .typed(methods::GET_COMMAND, CommandRef::new(name))
            .await?;
        Ok(found.into())
    }

    pub async fn list_commands(&self) -> Result<Vec<Command>> {
        let list: BotCommands = self.typed(methods::LIST_COMMANDS, Empty {}).await?;
        Ok(list.items.into_iter().map(Command::from).collect())
    }

    pub async fn update_command(&self, command: Command) -> Result<()> {
        let _: Empty = self
            .typed(methods::UPDATE_COMMAND, BotCommand::from(command))
            .await?;
        Ok(())
    }

    pub async fn delete_command(&self, name: &str) -> Result<()> {
        let _: Empty = self
            .typed(methods::DELETE_COMMAND, CommandRef::new(name))
            .await?;
        Ok(())
    }

    /// Liveness check. Does not need a valid token.
    pub async fn health(&self) -> Result<()> {
        self.call(methods::HEALTH, serde_json::json!({})).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_to_dead_server_is_network_error() {
        let client = BotioClient::new("127.0.0.1:1", "s3cret");
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, BotioError::Network { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Internal);
    }
}
