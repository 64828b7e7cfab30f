//! Wire format shared by the RPC server and client.
//!
//! Each message is a 4-byte big-endian length prefix followed by a UTF-8
//! JSON-RPC 2.0 payload.
//!
//! ```text
//! [u32 BE: len][UTF-8 JSON bytes of len]
//! ```
//!
//! Requests carry an extra `metadata` object next to the standard fields;
//! the shared-secret token travels there under the `token` key.

use crate::config::{AppConfig, RpcConfig};
use crate::{BotioError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Method names understood by the server.
pub mod methods {
    pub const ADD_COMMAND: &str = "AddCommand";
    pub const GET_COMMAND: &str = "GetCommand";
    pub const LIST_COMMANDS: &str = "ListCommands";
    pub const UPDATE_COMMAND: &str = "UpdateCommand";
    pub const DELETE_COMMAND: &str = "DeleteCommand";
    /// Liveness check; the only method that needs no token.
    pub const HEALTH: &str = "Health";
}

/// Standard JSON-RPC error codes used by the transport itself.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl RpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(method: impl Into<String>, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: RpcConfig::JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
            id: Some(serde_json::Value::Number(id.into())),
            metadata: HashMap::new(),
        }
    }

    /// Attach the shared-secret token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.metadata
            .insert(AppConfig::TOKEN_METADATA_KEY.to_string(), token.into());
        self
    }

    /// The token presented with this request, if any.
    pub fn token(&self) -> Option<&str> {
        self.metadata
            .get(AppConfig::TOKEN_METADATA_KEY)
            .map(String::as_str)
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

impl RpcResponse {
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: RpcConfig::JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<serde_json::Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: RpcConfig::JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(RpcError { code, message }),
            id,
        }
    }

    /// Build an error response from a [`BotioError`].
    pub fn from_error(id: Option<serde_json::Value>, err: &BotioError) -> Self {
        Self::error(id, err.to_rpc_error_code(), err.to_string())
    }

    /// Turn the response back into a result, rebuilding remote errors.
    pub fn into_result(self) -> Result<serde_json::Value> {
        if let Some(err) = self.error {
            return Err(BotioError::from_rpc(err.code, err.message));
        }
        self.result.ok_or_else(|| BotioError::Protocol {
            code: codes::INVALID_REQUEST,
            message: "RPC response missing result".to_string(),
        })
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

/// Read a length-prefixed frame.
///
/// Returns `None` on clean EOF (peer closed connection).
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > RpcConfig::MAX_MESSAGE_SIZE {
        return Err(BotioError::invalid_argument(
            "rpc_frame",
            format!(
                "message size {} exceeds maximum {}",
                len,
                RpcConfig::MAX_MESSAGE_SIZE
            ),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write a length-prefixed frame.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > RpcConfig::MAX_MESSAGE_SIZE {
        return Err(BotioError::invalid_argument(
            "rpc_frame",
            format!(
                "message size {} exceeds maximum {}",
                payload.len(),
                RpcConfig::MAX_MESSAGE_SIZE
            ),
        ));
    }

    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
