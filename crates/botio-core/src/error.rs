//! Error types for Botio.
//!
//! Every failure in the workspace is a [`BotioError`]. Callers that need to
//! react to a failure (RPC status codes, HTTP status codes, bot fallbacks)
//! branch on [`BotioError::kind`], which collapses the variants into the
//! five-way [`ErrorKind`] taxonomy.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Botio.
#[derive(Debug, Error)]
pub enum BotioError {
    // Lookup errors
    #[error("Command {name:?} not found")]
    NotFound { name: String },

    // Validation errors
    #[error("Invalid argument {field}: {message}")]
    InvalidArgument { field: String, message: String },

    // Authentication errors
    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    // Cancellation
    #[error("Operation was canceled")]
    Canceled,

    // Storage errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Postgres error: {message}")]
    Postgres {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    #[error("Embedded store error: {message}")]
    Embedded {
        message: String,
        #[source]
        source: Option<sled::Error>,
    },

    #[error("Store {backend} is not connected")]
    NotConnected { backend: &'static str },

    // Cache errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Transport errors
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("RPC protocol error ({code}): {message}")]
    Protocol { code: i32, message: String },

    /// Error reported by a remote Botio server.
    #[error("{message}")]
    Remote { kind: ErrorKind, message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Bot errors
    #[error("Dispatcher is stopped")]
    DispatcherStopped,

    #[error("{platform} error: {message}")]
    Platform { platform: String, message: String },

    /// Another error annotated with the operation that produced it.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<BotioError>,
    },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Botio operations.
pub type Result<T> = std::result::Result<T, BotioError>;

/// Coarse classification of a [`BotioError`], shared by every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Unauthenticated,
    Canceled,
    Internal,
}

impl ErrorKind {
    /// JSON-RPC error code for this kind.
    ///
    /// Application-defined codes live in the -32000 to -32099 range; invalid
    /// arguments reuse the standard "Invalid params" code and internal
    /// failures the standard "Internal error" code.
    pub fn rpc_code(self) -> i32 {
        match self {
            ErrorKind::Unauthenticated => -32001,
            ErrorKind::NotFound => -32002,
            ErrorKind::Canceled => -32004,
            ErrorKind::InvalidArgument => -32602,
            ErrorKind::Internal => -32603,
        }
    }

    /// Inverse of [`ErrorKind::rpc_code`]. Unknown codes are internal errors.
    pub fn from_rpc_code(code: i32) -> Self {
        match code {
            -32001 => ErrorKind::Unauthenticated,
            -32002 => ErrorKind::NotFound,
            -32004 => ErrorKind::Canceled,
            -32602 => ErrorKind::InvalidArgument,
            _ => ErrorKind::Internal,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Canceled => "canceled",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

// Conversion implementations for common error types

impl From<std::io::Error> for BotioError {
    fn from(err: std::io::Error) -> Self {
        BotioError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for BotioError {
    fn from(err: serde_json::Error) -> Self {
        BotioError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for BotioError {
    fn from(err: rusqlite::Error) -> Self {
        BotioError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<sqlx::Error> for BotioError {
    fn from(err: sqlx::Error) -> Self {
        BotioError::Postgres {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<sled::Error> for BotioError {
    fn from(err: sled::Error) -> Self {
        BotioError::Embedded {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<crate::cancel::CancelledError> for BotioError {
    fn from(_: crate::cancel::CancelledError) -> Self {
        BotioError::Canceled
    }
}

impl BotioError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        BotioError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create an invalid-argument error for `field`.
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        BotioError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        BotioError::Config {
            message: message.into(),
        }
    }

    /// Wrap this error with the operation that produced it.
    ///
    /// The wrapper keeps the [`ErrorKind`] of the inner error.
    pub fn context(self, context: impl Into<String>) -> Self {
        BotioError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BotioError::NotFound { .. } => ErrorKind::NotFound,
            BotioError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            BotioError::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            BotioError::Canceled => ErrorKind::Canceled,
            BotioError::Remote { kind, .. } => *kind,
            BotioError::Context { source, .. } => source.kind(),
            _ => ErrorKind::Internal,
        }
    }

    /// Convert to a JSON-RPC error code.
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            BotioError::Protocol { code, .. } => *code,
            other => other.kind().rpc_code(),
        }
    }

    /// Rebuild an error received over the wire.
    pub fn from_rpc(code: i32, message: impl Into<String>) -> Self {
        BotioError::Remote {
            kind: ErrorKind::from_rpc_code(code),
            message: message.into(),
        }
    }

    /// Whether this error means the requested command does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BotioError::NotFound {
            name: "start".into(),
        };
        assert_eq!(err.to_string(), "Command \"start\" not found");
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            BotioError::NotFound {
                name: "start".into()
            }
            .to_rpc_error_code(),
            -32002
        );
        assert_eq!(BotioError::Canceled.to_rpc_error_code(), -32004);
        assert_eq!(
            BotioError::NotConnected { backend: "memory" }.to_rpc_error_code(),
            -32603
        );
        assert_eq!(
            BotioError::Protocol {
                code: -32601,
                message: "Method not found".into()
            }
            .to_rpc_error_code(),
            -32601
        );
    }

    #[test]
    fn test_context_keeps_kind() {
        let err = BotioError::NotFound {
            name: "start".into(),
        }
        .context("while getting command \"start\"");

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().starts_with("while getting command"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_remote_roundtrip_preserves_kind() {
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::InvalidArgument,
            ErrorKind::Unauthenticated,
            ErrorKind::Canceled,
            ErrorKind::Internal,
        ] {
            let err = BotioError::from_rpc(kind.rpc_code(), "boom");
            assert_eq!(err.kind(), kind);
            assert_eq!(err.to_string(), "boom");
        }
    }

    #[test]
    fn test_unknown_code_is_internal() {
        assert_eq!(ErrorKind::from_rpc_code(-32700), ErrorKind::Internal);
    }
}
