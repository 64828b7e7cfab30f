//! TCP RPC server.
//!
//! Accepts connections, reads framed JSON-RPC requests and hands each one to
//! an [`RpcDispatch`] implementation together with a fresh [`CallContext`].
//!
//! # Thread Safety
//!
//! Each connection is handled in its own task. Requests on one connection
//! are processed in order; requests on different connections run
//! concurrently, so dispatchers must be safe under concurrent calls.
//!
//! # Shutdown
//!
//! [`RpcServerHandle::shutdown`] stops accepting, cancels the server token
//! (calls that have not started yet fail with `Canceled`), lets every
//! connection finish the request it is processing, then waits for all
//! connection tasks to exit.

use super::protocol::{codes, read_frame, write_frame, RpcRequest, RpcResponse};
use crate::cancel::{CallContext, CancellationToken};
use crate::config::RpcConfig;
use crate::{BotioError, ErrorKind, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Handle to a running RPC server.
pub struct RpcServerHandle {
    addr: SocketAddr,
    token: CancellationToken,
    shutdown_tx: Option<oneshot::Sender<()>>,
    conn_shutdown_tx: watch::Sender<bool>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl RpcServerHandle {
    /// Get the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Token every call context derives from.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stop accepting, drain in-flight requests and wait for every
    /// connection task to finish.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.token.cancel();
        let _ = self.conn_shutdown_tx.send(true);

        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                error!("RPC accept loop failed: {}", e);
            }
        }
    }
}

impl Drop for RpcServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.token.cancel();
        let _ = self.conn_shutdown_tx.send(true);
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// Dispatches a decoded request.
#[async_trait::async_trait]
pub trait RpcDispatch: Send + Sync + 'static {
    async fn dispatch(
        &self,
        request: &RpcRequest,
        ctx: CallContext,
    ) -> std::result::Result<serde_json::Value, BotioError>;
}

/// RPC server that listens for client connections.
pub struct RpcServer;

impl RpcServer {
    /// Bind `addr` and start serving in background tasks.
    ///
    /// Bind to port 0 to let the OS pick a free port; the handle reports the
    /// actual address.
    pub async fn start<D: RpcDispatch>(addr: &str, dispatch: Arc<D>) -> Result<RpcServerHandle> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BotioError::Network {
                message: format!("Failed to bind RPC listener on {}: {}", addr, e),
            })?;
        Self::serve(listener, dispatch)
    }

    /// Serve on an already bound listener.
    pub fn serve<D: RpcDispatch>(listener: TcpListener, dispatch: Arc<D>) -> Result<RpcServerHandle> {
        let addr = listener.local_addr()?;
        info!("RPC server listening on {}", addr);

        let token = CancellationToken::new();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (conn_shutdown_tx, conn_shutdown_rx) = watch::channel(false);

        let task_handle = tokio::spawn(Self::accept_loop(
            listener,
            dispatch,
            token.clone(),
            shutdown_rx,
            conn_shutdown_rx,
        ));

        Ok(RpcServerHandle {
            addr,
            token,
            shutdown_tx: Some(shutdown_tx),
            conn_shutdown_tx,
            task_handle: Some(task_handle),
        })
    }

    async fn accept_loop<D: RpcDispatch>(
        listener: TcpListener,
        dispatch: Arc<D>,
        token: CancellationToken,
        mut shutdown_rx: oneshot::Receiver<()>,
        conn_shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("RPC server shutting down");
                    break;
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            if connections.len() >= RpcConfig::MAX_CONNECTIONS {
                                warn!(
                                    "Rejecting RPC connection from {}: at max capacity ({})",
                                    peer_addr,
                                    RpcConfig::MAX_CONNECTIONS
                                );
                                continue;
                            }

                            let dispatch = dispatch.clone();
                            let token = token.clone();
                            let mut conn_shutdown = conn_shutdown_rx.clone();

                            connections.spawn(async move {
                                debug!("RPC connection from {}", peer_addr);
                                if let Err(e) = Self::handle_connection(stream, &*dispatch, &token, &mut conn_shutdown).await {
                                    debug!("RPC connection {} ended: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("RPC accept error: {}", e);
                        }
                    }
                }
            }
        }

        drop(listener);
        let in_flight = connections.len();
        if in_flight > 0 {
            debug!("Waiting for {} RPC connections to finish", in_flight);
        }
        while connections.join_next().await.is_some() {}
        info!("RPC server stopped");
    }

    async fn handle_connection<D: RpcDispatch>(
        mut stream: TcpStream,
        dispatch: &D,
        token: &CancellationToken,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let (mut reader, mut writer) = stream.split();

        loop {
            if *shutdown_rx.borrow() {
                return Ok(());
            }

            let frame = tokio::select! {
                result = read_frame(&mut reader) => {
                    match result? {
                        Some(f) => f,
                        None => return Ok(()),
                    }
                }
                _ = shutdown_rx.changed() => {
                    return Ok(());
                }
            };

            // Once a frame is read the request runs to completion, even if
            // shutdown starts meanwhile.
            let response = Self::process_request(&frame, dispatch, token).await;
            let response_bytes = Self::encode_response(&response)?;
            write_frame(&mut writer, &response_bytes).await?;
        }
    }

    /// Serialize a response, replacing it with an error if it cannot be
    /// framed. The connection stays usable either way.
    fn encode_response(response: &RpcResponse) -> Result<Vec<u8>> {
        let message = match serde_json::to_vec(response) {
            Ok(bytes) if bytes.len() <= RpcConfig::MAX_MESSAGE_SIZE => return Ok(bytes),
            Ok(bytes) => {
                warn!(
                    "RPC response of {} bytes exceeds the {} byte frame limit",
                    bytes.len(),
                    RpcConfig::MAX_MESSAGE_SIZE
                );
                "response exceeds max frame size".to_string()
            }
            Err(e) => {
                error!("Failed to serialize RPC response: {}", e);
                format!("failed to serialize response: {}", e)
            }
        };

        let fallback = RpcResponse::error(
            response.id.clone(),
            ErrorKind::Internal.rpc_code(),
            message,
        );
        Ok(serde_json::to_vec(&fallback)?)
    }

    async fn process_request<D: RpcDispatch>(
        frame: &[u8],
        dispatch: &D,
        token: &CancellationToken,
    ) -> RpcResponse {
        let request: RpcRequest = match serde_json::from_slice(frame) {
            Ok(req) => req,
            Err(e) => {
                return RpcResponse::error(None, codes::PARSE_ERROR, format!("Parse error: {}", e));
            }
        };

        if request.jsonrpc != RpcConfig::JSONRPC_VERSION {
            return RpcResponse::error(
                request.id,
                codes::INVALID_REQUEST,
                "Invalid Request: expected jsonrpc 2.0".to_string(),
            );
        }

        let ctx = CallContext::with_token(token.child_token());
        match dispatch.dispatch(&request, ctx).await {
            Ok(result) => RpcResponse::success(request.id, result),
            Err(e) => RpcResponse::from_error(request.id, &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::protocol::RpcRequest;

    struct EchoDispatch;

    #[async_trait::async_trait]
    impl RpcDispatch for EchoDispatch {
        async fn dispatch(
            &self,
            request: &RpcRequest,
            ctx: CallContext,
        ) -> std::result::Result<serde_json::Value, BotioError> {
            ctx.ensure_active()?;
            match request.method.as_str() {
                "echo" => Ok(request.params.clone().unwrap_or_default()),
                "slow" => {
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                    Ok(serde_json::json!("done"))
                }
                "fail" => Err(BotioError::Other("test failure".to_string())),
                other => Err(BotioError::Protocol {
                    code: codes::METHOD_NOT_FOUND,
                    message: format!("Method not found: {}", other),
                }),
            }
        }
    }

    async fn roundtrip(addr: SocketAddr, payload: &[u8]) -> RpcResponse {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let (mut reader, mut writer) = stream.split();
        write_frame(&mut writer, payload).await.unwrap();
        let bytes = read_frame(&mut reader).await.unwrap().unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_server_echo_roundtrip() {
        let mut handle = RpcServer::start("127.0.0.1:0", Arc::new(EchoDispatch))
            .await
            .unwrap();
        assert!(handle.addr().port() > 0);

        let request = RpcRequest::new("echo", serde_json::json!({"hello": "world"}), 1);
        let response = roundtrip(handle.addr(), &serde_json::to_vec(&request).unwrap()).await;

        assert!(response.error.is_none());
        assert_eq!(response.result, Some(serde_json::json!({"hello": "world"})));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_server_error_codes() {
        let mut handle = RpcServer::start("127.0.0.1:0", Arc::new(EchoDispatch))
            .await
            .unwrap();

        let request = RpcRequest::new("fail", serde_json::json!({}), 2);
        let response = roundtrip(handle.addr(), &serde_json::to_vec(&request).unwrap()).await;
        let err = response.error.unwrap();
        assert_eq!(err.code, -32603);
        assert!(err.message.contains("test failure"));

        let request = RpcRequest::new("nope", serde_json::json!({}), 3);
        let response = roundtrip(handle.addr(), &serde_json::to_vec(&request).unwrap()).await;
        assert_eq!(response.error.unwrap().code, codes::METHOD_NOT_FOUND);

        let response = roundtrip(handle.addr(), b"not valid json").await;
        assert_eq!(response.error.unwrap().code, codes::PARSE_ERROR);

        let response = roundtrip(
            handle.addr(),
            br#"{"jsonrpc":"1.0","method":"echo","id":4}"#,
        )
        .await;
        assert_eq!(response.error.unwrap().code, codes::INVALID_REQUEST);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_request() {
        let mut handle = RpcServer::start("127.0.0.1:0", Arc::new(EchoDispatch))
            .await
            .unwrap();

        let mut stream = TcpStream::connect(handle.addr()).await.unwrap();
        let request = RpcRequest::new("slow", serde_json::json!({}), 5);
        write_frame(&mut stream, &serde_json::to_vec(&request).unwrap())
            .await
            .unwrap();

        // Give the server time to pick the frame up before shutting down.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.shutdown().await;

        let bytes = read_frame(&mut stream).await.unwrap().unwrap();
        let response: RpcResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(response.result, Some(serde_json::json!("done")));

        assert!(TcpStream::connect(handle.addr()).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_server_token() {
        let mut handle = RpcServer::start("127.0.0.1:0", Arc::new(EchoDispatch))
            .await
            .unwrap();
        let token = handle.token().clone();
        assert!(!token.is_cancelled());

        handle.shutdown().await;
        assert!(token.is_cancelled());
        assert!(token.child_token().is_cancelled());
    }

    #[test]
    fn test_oversized_response_becomes_error() {
        let small = RpcResponse::success(Some(serde_json::json!(3)), serde_json::json!("ok"));
        let bytes = RpcServer::encode_response(&small).unwrap();
        assert_eq!(bytes, serde_json::to_vec(&small).unwrap());

        let huge = "x".repeat(RpcConfig::MAX_MESSAGE_SIZE);
        let big = RpcResponse::success(Some(serde_json::json!(4)), serde_json::json!(huge));
        let bytes = RpcServer::encode_response(&big).unwrap();
        assert!(bytes.len() < 1024);

        let parsed: RpcResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.id, Some(serde_json::json!(4)));
        let err = parsed.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("exceeds max frame size"));
    }
}
