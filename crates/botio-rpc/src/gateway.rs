//! HTTP/JSON gateway mirroring the RPC surface.

use crate::handler::{self, ApiError};
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use botio_core::config::{AppConfig, RpcConfig};
use botio_core::{BotioError, CancellationToken, CommandService, TokenAuth};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared state for the gateway routes.
pub struct AppState {
    pub service: CommandService,
    pub auth: TokenAuth,
    /// Parent of every request's cancellation token.
    pub shutdown: CancellationToken,
}

/// Reject requests without a valid `token` header.
async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(AppConfig::TOKEN_METADATA_KEY)
        .and_then(|value| value.to_str().ok());

    if let Err(e) = state.auth.verify(presented) {
        warn!("Rejected gateway request to {}: {}", request.uri().path(), e);
        return ApiError(e).into_response();
    }
    next.run(request).await
}

/// Build the gateway router.
pub fn router(state: Arc<AppState>) -> Router {
    let collection = || {
        get(handler::list_commands)
            .post(handler::add_command)
            .put(handler::update_command)
    };
    let commands = Router::new()
        .route("/api/commands", collection())
        .route("/api/commands/", collection())
        .route(
            "/api/commands/:command",
            get(handler::get_command)
                .put(handler::update_named_command)
                .delete(handler::delete_command),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(handler::handle_health))
        .merge(commands)
        .layer(RequestBodyLimitLayer::new(RpcConfig::MAX_GATEWAY_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A running gateway.
pub struct GatewayHandle {
    addr: SocketAddr,
    shutdown: CancellationToken,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl GatewayHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting, cancel pending calls and wait for open requests.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Gateway task failed: {}", e);
            }
        }
        info!("Gateway stopped");
    }
}

impl Drop for GatewayHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Bind `addr` and serve the gateway in the background.
pub async fn start(
    addr: &str,
    service: CommandService,
    auth: TokenAuth,
) -> botio_core::Result<GatewayHandle> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| BotioError::Network {
            message: format!("Failed to bind gateway to {}: {}", addr, e),
        })?;
    let addr = listener.local_addr()?;

    let shutdown = CancellationToken::new();
    let app = router(Arc::new(AppState {
        service,
        auth,
        shutdown: shutdown.clone(),
    }));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await;
        if let Err(e) = served {
            error!("Gateway error: {}", e);
        }
    });

    info!("Gateway listening on {}", addr);
    Ok(GatewayHandle {
        addr,
        shutdown,
        stop_tx: Some(stop_tx),
        task: Some(task),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, StatusCode};
    use botio_core::{BoundedCache, BotCommand, BotCommands, Command, Store, StoreConfig};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn test_state() -> Arc<AppState> {
        let store = StoreConfig::Memory.build().unwrap();
        store.connect().await.unwrap();
        let cache = Arc::new(BoundedCache::new(64).unwrap());
        Arc::new(AppState {
            service: CommandService::new(store, cache),
            auth: TokenAuth::new("s3cret").unwrap(),
            shutdown: CancellationToken::new(),
        })
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> axum::http::Request<Body> {
        let builder = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("token", "s3cret");
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn bot_command(name: &str, text: &str) -> Value {
        serde_json::to_value(BotCommand::new(name, text)).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let app = router(test_state().await);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_and_wrong_token() {
        let app = router(test_state().await);

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/commands/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["code"], "unauthenticated");
        assert!(body["message"].as_str().unwrap().contains("missing token"));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/commands/start")
                    .header("token", "nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_command_lifecycle() {
        let state = test_state().await;
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/commands/", Some(bot_command("start", "hi"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({}));

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/commands/start", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let got: BotCommand = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(got, BotCommand::new("start", "hi"));

        let response = app
            .clone()
            .oneshot(request(
                Method::PUT,
                "/api/commands/start",
                Some(bot_command("ignored", "hello")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({}));
        assert_eq!(
            state.service.store().get("start").await.unwrap(),
            Command::new("start", "hello")
        );

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/commands/", None))
            .await
            .unwrap();
        let list: BotCommands = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(list, BotCommands::from(vec![Command::new("start", "hello")]));

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, "/api/commands/start", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(Method::GET, "/api/commands/start", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "not_found");
    }

    #[tokio::test]
    async fn test_invalid_bodies() {
        let app = router(test_state().await);

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/commands/", Some(bot_command("start", ""))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "invalid_argument");

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::POST)
                    .uri("/api/commands/")
                    .header("token", "s3cret")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let oversized = "x".repeat(RpcConfig::MAX_GATEWAY_BODY_BYTES + 1);
        let response = app
            .oneshot(request(
                Method::POST,
                "/api/commands/",
                Some(bot_command("big", &oversized)),
            ))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::OK);
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_cancelled_gateway_rejects_calls() {
        let state = test_state().await;
        state.shutdown.cancel();
        let response = router(state)
            .oneshot(request(Method::GET, "/api/commands/", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let state = test_state().await;
        let gateway = start("127.0.0.1:0", state.service.clone(), state.auth.clone())
            .await
            .unwrap();
        assert!(gateway.addr().port() > 0);
        gateway.shutdown().await;
    }
}
