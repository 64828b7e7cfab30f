//! End-to-end tests over the RPC transport.

use botio_core::config::RpcConfig;
use botio_core::{
    BotioClient, BotioServer, CallContext, Command, ErrorKind, ServerConfig, StoreConfig,
};
use serde_json::json;
use tempfile::TempDir;

fn config(store: StoreConfig) -> ServerConfig {
    ServerConfig::new("s3cret")
        .with_store(store)
        .with_cache_capacity(1024)
        .with_listen_addr("127.0.0.1:0")
}

#[tokio::test]
async fn test_client_server_scenario() {
    let server = BotioServer::start(config(StoreConfig::Memory)).await.unwrap();
    let client = BotioClient::new(server.addr().to_string(), "s3cret");

    client.health().await.unwrap();

    client
        .add_command(Command::new("start", "hi"))
        .await
        .unwrap();
    assert_eq!(
        client.get_command("start").await.unwrap(),
        Command::new("start", "hi")
    );

    client
        .update_command(Command::new("start", "hello"))
        .await
        .unwrap();
    assert_eq!(client.get_command("start").await.unwrap().response, "hello");

    client.delete_command("start").await.unwrap();
    let err = client.get_command("start").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(client.list_commands().await.unwrap().is_empty());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bad_token_is_unauthenticated() {
    let server = BotioServer::start(config(StoreConfig::Memory)).await.unwrap();

    let intruder = BotioClient::new(server.addr().to_string(), "wrong");
    let err = intruder
        .add_command(Command::new("start", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);

    let empty = BotioClient::new(server.addr().to_string(), "");
    let err = empty.list_commands().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);

    // Health stays open.
    intruder.health().await.unwrap();

    let client = BotioClient::new(server.addr().to_string(), "s3cret");
    assert!(client.list_commands().await.unwrap().is_empty());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_argument_crosses_the_wire() {
    let server = BotioServer::start(config(StoreConfig::Memory)).await.unwrap();
    let client = BotioClient::new(server.addr().to_string(), "s3cret");

    let err = client
        .add_command(Command::new("start", ""))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("response"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_embedded_server_persists_across_restart() {
    let dir = TempDir::new().unwrap();
    let store = StoreConfig::Embedded {
        path: dir.path().join("botio.db"),
        collection: "commands".to_string(),
    };

    let server = BotioServer::start(config(store.clone())).await.unwrap();
    let client = BotioClient::new(server.addr().to_string(), "s3cret");
    client
        .add_command(Command::new("start", "hi"))
        .await
        .unwrap();
    server.shutdown().await.unwrap();

    let server = BotioServer::start(config(store)).await.unwrap();
    let client = BotioClient::new(server.addr().to_string(), "s3cret");
    assert_eq!(client.get_command("start").await.unwrap().response, "hi");
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_client_reports_lost_server() {
    let server = BotioServer::start(config(StoreConfig::Memory)).await.unwrap();
    let client = BotioClient::new(server.addr().to_string(), "s3cret");
    client.health().await.unwrap();
    server.shutdown().await.unwrap();

    // First call hits the dead connection, the second fails to reconnect.
    for _ in 0..2 {
        let err = client.health().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}

#[tokio::test]
async fn test_add_and_update_reply_empty() {
    let server = BotioServer::start(config(StoreConfig::Memory)).await.unwrap();
    let client = BotioClient::new(server.addr().to_string(), "s3cret");

    let added = client
        .call("AddCommand", json!({"cmd": {"name": "start"}, "resp": {"text": "hi"}}))
        .await
        .unwrap();
    assert_eq!(added, json!({}));

    let updated = client
        .call("UpdateCommand", json!({"cmd": {"name": "start"}, "resp": {"text": "hello"}}))
        .await
        .unwrap();
    assert_eq!(updated, json!({}));
    assert_eq!(client.get_command("start").await.unwrap().response, "hello");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_oversized_list_is_an_error_not_a_dropped_connection() {
    let server = BotioServer::start(config(StoreConfig::Memory)).await.unwrap();
    let ctx = CallContext::background();

    // Each command fits the gateway body limit; together they overflow a frame.
    let response = "r".repeat(9_000);
    let count = RpcConfig::MAX_MESSAGE_SIZE / response.len() + 10;
    for i in 0..count {
        server
            .service()
            .add_command(&ctx, Command::new(format!("cmd{i}"), response.clone()))
            .await
            .unwrap();
    }

    let client = BotioClient::new(server.addr().to_string(), "s3cret");
    let err = client.list_commands().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("exceeds max frame size"));

    // The connection survives the oversized reply.
    client.health().await.unwrap();
    assert_eq!(
        client.get_command("cmd0").await.unwrap().response.len(),
        response.len()
    );

    server.shutdown().await.unwrap();
}
