//! Seams between the bots and the outside world.

use async_trait::async_trait;
use botio_core::{BotioClient, BotioError, Result};

/// The outbound half of a chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Platform name used in logs.
    fn name(&self) -> &'static str;

    /// Send `text` to the chat identified by `destination`.
    async fn send_message(&self, destination: &str, text: &str) -> Result<()>;
}

/// Looks up the response for a command name.
#[async_trait]
pub trait CommandResolver: Send + Sync {
    async fn resolve(&self, command: &str) -> Result<String>;
}

#[async_trait]
impl CommandResolver for BotioClient {
    async fn resolve(&self, command: &str) -> Result<String> {
        Ok(self.get_command(command).await?.response)
    }
}

/// A running chat adapter.
#[async_trait]
pub trait Bot: Send + Sync {
    fn name(&self) -> &'static str;

    /// Receive messages until [`Bot::stop`] is called or the connection fails.
    async fn run(&self) -> Result<()>;

    /// Stop intake, deliver every queued response, then disconnect.
    async fn stop(&self) -> Result<()>;
}

/// Wrap a platform client failure.
pub(crate) fn platform_error(platform: &str, err: impl std::fmt::Display) -> BotioError {
    BotioError::Platform {
        platform: platform.to_string(),
        message: err.to_string(),
    }
}
