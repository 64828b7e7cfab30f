//! Telegram adapter over the Bot HTTP API.
//!
//! Messages arrive through `getUpdates` long polling; replies leave through
//! `sendMessage`. The bot token is part of every request path, so errors are
//! stripped of their URL before they are logged.

use crate::dispatcher::Dispatcher;
use crate::platform::{platform_error, Bot, ChatPlatform, CommandResolver};
use crate::responder::Responder;
use async_trait::async_trait;
use botio_core::config::BotSettings;
use botio_core::{BotioError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const PLATFORM: &str = "telegram";

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(platform_error(
                PLATFORM,
                format!(
                    "{} failed: {}",
                    method,
                    self.description.unwrap_or_else(|| "no description".to_string())
                ),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Chat id and command name, if this update is a text message.
    pub fn command(&self) -> Option<(String, String)> {
        let message = self.message.as_ref()?;
        let command = parse_command(message.text.as_deref()?)?;
        Some((message.chat.id.to_string(), command))
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Strip the leading `/` and any `@botname` suffix from a message.
///
/// `"/start@botio_bot"` becomes `"start"`. Blank messages yield `None`.
pub fn parse_command(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let command = trimmed.strip_prefix('/').unwrap_or(trimmed);
    let command = match command.split_once('@') {
        Some((head, _)) if !head.contains(char::is_whitespace) => head,
        _ => command,
    };

    if command.is_empty() {
        None
    } else {
        Some(command.to_string())
    }
}

fn http_error(err: reqwest::Error) -> BotioError {
    platform_error(PLATFORM, err.without_url())
}

/// Minimal Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramApi {
    http: reqwest::Client,
    endpoint: String,
}

impl TelegramApi {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(BotSettings::TELEGRAM_API_BASE, token)
    }

    /// Point the client at another Bot API server.
    pub fn with_base_url(base_url: &str, token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(BotioError::config("telegram token cannot be empty"));
        }

        let http = reqwest::Client::builder()
            .timeout(BotSettings::TELEGRAM_POLL_TIMEOUT + Duration::from_secs(10))
            .build()
            .map_err(http_error)?;

        Ok(Self {
            http,
            endpoint: format!("{}/bot{}", base_url.trim_end_matches('/'), token),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.endpoint, method)
    }

    /// Long-poll for updates newer than `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let timeout = BotSettings::TELEGRAM_POLL_TIMEOUT.as_secs().to_string();
        let offset = offset.to_string();

        let response: ApiResponse<Vec<Update>> = self
            .http
            .get(self.url("getUpdates"))
            .query(&[("offset", offset.as_str()), ("timeout", timeout.as_str())])
            .send()
            .await
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;

        response.into_result("getUpdates")
    }
}

#[async_trait]
impl ChatPlatform for TelegramApi {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    async fn send_message(&self, destination: &str, text: &str) -> Result<()> {
        let response: ApiResponse<serde_json::Value> = self
            .http
            .post(self.url("sendMessage"))
            .json(&SendMessage {
                chat_id: destination,
                text,
            })
            .send()
            .await
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;

        response.into_result("sendMessage").map(|_| ())
    }
}

/// Telegram bot: polls for commands and answers through its dispatcher.
pub struct TelegramBot {
    api: Arc<TelegramApi>,
    responder: Responder,
    stop_tx: watch::Sender<bool>,
}

impl TelegramBot {
    pub fn new(
        api: TelegramApi,
        resolver: Arc<dyn CommandResolver>,
        queue_capacity: usize,
    ) -> Result<Self> {
        let api = Arc::new(api);
        let dispatcher = Arc::new(Dispatcher::new(api.clone(), queue_capacity)?);
        let (stop_tx, _) = watch::channel(false);

        Ok(Self {
            responder: Responder::new(PLATFORM, resolver, dispatcher),
            api,
            stop_tx,
        })
    }

    /// Replace the reply used when a command cannot be resolved.
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.responder = self.responder.with_fallback(fallback);
        self
    }

    /// Pause before retrying a failed poll. Returns `false` if stopped meanwhile.
    async fn back_off(stop_rx: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = stop_rx.changed() => false,
            _ = tokio::time::sleep(BotSettings::TELEGRAM_RETRY_DELAY) => true,
        }
    }
}

#[async_trait]
impl Bot for TelegramBot {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    async fn run(&self) -> Result<()> {
        let mut stop_rx = self.stop_tx.subscribe();
        self.responder.dispatcher().start()?;
        info!("Telegram bot polling for updates");

        let mut offset = 0;
        loop {
            if *stop_rx.borrow() {
                break;
            }

            let polled = tokio::select! {
                _ = stop_rx.changed() => break,
                polled = self.api.get_updates(offset) => polled,
            };

            let updates = match polled {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Telegram poll failed: {}", e);
                    if Self::back_off(&mut stop_rx).await {
                        continue;
                    }
                    break;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some((chat_id, command)) = update.command() else {
                    debug!("Ignoring non-text update {}", update.update_id);
                    continue;
                };
                if let Err(e) = self.responder.respond(&chat_id, &command).await {
                    warn!("Telegram bot stopped accepting replies: {}", e);
                    return Ok(());
                }
            }
        }

        info!("Telegram bot stopped polling");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stop_tx.send_replace(true);
        self.responder.dispatcher().stop().await?;
        info!("Telegram bot stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some("start".to_string()));
        assert_eq!(parse_command("/start@botio_bot"), Some("start".to_string()));
        assert_eq!(parse_command("  help  "), Some("help".to_string()));
        assert_eq!(parse_command("mail me@example.com"), Some("mail me@example.com".to_string()));
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn test_update_command() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 10,
            "message": {"chat": {"id": -100123}, "text": "/start"}
        }))
        .unwrap();
        assert_eq!(
            update.command(),
            Some(("-100123".to_string(), "start".to_string()))
        );

        let sticker: Update = serde_json::from_value(serde_json::json!({
            "update_id": 11,
            "message": {"chat": {"id": 1}}
        }))
        .unwrap();
        assert!(sticker.command().is_none());
    }

    #[test]
    fn test_api_response_errors() {
        let failed: ApiResponse<Vec<Update>> = serde_json::from_value(serde_json::json!({
            "ok": false,
            "description": "Unauthorized"
        }))
        .unwrap();
        let err = failed.into_result("getUpdates").unwrap_err();
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(TelegramApi::new("").is_err());
        let api = TelegramApi::with_base_url("http://localhost:8081/", "123:abc").unwrap();
        assert_eq!(api.url("getUpdates"), "http://localhost:8081/bot123:abc/getUpdates");
    }
}
