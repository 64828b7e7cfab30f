//! Discord adapter on the serenity gateway client.
//!
//! The bot only answers messages of exactly two words where the first is a
//! mention of the bot itself: `@botio start`.

use crate::dispatcher::Dispatcher;
use crate::platform::{platform_error, Bot, ChatPlatform, CommandResolver};
use crate::responder::Responder;
use async_trait::async_trait;
use botio_core::{BotioError, Result};
use serenity::all::{ChannelId, GatewayIntents, Message, Ready, ShardManager};
use serenity::client::{Client, Context, EventHandler};
use serenity::http::Http;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PLATFORM: &str = "discord";

/// Extract the command from `content` if it is addressed to `bot_id`.
///
/// Accepts both mention forms, `<@id>` and `<@!id>`.
pub fn parse_mention(content: &str, bot_id: u64) -> Option<String> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    let [mention, command] = fields.as_slice() else {
        return None;
    };

    let plain = format!("<@{}>", bot_id);
    let nick = format!("<@!{}>", bot_id);
    if *mention == plain || *mention == nick {
        Some(command.to_string())
    } else {
        None
    }
}

/// Outbound messages through the Discord REST API.
#[derive(Clone)]
pub struct DiscordApi {
    http: Arc<Http>,
}

impl DiscordApi {
    pub fn new(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(BotioError::config("discord token cannot be empty"));
        }
        Ok(Self {
            http: Arc::new(Http::new(token)),
        })
    }
}

#[async_trait]
impl ChatPlatform for DiscordApi {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    async fn send_message(&self, destination: &str, text: &str) -> Result<()> {
        let channel: u64 = destination.parse().map_err(|_| {
            BotioError::invalid_argument("destination", format!("{:?} is not a channel id", destination))
        })?;
        if channel == 0 {
            return Err(BotioError::invalid_argument("destination", "channel id cannot be 0"));
        }

        ChannelId::new(channel)
            .say(&self.http, text)
            .await
            .map_err(|e| platform_error(PLATFORM, e))?;
        Ok(())
    }
}

struct Handler {
    responder: Responder,
    bot_id: Arc<AtomicU64>,
    accepting: Arc<AtomicBool>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.bot_id.store(ready.user.id.get(), Ordering::SeqCst);
        info!("Discord bot connected as {}", ready.user.name);
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if msg.author.bot || !self.accepting.load(Ordering::SeqCst) {
            return;
        }

        let bot_id = self.bot_id.load(Ordering::SeqCst);
        let Some(command) = parse_mention(&msg.content, bot_id) else {
            debug!("Ignoring message {} not addressed to the bot", msg.id);
            return;
        };

        let destination = msg.channel_id.get().to_string();
        if let Err(e) = self.responder.respond(&destination, &command).await {
            warn!("Discord bot dropped reply to {}: {}", destination, e);
        }
    }
}

/// Discord bot: answers mentions through its dispatcher.
pub struct DiscordBot {
    client: Mutex<Option<Client>>,
    shard_manager: Arc<ShardManager>,
    dispatcher: Arc<Dispatcher>,
    accepting: Arc<AtomicBool>,
}

impl DiscordBot {
    /// Gateway intents needed to read message content in guilds and DMs.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }

    /// Build the gateway client. Nothing connects until [`Bot::run`].
    pub async fn new(
        token: &str,
        resolver: Arc<dyn CommandResolver>,
        queue_capacity: usize,
        fallback: Option<String>,
    ) -> Result<Self> {
        let api = Arc::new(DiscordApi::new(token)?);
        let dispatcher = Arc::new(Dispatcher::new(api, queue_capacity)?);

        let mut responder = Responder::new(PLATFORM, resolver, Arc::clone(&dispatcher));
        if let Some(fallback) = fallback {
            responder = responder.with_fallback(fallback);
        }

        let accepting = Arc::new(AtomicBool::new(true));
        let handler = Handler {
            responder,
            bot_id: Arc::new(AtomicU64::new(0)),
            accepting: Arc::clone(&accepting),
        };

        let client = Client::builder(token, Self::intents())
            .event_handler(handler)
            .await
            .map_err(|e| platform_error(PLATFORM, format!("Failed to build client: {}", e)))?;
        let shard_manager = Arc::clone(&client.shard_manager);

        Ok(Self {
            client: Mutex::new(Some(client)),
            shard_manager,
            dispatcher,
            accepting,
        })
    }
}

#[async_trait]
impl Bot for DiscordBot {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    async fn run(&self) -> Result<()> {
        let mut client = self
            .client
            .lock()
            .await
            .take()
            .ok_or_else(|| platform_error(PLATFORM, "bot is already running"))?;

        self.dispatcher.start()?;
        info!("Starting Discord bot");
        client
            .start()
            .await
            .map_err(|e| platform_error(PLATFORM, format!("Client error: {}", e)))
    }

    async fn stop(&self) -> Result<()> {
        self.accepting.store(false, Ordering::SeqCst);
        self.dispatcher.stop().await?;
        self.shard_manager.shutdown_all().await;
        info!("Discord bot stopped");
        Ok(())
    }
}
