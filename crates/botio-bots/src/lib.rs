//! Botio Bots - chat-platform adapters.
//!
//! Each adapter receives messages from its platform, resolves the command
//! through a [`CommandResolver`] (normally a [`botio_core::BotioClient`]) and
//! queues the reply on its own [`Dispatcher`], whose worker sends replies in
//! order without blocking intake.

pub mod discord;
pub mod dispatcher;
pub mod platform;
pub mod responder;
pub mod telegram;

pub use discord::{DiscordApi, DiscordBot};
pub use dispatcher::{Dispatcher, DispatcherState};
pub use platform::{Bot, ChatPlatform, CommandResolver};
pub use responder::Responder;
pub use telegram::{TelegramApi, TelegramBot};
