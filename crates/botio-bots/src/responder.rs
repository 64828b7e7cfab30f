//! Turns an inbound command into a queued reply.

use crate::dispatcher::Dispatcher;
use crate::platform::CommandResolver;
use botio_core::config::BotSettings;
use botio_core::{PendingResponse, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Resolves commands and hands the replies to a [`Dispatcher`].
///
/// A failed lookup is answered with the fallback reply; the chat user never
/// sees the underlying error.
#[derive(Clone)]
pub struct Responder {
    platform: &'static str,
    resolver: Arc<dyn CommandResolver>,
    dispatcher: Arc<Dispatcher>,
    fallback: String,
}

impl Responder {
    pub fn new(
        platform: &'static str,
        resolver: Arc<dyn CommandResolver>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            platform,
            resolver,
            dispatcher,
            fallback: BotSettings::DEFAULT_RESPONSE.to_string(),
        }
    }

    /// Replace the reply used when a command cannot be resolved.
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Resolve `command` and queue the reply for `destination`.
    ///
    /// Only fails if the dispatcher no longer accepts replies.
    pub async fn respond(&self, destination: &str, command: &str) -> Result<()> {
        let start = Instant::now();

        let text = match self.resolver.resolve(command).await {
            Ok(text) => {
                info!(
                    platform = self.platform,
                    id = %destination,
                    msg = %command,
                    response = %text,
                    elapsed = ?start.elapsed(),
                    "command responded successfully"
                );
                text
            }
            Err(e) => {
                error!(
                    platform = self.platform,
                    id = %destination,
                    msg = %command,
                    elapsed = ?start.elapsed(),
                    "error while responding to command: {}",
                    e
                );
                self.fallback.clone()
            }
        };

        self.dispatcher
            .enqueue(PendingResponse::new(destination, text))
            .await
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("platform", &self.platform)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}
