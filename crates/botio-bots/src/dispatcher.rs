//! Bounded, single-consumer queue of outbound replies.
//!
//! Message handlers enqueue a [`PendingResponse`] and return; one worker
//! task sends them to the platform in enqueue order. [`Dispatcher::stop`]
//! closes the queue and waits until everything already enqueued has been
//! handed to the platform.
//!
//! ```text
//! Created --start--> Started --stop--> Draining --> Stopped
//!    |                                    ^
//!    +---------------stop-----------------+
//! ```
//!
//! Send failures are logged and dropped; the enqueuer never hears about them.

use crate::platform::ChatPlatform;
use botio_core::config::DispatcherConfig;
use botio_core::{BotioError, PendingResponse, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Lifecycle of a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Created,
    Started,
    Draining,
    Stopped,
}

struct Inner {
    state: DispatcherState,
    sender: Option<mpsc::Sender<PendingResponse>>,
    receiver: Option<mpsc::Receiver<PendingResponse>>,
    worker: Option<JoinHandle<()>>,
}

pub struct Dispatcher {
    platform: Arc<dyn ChatPlatform>,
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Dispatcher {
    /// Create a stopped-until-started dispatcher with room for `capacity`
    /// queued replies.
    pub fn new(platform: Arc<dyn ChatPlatform>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(BotioError::config("dispatcher queue capacity must be greater than zero"));
        }

        let (sender, receiver) = mpsc::channel(capacity);
        Ok(Self {
            platform,
            capacity,
            inner: Mutex::new(Inner {
                state: DispatcherState::Created,
                sender: Some(sender),
                receiver: Some(receiver),
                worker: None,
            }),
        })
    }

    /// Dispatcher with the default queue capacity.
    pub fn with_default_capacity(platform: Arc<dyn ChatPlatform>) -> Result<Self> {
        Self::new(platform, DispatcherConfig::DEFAULT_QUEUE_CAPACITY)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> DispatcherState {
        self.lock().map(|inner| inner.state).unwrap_or(DispatcherState::Stopped)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| BotioError::Other(format!("Failed to lock dispatcher: {}", e)))
    }

    /// Spawn the worker. Calling `start` twice is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.state != DispatcherState::Created {
            return Ok(());
        }
        self.spawn_worker(&mut inner);
        inner.state = DispatcherState::Started;
        Ok(())
    }

    fn spawn_worker(&self, inner: &mut Inner) {
        let Some(mut receiver) = inner.receiver.take() else {
            return;
        };
        let platform = Arc::clone(&self.platform);

        inner.worker = Some(tokio::spawn(async move {
            while let Some(response) = receiver.recv().await {
                if let Err(e) = platform
                    .send_message(&response.destination_id, &response.text)
                    .await
                {
                    warn!(
                        platform = platform.name(),
                        id = %response.destination_id,
                        "Failed to send response: {}",
                        e
                    );
                }
            }
            debug!(platform = platform.name(), "Dispatcher worker finished");
        }));
    }

    /// Queue a reply, waiting while the queue is full.
    ///
    /// Fails with [`BotioError::DispatcherStopped`] once `stop` has begun.
    pub async fn enqueue(&self, response: PendingResponse) -> Result<()> {
        let sender = self
            .lock()?
            .sender
            .clone()
            .ok_or(BotioError::DispatcherStopped)?;

        sender
            .send(response)
            .await
            .map_err(|_| BotioError::DispatcherStopped)
    }

    /// Close the queue and wait until every queued reply has been sent.
    ///
    /// A dispatcher that was never started is started first so its queue
    /// still drains. Calling `stop` again returns immediately.
    pub async fn stop(&self) -> Result<()> {
        let worker = {
            let mut inner = self.lock()?;
            match inner.state {
                DispatcherState::Draining | DispatcherState::Stopped => return Ok(()),
                DispatcherState::Created => self.spawn_worker(&mut inner),
                DispatcherState::Started => {}
            }
            inner.state = DispatcherState::Draining;
            inner.sender.take();
            inner.worker.take()
        };

        if let Some(worker) = worker {
            worker
                .await
                .map_err(|e| BotioError::Other(format!("Dispatcher worker failed: {}", e)))?;
        }

        self.lock()?.state = DispatcherState::Stopped;
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("platform", &self.platform.name())
            .field("capacity", &self.capacity)
            .field("state", &self.state())
            .finish()
    }
}
