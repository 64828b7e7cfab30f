//! Cache-aside command resolution.
//!
//! [`CommandService`] owns no state of its own: it orchestrates a shared
//! [`Store`] (source of truth) and a shared [`Cache`] (best-effort
//! accelerator). Reads go to the cache first and fill it from the store on
//! a miss. Updates invalidate before writing. Lists always hit the store.
//!
//! Concurrent calls on the same key may interleave; a `get` can refill the
//! cache with a value an `update` is about to replace. The cache is not a
//! consistency boundary.

use crate::cache::Cache;
use crate::cancel::CallContext;
use crate::error::Result;
use crate::models::Command;
use crate::store::Store;
use std::sync::Arc;
use tracing::{debug, warn};

/// The five command operations exposed over RPC.
#[derive(Clone)]
pub struct CommandService {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
}

impl CommandService {
    /// Both collaborators must already be connected; the service never opens
    /// or closes them.
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// Persist a new command. The cache picks it up on the next read.
    pub async fn add_command(&self, ctx: &CallContext, command: Command) -> Result<Command> {
        ctx.ensure_active()?;
        command.validate()?;

        self.store
            .add(&command)
            .await
            .map_err(|e| e.context(format!("while adding command {:?}", command.name)))?;

        debug!("Added command {:?}", command.name);
        Ok(command)
    }

    /// Resolve a command, reading through the cache.
    pub async fn get_command(&self, ctx: &CallContext, name: &str) -> Result<Command> {
        ctx.ensure_active()?;

        if let Ok(hit) = self.cache.get(name) {
            debug!("Cache hit for command {:?}", name);
            return Ok(hit);
        }

        let command = self
            .store
            .get(name)
            .await
            .map_err(|e| e.context(format!("while getting command {:?}", name)))?;

        if let Err(e) = self.cache.add(&command) {
            warn!("Failed to cache command {:?}: {}", name, e);
        }

        Ok(command)
    }

    /// Every stored command, straight from the store.
    pub async fn list_commands(&self, ctx: &CallContext) -> Result<Vec<Command>> {
        ctx.ensure_active()?;

        self.store
            .get_all()
            .await
            .map_err(|e| e.context("while listing commands"))
    }

    /// Replace a command's response, invalidating any cached copy first.
    pub async fn update_command(&self, ctx: &CallContext, command: Command) -> Result<Command> {
        ctx.ensure_active()?;
        command.validate()?;

        if self.cache.contains(&command.name) {
            self.cache.remove(&command.name)?;
        }

        self.store
            .update(&command)
            .await
            .map_err(|e| e.context(format!("while updating command {:?}", command.name)))?;

        debug!("Updated command {:?}", command.name);
        Ok(command)
    }

    /// Delete a command from cache and store. Deleting twice succeeds.
    pub async fn delete_command(&self, ctx: &CallContext, name: &str) -> Result<()> {
        ctx.ensure_active()?;

        self.cache.remove(name)?;
        self.store
            .remove(name)
            .await
            .map_err(|e| e.context(format!("while deleting command {:?}", name)))?;

        debug!("Deleted command {:?}", name);
        Ok(())
    }
}

impl std::fmt::Debug for CommandService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandService")
            .field("store", &self.store.backend())
            .finish_non_exhaustive()
    }
}
