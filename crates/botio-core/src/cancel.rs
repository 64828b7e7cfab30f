//! Cancellation tokens and per-call context.
//!
//! Every service operation receives a [`CallContext`]. The context is checked
//! once, when the call starts; there is no cancellation point after that, so
//! a store call that has begun always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation token shared across tasks.
///
/// Clones observe the same state. A token created with
/// [`CancellationToken::child_token`] is cancelled when its parent is, but
/// cancelling the child leaves the parent untouched.
///
/// # Example
///
/// ```
/// use botio_core::cancel::CancellationToken;
///
/// let shutdown = CancellationToken::new();
/// let call = shutdown.child_token();
///
/// call.cancel();
/// assert!(!shutdown.is_cancelled());
///
/// shutdown.cancel();
/// assert!(shutdown.child_token().is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenState>,
}

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    parent: Option<Arc<TokenState>>,
}

impl TokenState {
    fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }
}

impl CancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested here or on any ancestor.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Create a token that is cancelled whenever this one is.
    pub fn child_token(&self) -> Self {
        Self {
            inner: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                parent: Some(self.inner.clone()),
            }),
        }
    }

    /// Check cancellation and return an error if cancelled.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError)
        } else {
            Ok(())
        }
    }
}

/// Error returned when an operation is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledError;

impl std::fmt::Display for CancelledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation was cancelled")
    }
}

impl std::error::Error for CancelledError {}

/// Context handed to every service call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
}

impl CallContext {
    /// A context that is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context bound to `token`.
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token }
    }

    /// The token backing this context.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fail with [`BotioError::Canceled`](crate::BotioError::Canceled) if the
    /// call was cancelled before it started.
    pub fn ensure_active(&self) -> crate::Result<()> {
        self.token.check()?;
        Ok(())
    }
}
