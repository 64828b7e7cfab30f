//! Shared-secret token authentication.

use crate::error::{BotioError, Result};

/// Validates the opaque token every request must carry.
#[derive(Clone)]
pub struct TokenAuth {
    secret: String,
}

impl TokenAuth {
    /// Fails if `secret` is empty.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(BotioError::config("authentication token cannot be empty"));
        }
        Ok(Self { secret })
    }

    /// Check the token presented with a request.
    pub fn verify(&self, presented: Option<&str>) -> Result<()> {
        match presented {
            None | Some("") => Err(BotioError::Unauthenticated {
                message: "missing token".to_string(),
            }),
            Some(token) if constant_time_eq(token.as_bytes(), self.secret.as_bytes()) => Ok(()),
            Some(_) => Err(BotioError::Unauthenticated {
                message: "invalid token".to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuth").finish_non_exhaustive()
    }
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
