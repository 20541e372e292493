use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::identity::{decode_identity, Identity};
use super::storage::{MemoryTokenStorage, StorageError, TokenStorage, TOKEN_KEY};

/// Whether the client currently believes it holds a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Unauthenticated => write!(f, "signed out"),
            AuthState::Authenticated => write!(f, "signed in"),
        }
    }
}

/// Single source of truth for the bearer token.
///
/// Every read goes straight to the storage adapter, so a token written by
/// `set_token` is visible to the next `get_token` with no caching in between.
/// Clone is cheap and all clones share the same adapter.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn TokenStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    /// Store backed by process memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStorage::new()))
    }

    /// Current token, `None` if never set, cleared, blank, or unreadable.
    pub fn get_token(&self) -> Option<String> {
        match self.storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read session token");
                None
            }
        }
    }

    pub fn set_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, token)?;
        debug!("Session token stored");
        Ok(())
    }

    /// Remove the token. Clearing an absent token is a no-op.
    pub fn clear_token(&self) -> Result<(), StorageError> {
        self.storage.clear(TOKEN_KEY)?;
        debug!("Session token cleared");
        Ok(())
    }

    pub fn state(&self) -> AuthState {
        if self.get_token().is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == AuthState::Authenticated
    }

    /// Identity decoded from the current token.
    /// A malformed token yields `None`; identity is cosmetic.
    pub fn identity(&self) -> Option<Identity> {
        let token = self.get_token()?;
        match decode_identity(&token) {
            Ok(identity) => Some(identity),
            Err(e) => {
                debug!(error = %e, "Token payload could not be decoded");
                None
            }
        }
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.state())
            .finish()
    }
}
