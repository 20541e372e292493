//! Authentication module for managing the admin session.
//!
//! This module provides:
//! - `SessionStore`: read/write/clear of the bearer token under a fixed key
//! - `TokenStorage`: the persistence adapter behind it (file, keychain, memory)
//! - `Identity`: claims decoded from the token payload, for display only
//! - `LoginFlow`: credential validation, login and logout
//!
//! Tokens are never validated locally. Expiry is discovered when the
//! backend answers 401, unless proactive checks are switched on.

pub mod identity;
pub mod login;
pub mod session;
pub mod storage;

pub use identity::{decode_identity, DecodeError, Identity};
pub use login::{LoginError, LoginFlow, LoginForm, LoginOutcome, ValidationError};
pub use session::{AuthState, SessionStore};
pub use storage::{
    FileTokenStorage, KeyringTokenStorage, MemoryTokenStorage, StorageError, TokenStorage,
    TOKEN_KEY,
};
