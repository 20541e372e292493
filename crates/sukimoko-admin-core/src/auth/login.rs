//! Login and logout.
//!
//! Login is the one call that goes around the gateway: the endpoint is
//! unauthenticated, and a failed login must leave the session untouched.

use std::fmt;
use std::sync::Arc;

use reqwest::header::{self, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, ApiRequest, HttpTransport};
use crate::navigator::{Navigator, HOME_PATH, LOGIN_PATH};

use super::identity::{decode_identity, Identity};
use super::session::SessionStore;
use super::storage::StorageError;

/// Unauthenticated login endpoint
pub const LOGIN_ENDPOINT: &str = "/api/auth/login";

/// Shortest password the login form accepts
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Shape checks on the login form. Not a security boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Email is required")]
    EmailRequired,

    #[error("Email is not valid")]
    EmailInvalid,

    #[error("Password is required")]
    PasswordRequired,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,
}

#[derive(Error, Debug)]
pub enum LoginError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Login failed: {0}")]
    Rejected(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Could not save session: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Clone, Serialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.is_empty() {
            return Err(ValidationError::EmailRequired);
        }
        if !looks_like_email(&self.email) {
            return Err(ValidationError::EmailInvalid);
        }
        if self.password.is_empty() {
            return Err(ValidationError::PasswordRequired);
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::PasswordTooShort);
        }
        Ok(())
    }
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `local@domain.tld` with no whitespace
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
    message: Option<Value>,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// `None` when the issued token is not a decodable JWT
    pub identity: Option<Identity>,
}

/// Validates credentials, trades them for a token, and clears it again.
#[derive(Clone)]
pub struct LoginFlow {
    session: SessionStore,
    transport: Arc<dyn HttpTransport>,
    navigator: Option<Arc<dyn Navigator>>,
    base_url: String,
}

impl LoginFlow {
    pub fn new(
        session: SessionStore,
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            session,
            transport,
            navigator: None,
            base_url: base_url.into(),
        }
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub async fn login(&self, form: &LoginForm) -> Result<LoginOutcome, LoginError> {
        form.validate()?;

        let url = format!("{}{}", self.base_url.trim_end_matches('/'), LOGIN_ENDPOINT);
        let request = ApiRequest::post(url)
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(form)?;
        let response = self.transport.execute(request).await?;

        let body: LoginResponse = match response.json() {
            Ok(body) => body,
            Err(_) => {
                warn!(status = %response.status(), "Login response was not JSON");
                return Err(LoginError::Rejected(format!("HTTP {}", response.status())));
            }
        };

        let Some(token) = body.access_token.filter(|t| !t.trim().is_empty()) else {
            let message = body
                .message
                .as_ref()
                .and_then(message_text)
                .unwrap_or_else(|| "Unknown error".to_string());
            warn!(status = %response.status(), message = %message, "Login rejected");
            return Err(LoginError::Rejected(message));
        };

        self.session.set_token(&token)?;
        info!(email = %form.email, "Login successful");

        if let Some(ref navigator) = self.navigator {
            navigator.redirect(HOME_PATH);
        }

        Ok(LoginOutcome {
            identity: decode_identity(&token).ok(),
        })
    }

    pub fn logout(&self) -> Result<(), StorageError> {
        self.session.clear_token()?;
        info!("Logged out");
        if let Some(ref navigator) = self.navigator {
            navigator.redirect(LOGIN_PATH);
        }
        Ok(())
    }
}

// Validation failures come back as an array of messages
fn message_text(message: &Value) -> Option<String> {
    match message {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    }
}
