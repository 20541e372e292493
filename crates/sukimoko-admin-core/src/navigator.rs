//! Redirect capability handed to the gateway and the login flow.
//!
//! The core never decides how a redirect is shown. A terminal front end
//! prints a hint, a test records the target.

use std::sync::Mutex;

/// Login entry point, used for both "no credential" and "credential rejected"
pub const LOGIN_PATH: &str = "/login";

/// Default protected view after a successful login
pub const HOME_PATH: &str = "/";

pub trait Navigator: Send + Sync {
    /// Move the user to `target`. Not cancellable.
    fn redirect(&self, target: &str);

    /// Called just before the login redirect when the backend rejected a
    /// stored credential, so the user is told why they were signed out.
    fn notify_session_expired(&self) {}
}

/// Navigator that only remembers where it was sent.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
    expired_notices: Mutex<usize>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn last_redirect(&self) -> Option<String> {
        self.redirects().pop()
    }

    pub fn expired_notices(&self) -> usize {
        self.expired_notices.lock().map(|n| *n).unwrap_or(0)
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, target: &str) {
        if let Ok(mut redirects) = self.redirects.lock() {
            redirects.push(target.to_string());
        }
    }

    fn notify_session_expired(&self) {
        if let Ok(mut notices) = self.expired_notices.lock() {
            *notices += 1;
        }
    }
}
