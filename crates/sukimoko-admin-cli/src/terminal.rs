use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use sukimoko_admin_core::{Navigator, LOGIN_PATH};

const LOGIN_HINT: &str = "Not signed in. Run `sukimoko-admin login` to continue.";
const EXPIRY_NOTICE: &str = "Your session has expired.";

/// Navigator for a terminal session.
///
/// There is no screen to move to, so a login redirect becomes a hint on
/// stderr. Concurrent requests can all bounce; the hint is printed once.
pub struct TerminalNavigator {
    login_hint_shown: AtomicBool,
    expiry_shown: AtomicBool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl TerminalNavigator {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stderr()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            login_hint_shown: AtomicBool::new(false),
            expiry_shown: AtomicBool::new(false),
            out: Mutex::new(out),
        }
    }

    /// For flows that end at the login screen on purpose, like logout
    pub fn suppress_login_hint(&self) {
        self.login_hint_shown.store(true, Ordering::SeqCst);
    }

    fn say(&self, line: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{}", line);
        }
    }
}

impl Navigator for TerminalNavigator {
    fn redirect(&self, target: &str) {
        if target == LOGIN_PATH && !self.login_hint_shown.swap(true, Ordering::SeqCst) {
            self.say(LOGIN_HINT);
        }
    }

    fn notify_session_expired(&self) {
        if !self.expiry_shown.swap(true, Ordering::SeqCst) {
            self.say(EXPIRY_NOTICE);
        }
    }
}
