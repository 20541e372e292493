//! Application state for the admin CLI.
//!
//! `App` owns the configuration and the core context. The auth state is
//! read from durable storage when the context is built, before any command
//! that needs a credential runs.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use sukimoko_admin_core::auth::{LoginError, LoginForm};
use sukimoko_admin_core::{AdminContext, AuthState, Config, Gateway};

use crate::terminal::TerminalNavigator;

pub struct App {
    config: Config,
    ctx: AdminContext,
    navigator: Arc<TerminalNavigator>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let navigator = Arc::new(TerminalNavigator::new());
        let ctx = AdminContext::from_config(&config, navigator.clone())?;
        info!(state = %ctx.session.state(), api = %config.api_base_url, "Session loaded");
        Ok(Self {
            config,
            ctx,
            navigator,
        })
    }

    pub fn gateway(&self) -> &Gateway {
        &self.ctx.gateway
    }

    pub async fn login(&mut self, email: Option<String>, password_stdin: bool) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => self.prompt_email()?,
        };
        let password = if password_stdin {
            read_stdin_line()?
        } else {
            rpassword::prompt_password("Password: ")?
        };

        let form = LoginForm::new(email, password);
        match self.ctx.login.login(&form).await {
            Ok(outcome) => {
                self.config.last_email = Some(form.email.clone());
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                let who = outcome
                    .identity
                    .as_ref()
                    .and_then(|identity| identity.display_name().map(str::to_string))
                    .unwrap_or(form.email);
                println!("Login successful. Signed in as {}.", who);
                Ok(())
            }
            Err(LoginError::Invalid(e)) => Err(anyhow::anyhow!("{}", e)),
            Err(e @ LoginError::Api(_)) => {
                Err(anyhow::Error::new(e).context("Unable to reach the server"))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn logout(&self) -> Result<()> {
        let was_signed_in = self.ctx.session.is_authenticated();
        self.navigator.suppress_login_hint();
        self.ctx.login.logout().context("Failed to clear session")?;
        if was_signed_in {
            println!("Logged out.");
        } else {
            println!("No session was stored.");
        }
        Ok(())
    }

    pub fn print_status(&self) {
        println!("Backend: {}", self.config.api_base_url);
        let state = self.ctx.session.state();
        println!("Session: {}", state);
        if state == AuthState::Unauthenticated {
            return;
        }

        let Some(identity) = self.ctx.session.identity() else {
            println!("Identity: unavailable (token is not a readable JWT)");
            return;
        };
        if let Some(name) = identity.display_name() {
            println!("User: {}", name);
        }
        if let Some(ref role) = identity.role {
            println!("Role: {}", role);
        }
        match (identity.expires_at(), identity.is_expired()) {
            (Some(at), true) => println!("Token expired at {} (the server will reject it)", at),
            (Some(at), false) => println!(
                "Token expires at {} (in {}m)",
                at,
                identity.minutes_until_expiry().unwrap_or(0)
            ),
            (None, _) => println!("Token carries no expiry"),
        }
    }

    fn prompt_email(&self) -> Result<String> {
        match self.config.last_email {
            Some(ref last) => print!("Email [{}]: ", last),
            None => print!("Email: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        match (input.is_empty(), &self.config.last_email) {
            (true, Some(last)) => Ok(last.clone()),
            _ => Ok(input.to_string()),
        }
    }
}

fn read_stdin_line() -> Result<String> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}
