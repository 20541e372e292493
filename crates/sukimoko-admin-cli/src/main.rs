//! Sukimoko admin - command-line access to the shop's admin backend.
//!
//! Signs in against the backend, keeps the session token between runs, and
//! issues authenticated requests through the core gateway.

mod app;
mod terminal;
mod views;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sukimoko_admin_core::{Config, GatewayError};

use app::App;

#[derive(Parser, Debug)]
#[command(name = "sukimoko-admin", version, about = "Sukimoko shop administration from the terminal")]
struct Cli {
    /// Backend base URL (overrides config and SUKIMOKO_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session token
    Login(LoginArgs),
    /// Forget the stored session token
    Logout,
    /// Show whether a session is stored and who it belongs to
    Status,
    /// Fetch the signed-in user's profile
    Whoami,
    /// Show the dashboard counters
    Dashboard,
    /// Send an authenticated request and print the response
    Request(RequestArgs),
    /// Inspect or change the configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
struct LoginArgs {
    /// Account email (prompted for when omitted)
    #[arg(long)]
    email: Option<String>,

    /// Read the password from the first line of stdin
    #[arg(long)]
    password_stdin: bool,
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// HTTP method, e.g. GET or PATCH
    method: String,

    /// Path under the base URL, or an absolute URL
    path: String,

    /// JSON request body
    #[arg(long)]
    data: Option<String>,

    /// Extra header as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Persist a new backend base URL
    SetUrl { url: String },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("--log-file must name a file"))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let _guard = match init_tracing(cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("sukimoko-admin starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !already_reported(&e) {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

/// Auth failures were already shown to the user by the terminal navigator
fn already_reported(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<GatewayError>()
        .and_then(GatewayError::auth_failure)
        .is_some()
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    config.apply_env(cli.api_url);

    match cli.command {
        Command::Login(args) => App::new(config)?.login(args.email, args.password_stdin).await,
        Command::Logout => App::new(config)?.logout(),
        Command::Status => {
            App::new(config)?.print_status();
            Ok(())
        }
        Command::Whoami => views::whoami(App::new(config)?.gateway()).await,
        Command::Dashboard => views::dashboard(App::new(config)?.gateway()).await,
        Command::Request(args) => {
            let app = App::new(config)?;
            views::request(app.gateway(), &args.method, &args.path, args.data.as_deref(), &args.headers).await
        }
        Command::Config(ConfigCommand::Show) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("config file: {}", Config::config_path()?.display());
            Ok(())
        }
        Command::Config(ConfigCommand::SetUrl { url }) => {
            // Persist only the URL, not the env/flag overrides
            let mut stored = Config::load()?;
            stored.apply_overrides(None, Some(url));
            stored.save()?;
            println!("API base URL set to {}", stored.api_base_url);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sukimoko_admin_core::{ApiError, AuthFailure};

    #[test]
    fn test_auth_failures_are_not_reported_twice() {
        let rejected = anyhow::Error::new(GatewayError::Auth(AuthFailure::CredentialRejected));
        assert!(already_reported(&rejected));

        let missing = anyhow::Error::from(GatewayError::from(AuthFailure::NoCredential));
        assert!(already_reported(&missing));
    }

    #[test]
    fn test_other_errors_are_reported() {
        let server = anyhow::Error::new(GatewayError::Api(ApiError::ServerError("boom".into())));
        assert!(!already_reported(&server));
        assert!(!already_reported(&anyhow::Error::new(GatewayError::ForbiddenHeader)));
        assert!(!already_reported(&anyhow!("--data must be valid JSON")));
    }

    #[test]
    fn test_cli_parses_request_command() {
        let cli = Cli::try_parse_from([
            "sukimoko-admin", "request", "patch", "/api/order/7", "--data", "{}", "-H", "X-Trace: 1",
        ])
        .unwrap();
        match cli.command {
            Command::Request(args) => {
                assert_eq!(args.method, "patch");
                assert_eq!(args.headers, vec!["X-Trace: 1"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
