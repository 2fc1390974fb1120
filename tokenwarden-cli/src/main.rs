//! tokenwarden CLI
//!
//! Command-line access token broker for registered OAuth clients.
//!
//! # Usage
//!
//! ```bash
//! # Register a client (interactive)
//! tokenwarden add
//!
//! # Print an access token for a client
//! tokenwarden token demo
//! tokenwarden demo
//!
//! # Forget the cached login or stored secret of a client
//! tokenwarden uncache demo
//! ```

mod commands;
mod prompt;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::process::ExitCode;
use tokenwarden_core::config::load_settings;
use tokenwarden_core::{PromptError, WardenError};
use tracing_subscriber::EnvFilter;

/// Exit status for an operator cancellation (128 + SIGINT).
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "tokenwarden")]
#[command(about = "Access tokens for registered OAuth clients")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    token: TokenArgs,
}

#[derive(Args, Debug, Default)]
pub struct TokenArgs {
    /// Registered client name (prompted for when omitted)
    name: Option<String>,

    /// Sign in with a device code instead of a browser redirect
    #[arg(long)]
    device_code: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an access token for a client (the default)
    Token(TokenArgs),

    /// Register a new client
    Add,

    /// Remove a registered client
    Remove {
        /// Client name
        name: Option<String>,
    },

    /// Forget the stored secret or cached login of a client
    Uncache {
        /// Client name
        name: Option<String>,
    },

    /// Print a registered client
    Show {
        /// Client name
        name: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ShowFormat::Toml)]
        format: ShowFormat,
    },

    /// List registered clients
    List,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ShowFormat {
    Toml,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = load_settings();
    let default_level = settings
        .as_ref()
        .map(|s| s.log_level.clone())
        .unwrap_or_else(|_| "warn".to_string());
    init_logging(cli.verbose, &default_level);

    let result = match settings {
        Ok(settings) => {
            let ctx = commands::Context::new(settings, cli.verbose);
            run(ctx, cli.command.unwrap_or(Commands::Token(cli.token))).await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_cancelled(&err) => {
            tracing::debug!("Cancelled by operator");
            ExitCode::from(EXIT_CANCELLED)
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(ctx: commands::Context, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Token(args) => commands::token(&ctx, args.name, args.device_code).await,
        Commands::Add => commands::add(&ctx).await,
        Commands::Remove { name } => commands::remove(&ctx, name),
        Commands::Uncache { name } => commands::uncache(&ctx, name).await,
        Commands::Show { name, format } => commands::show(&ctx, name, format),
        Commands::List => commands::list(&ctx),
    }
}

/// Log to stderr: `RUST_LOG` wins, then `-v`, then the configured level.
fn init_logging(verbose: bool, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { default_level })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(cause.downcast_ref::<WardenError>(), Some(WardenError::Cancelled))
            || matches!(cause.downcast_ref::<PromptError>(), Some(PromptError::Cancelled))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_name_is_token_command() {
        let cli = Cli::try_parse_from(["tokenwarden", "demo", "--device-code"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.token.name.as_deref(), Some("demo"));
        assert!(cli.token.device_code);
    }

    #[test]
    fn test_show_format() {
        let cli = Cli::try_parse_from(["tokenwarden", "show", "demo", "--format", "json"]).unwrap();
        match cli.command {
            Some(Commands::Show { name, format }) => {
                assert_eq!(name.as_deref(), Some("demo"));
                assert_eq!(format, ShowFormat::Json);
            }
            _ => panic!("expected show command"),
        }
    }

    #[test]
    fn test_cancellation_detected_through_context() {
        let err = anyhow::Error::from(WardenError::Cancelled).context("acquiring token");
        assert!(is_cancelled(&err));

        let err = anyhow::Error::from(PromptError::Failed {
            message: "no tty".to_string(),
        });
        assert!(!is_cancelled(&err));
    }
}
