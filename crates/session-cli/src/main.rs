//! Session Guard CLI - inspect and drive the credential lifecycle from a terminal.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use session_config_and_utils::{init_logging, Config, Paths};

/// Session Guard command-line interface.
#[derive(Parser)]
#[command(name = "session-guard")]
#[command(about = "Restore, refresh and end sessions; wait for purchases to complete")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true, env = "SESSION_GUARD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Base directory for config. Defaults to ~/.session-guard
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Keep credentials in memory only instead of the OS keychain
    #[arg(long, global = true)]
    ephemeral: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore the stored session and print the resulting auth state
    Status,
    /// Force an access token refresh
    Refresh,
    /// Sign out and wipe stored credentials
    Logout,
    /// Wait for the resource created by a purchase
    AwaitPurchase {
        /// Correlation key returned by the purchase
        correlation_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    // Initialize logging
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    let services = app::build_services(&config, cli.ephemeral)?;

    match cli.command {
        Commands::Status => app::show_status(&services).await?,
        Commands::Refresh => app::force_refresh(&services).await?,
        Commands::Logout => app::logout(&services).await?,
        Commands::AwaitPurchase { correlation_key } => {
            app::await_purchase(&services, &correlation_key).await?
        }
    }

    Ok(())
}
