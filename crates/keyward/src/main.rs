//! Keyward - OAuth 2.0 authorization code client and session manager
//!
//! Main entry point for the Keyward CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod navigator;

use commands::{account, config, oauth, status};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Keyward - OAuth 2.0 authorization code client and session manager
#[derive(Parser)]
#[command(name = "keyward")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Server URL (default: from config, then http://localhost:8080)
    #[arg(long, global = true, env = "KEYWARD_SERVER_URL")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account
    Register(account::RegisterArgs),

    /// Sign in with email and password
    Login(account::LoginArgs),

    /// Clear the local session
    Logout,

    /// Show the signed-in identity
    Whoami,

    /// Show server health and local session state
    Status,

    /// Sign in through the OAuth authorization code flow
    Oauth(oauth::OauthArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "keyward=debug,keyward_client=debug,keyward_oauth=debug,keyward_session=debug,keyward_config=debug,info"
    } else {
        "keyward=info,warn"
    };

    let log_dir = keyward_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "keyward.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(cli.verbose)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "keyward=trace,keyward_client=trace,keyward_oauth=trace,keyward_session=trace,keyward_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context::load(cli.server, cli.json, cli.verbose)?;

    match cli.command {
        Commands::Register(args) => account::register(args, &ctx).await,
        Commands::Login(args) => account::login(args, &ctx).await,
        Commands::Logout => account::logout(&ctx),
        Commands::Whoami => account::whoami(&ctx).await,
        Commands::Status => status::run(&ctx).await,
        Commands::Oauth(args) => oauth::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx),
    }
}
