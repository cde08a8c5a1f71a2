//! authd_init - One-time database initialization tool
//!
//! Creates a fresh authd database with a first account.

use std::path::PathBuf;

use anyhow::Result;
use authd::auth::NewAccount;
use authd::Config;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// authd database initialization tool
#[derive(Parser, Debug)]
#[command(name = "authd_init", version, about = "Initialize a new authd database")]
struct Args {
    /// Path to SQLite database file to create (must not exist)
    #[arg(short, long)]
    database: PathBuf,

    /// Optional TOML config file (hashing cost, timeouts)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First name of the account
    #[arg(long, default_value = "")]
    first_name: String,

    /// Last name of the account
    #[arg(long, default_value = "")]
    last_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authd=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    // Read credentials from environment
    let email = std::env::var("AUTHD_INIT_EMAIL")
        .map_err(|_| anyhow::anyhow!("AUTHD_INIT_EMAIL environment variable is required"))?;

    let password = std::env::var("AUTHD_INIT_PASSWORD")
        .map_err(|_| anyhow::anyhow!("AUTHD_INIT_PASSWORD environment variable is required"))?;

    let account = NewAccount {
        first_name: args.first_name,
        last_name: args.last_name,
        email,
        password,
    };

    authd::init::init_database(&args.database, account, config.auth_settings()).await?;

    Ok(())
}
