//! authd - password and bearer-token authentication daemon

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use authd::{Config, LogFormat, Server};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// authd server
#[derive(Parser, Debug)]
#[command(name = "authd", version, about = "Password and bearer-token authentication daemon")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// SQLite database file (in-memory when omitted)
    #[arg(short, long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(database) = args.database {
        config.db_path = Some(database);
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "authd=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    if config.db_path.is_none() {
        tracing::warn!("no database configured, accounts live in memory only");
    }

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await?;

    Ok(())
}
