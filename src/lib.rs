//! authd - password and bearer-token authentication daemon
//!
//! Authenticates accounts by email and password, issues opaque 26-character
//! bearer tokens, and resolves them on later requests.

pub mod api;
pub mod auth;
pub mod db;
pub mod init;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use auth::{AuthService, AuthSettings, SqliteStore};
use db::Database;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub db_path: Option<String>,
    pub token_ttl_secs: u64,
    pub db_timeout_ms: u64,
    pub password_cost: u32,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: None, // None = in-memory
            token_ttl_secs: 24 * 60 * 60,
            db_timeout_ms: 5_000,
            password_cost: auth::password::DEFAULT_COST,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file, and `AUTHD_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let config = figment.merge(Env::prefixed("AUTHD_")).extract()?;
        Ok(config)
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_millis(self.db_timeout_ms)
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            token_ttl: Duration::from_secs(self.token_ttl_secs),
            db_timeout: self.db_timeout(),
            password_cost: self.password_cost,
        }
    }
}

/// The authd server instance
pub struct Server {
    config: Config,
    db: Arc<Database>,
    auth: Arc<AuthService>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::open(config.db_path.as_deref(), config.db_timeout()).await?;
        let store = Arc::new(SqliteStore::new(db.pool().clone()));
        let auth = AuthService::new(store, config.auth_settings());
        auth.warm_up().await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            db: Arc::new(db),
            auth: Arc::new(auth),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the database handle
    pub fn db(&self) -> Arc<Database> {
        self.db.clone()
    }

    /// Get the auth service
    pub fn auth(&self) -> Arc<AuthService> {
        self.auth.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.db.clone(), self.auth.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("authd listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("authd shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
