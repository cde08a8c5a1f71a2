//! Common test utilities - AuthdTest harness for end-to-end testing

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use authd::auth::password::MIN_COST;
use authd::{Config, Server};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

/// Password used for every account the harness registers
pub const PASSWORD: &str = "password123";

/// Test harness that spawns a real authd server on a random port
pub struct AuthdTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl AuthdTest {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        Self::start_with(Config::default()).await
    }

    /// Start a server with custom settings; address and database are overridden
    pub async fn start_with(mut config: Config) -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        config.bind_addr = addr;
        config.db_path = None; // In-memory for tests
        config.password_cost = MIN_COST;

        let server = Arc::new(Server::new(config).await?);
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a GET request with an Authorization header
    pub async fn get_with_auth(&self, path: &str, authorization: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .header("Authorization", authorization)
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Make a POST request authenticated with a bearer token
    pub async fn post_with_token<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        token: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }

    /// Get direct access to the database for test setup/assertions
    pub fn db(&self) -> Arc<authd::db::Database> {
        self.server.db()
    }

    /// Register an account over HTTP and return its id
    pub async fn register(&self, email: &str) -> Result<String> {
        let resp = self
            .post(
                "/users/add",
                &json!({
                    "first_name": "Test",
                    "last_name": "User",
                    "email": email,
                    "password": PASSWORD,
                }),
            )
            .await?;
        anyhow::ensure!(resp.status() == 201, "register failed: {}", resp.status());

        let body: Value = resp.json().await?;
        Ok(body["data"]["user_id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("no user_id in response"))?
            .to_string())
    }

    /// Log in over HTTP and return the plaintext token
    pub async fn login(&self, email: &str) -> Result<String> {
        let resp = self
            .post("/auth/login", &json!({ "email": email, "password": PASSWORD }))
            .await?;
        anyhow::ensure!(resp.status() == 200, "login failed: {}", resp.status());

        let body: Value = resp.json().await?;
        Ok(body["data"]["token"]["token"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("no token in response"))?
            .to_string())
    }

    /// Count stored tokens for an account
    pub async fn token_count(&self, user_id: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tokens WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(self.db().pool())
            .await?;
        Ok(count)
    }
}

impl Drop for AuthdTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}
