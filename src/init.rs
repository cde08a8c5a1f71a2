//! Database initialization module
//!
//! Provides one-time database setup functionality for the authd_init tool.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tracing::info;

use crate::auth::accounts::MIN_PASSWORD_LEN;
use crate::auth::{Account, AuthService, AuthSettings, NewAccount, SqliteStore};
use crate::db::Database;

/// Initialize a new authd database with its first account
///
/// # Arguments
/// * `path` - Path to the SQLite database file (must not exist)
/// * `account` - Registration data for the first account
/// * `settings` - Hashing cost and timeouts to use
///
/// # Errors
/// * Database file already exists
/// * Password too short or email invalid
/// * Database creation fails
pub async fn init_database(path: &Path, account: NewAccount, settings: AuthSettings) -> Result<Account> {
    // Fail if database already exists
    if path.exists() {
        bail!(
            "Database file already exists: {}. Remove it first or use a different path.",
            path.display()
        );
    }

    if account.password.chars().count() < MIN_PASSWORD_LEN {
        bail!("Password must be at least {} characters", MIN_PASSWORD_LEN);
    }

    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow!("Database path is not valid UTF-8: {}", path.display()))?;

    info!("Creating new database at {}", path.display());

    // Create the database (runs migrations)
    let db = Database::open(Some(path_str), settings.db_timeout).await?;
    let service = AuthService::new(Arc::new(SqliteStore::new(db.pool().clone())), settings);

    let created = service.register(account).await?;
    info!("Created account '{}' ({})", created.email, created.user_id);

    info!("Database initialization complete");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::MIN_COST;
    use tempfile::TempDir;

    fn settings() -> AuthSettings {
        AuthSettings {
            password_cost: MIN_COST,
            ..AuthSettings::default()
        }
    }

    fn first_account(password: &str) -> NewAccount {
        NewAccount {
            first_name: "Admin".to_string(),
            last_name: String::new(),
            email: "admin@example.com".to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_init_database_creates_new() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let created = init_database(&db_path, first_account("password123"), settings())
            .await
            .unwrap();

        // Verify file was created
        assert!(db_path.exists());

        // The account can log in against the new file
        let db = Database::new(db_path.to_str()).await.unwrap();
        let service = AuthService::new(Arc::new(SqliteStore::new(db.pool().clone())), settings());
        let (account, _) = service
            .login("admin@example.com", "password123")
            .await
            .unwrap();
        assert_eq!(account.user_id, created.user_id);
    }

    #[tokio::test]
    async fn test_init_database_fails_if_exists() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create first
        init_database(&db_path, first_account("password123"), settings())
            .await
            .unwrap();

        // Try again - should fail
        let result = init_database(&db_path, first_account("password123"), settings()).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_init_database_password_validation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let result = init_database(&db_path, first_account("short"), settings()).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("8 characters"));
        assert!(!db_path.exists());
    }
}
