//! Storage capabilities consumed by the auth core
//!
//! `AccountStore` and `TokenStore` are injected into the services at
//! construction time. `SqliteStore` implements both over a single pool.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use thiserror::Error;

use super::accounts::Account;
use super::token::TokenRecord;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),

    #[error("email already registered")]
    EmailTaken,
}

/// Run a storage call under a deadline
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

/// Account lookups and mutations
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_account_by_id(&self, id: &str) -> Result<Option<Account>, StoreError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Returns false when no live account has this id
    async fn update_profile(
        &self,
        id: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<bool, StoreError>;

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool, StoreError>;

    /// Physically remove the account and its tokens
    async fn delete_account(&self, id: &str) -> Result<bool, StoreError>;

    /// Mark the account deleted and remove its tokens
    async fn soft_delete_account(&self, id: &str) -> Result<bool, StoreError>;
}

/// Token persistence, keyed by fingerprint
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Delete every token of `record.user_id` and insert `record`, atomically
    async fn replace_tokens(&self, record: &TokenRecord) -> Result<(), StoreError>;

    async fn find_token(&self, fingerprint: &[u8]) -> Result<Option<TokenRecord>, StoreError>;

    async fn delete_token(&self, fingerprint: &[u8]) -> Result<u64, StoreError>;

    async fn delete_tokens_for_account(&self, account_id: &str) -> Result<u64, StoreError>;

    async fn count_tokens_for_account(&self, account_id: &str) -> Result<i64, StoreError>;
}

const ACCOUNT_COLUMNS: &str = "user_id, first_name, last_name, email, password, \
     email_verified_at, created_at, updated_at, deleted_at";

/// SQLite-backed store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn map_unique_email(e: sqlx::Error) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::EmailTaken,
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl AccountStore for SqliteStore {
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users
                (user_id, first_name, last_name, email, password, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&account.user_id)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.email)
        .bind(&account.password)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_email)?;

        Ok(())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let query = format!(
            "SELECT {} FROM users WHERE email = ? AND deleted_at IS NULL",
            ACCOUNT_COLUMNS
        );
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_account_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let query = format!(
            "SELECT {} FROM users WHERE user_id = ? AND deleted_at IS NULL",
            ACCOUNT_COLUMNS
        );
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let query = format!(
            "SELECT {} FROM users WHERE deleted_at IS NULL ORDER BY created_at",
            ACCOUNT_COLUMNS
        );
        let accounts = sqlx::query_as::<_, Account>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    async fn update_profile(
        &self,
        id: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET first_name = ?, last_name = ?, email = ?, updated_at = ?
             WHERE user_id = ? AND deleted_at IS NULL",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_unique_email)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET password = ?, updated_at = ? WHERE user_id = ? AND deleted_at IS NULL",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_account(&self, id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tokens WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_account(&self, id: &str) -> Result<bool, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tokens WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(
            "UPDATE users SET deleted_at = ?, updated_at = ? WHERE user_id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TokenStore for SqliteStore {
    async fn replace_tokens(&self, record: &TokenRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tokens WHERE user_id = ?")
            .bind(&record.user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO tokens (id, user_id, token_hash, created_at, updated_at, expire_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.token_hash)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.expire_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_token(&self, fingerprint: &[u8]) -> Result<Option<TokenRecord>, StoreError> {
        let record = sqlx::query_as::<_, TokenRecord>(
            "SELECT id, user_id, token_hash, created_at, updated_at, expire_at
             FROM tokens WHERE token_hash = ?",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn delete_token(&self, fingerprint: &[u8]) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tokens WHERE token_hash = ?")
            .bind(fingerprint)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_tokens_for_account(&self, account_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_tokens_for_account(&self, account_id: &str) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tokens WHERE user_id = ?")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
