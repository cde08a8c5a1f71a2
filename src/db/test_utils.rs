//! Shared test utilities for database operations
//!
//! Provides a common test_pool() backed by the real migrations, account
//! fixtures, and a store wrapper that counts every storage call.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::Database;
use crate::auth::accounts::{Account, Profile};
use crate::auth::password::{hash_password, MIN_COST};
use crate::auth::store::{AccountStore, SqliteStore, StoreError, TokenStore};
use crate::auth::token::TokenRecord;

/// Password used by [`test_account`]
pub const TEST_PASSWORD: &str = "password123";

/// Create an in-memory test database pool with full schema
pub async fn test_pool() -> SqlitePool {
    let db = Database::new(None)
        .await
        .expect("Failed to create test database");
    db.pool().clone()
}

/// Build an account whose password is [`TEST_PASSWORD`], hashed at minimum cost
pub fn test_account(email: &str) -> Account {
    let profile = Profile {
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: email.to_string(),
    };
    let hash = hash_password(TEST_PASSWORD, MIN_COST).expect("Failed to hash test password");
    Account::new(profile, hash)
}

/// SqliteStore wrapper counting storage calls
pub struct CountingStore {
    inner: SqliteStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountStore for CountingStore {
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        self.hit();
        self.inner.insert_account(account).await
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.hit();
        self.inner.find_account_by_email(email).await
    }

    async fn find_account_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        self.hit();
        self.inner.find_account_by_id(id).await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.hit();
        self.inner.list_accounts().await
    }

    async fn update_profile(
        &self,
        id: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<bool, StoreError> {
        self.hit();
        self.inner.update_profile(id, first_name, last_name, email).await
    }

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool, StoreError> {
        self.hit();
        self.inner.update_password(id, password_hash).await
    }

    async fn delete_account(&self, id: &str) -> Result<bool, StoreError> {
        self.hit();
        self.inner.delete_account(id).await
    }

    async fn soft_delete_account(&self, id: &str) -> Result<bool, StoreError> {
        self.hit();
        self.inner.soft_delete_account(id).await
    }
}

#[async_trait]
impl TokenStore for CountingStore {
    async fn replace_tokens(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.hit();
        self.inner.replace_tokens(record).await
    }

    async fn find_token(&self, fingerprint: &[u8]) -> Result<Option<TokenRecord>, StoreError> {
        self.hit();
        self.inner.find_token(fingerprint).await
    }

    async fn delete_token(&self, fingerprint: &[u8]) -> Result<u64, StoreError> {
        self.hit();
        self.inner.delete_token(fingerprint).await
    }

    async fn delete_tokens_for_account(&self, account_id: &str) -> Result<u64, StoreError> {
        self.hit();
        self.inner.delete_tokens_for_account(account_id).await
    }

    async fn count_tokens_for_account(&self, account_id: &str) -> Result<i64, StoreError> {
        self.hit();
        self.inner.count_tokens_for_account(account_id).await
    }
}
