//! Token manager
//!
//! Issues, resolves and revokes bearer tokens. Resolution checks run in a
//! fixed order (header shape, length, existence, expiry, owner) and report
//! the first failure; the first two never reach storage.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use super::accounts::Account;
use super::store::{bounded, AccountStore, TokenStore};
use super::token::{
    check_length, fingerprint, generate_token, parse_bearer, IssuedToken, Rejection, TokenError,
    TokenRecord,
};

/// Short, non-reversible tag for log lines
fn log_tag(fingerprint: &[u8]) -> String {
    hex::encode(&fingerprint[..fingerprint.len().min(4)])
}

pub struct TokenManager {
    tokens: Arc<dyn TokenStore>,
    accounts: Arc<dyn AccountStore>,
    ttl: Duration,
    timeout: Duration,
}

impl TokenManager {
    /// Create a token manager over injected stores
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        accounts: Arc<dyn AccountStore>,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            tokens,
            accounts,
            ttl,
            timeout,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token with the configured lifetime, without storing it
    pub fn generate(&self, account_id: &str) -> Result<IssuedToken, TokenError> {
        generate_token(account_id, self.ttl)
    }

    /// Store a token, replacing every earlier token of the same account
    pub async fn persist(&self, issued: &IssuedToken) -> Result<(), TokenError> {
        let record = TokenRecord::from_issued(issued);
        bounded(self.timeout, self.tokens.replace_tokens(&record)).await?;

        info!(
            account_id = %issued.account_id,
            token = %log_tag(&issued.fingerprint),
            expire_at = %issued.expire_at,
            "token issued"
        );
        Ok(())
    }

    /// Generate and persist in one step
    pub async fn issue(&self, account_id: &str) -> Result<IssuedToken, TokenError> {
        let issued = self.generate(account_id)?;
        self.persist(&issued).await?;
        Ok(issued)
    }

    /// Resolve an `Authorization` header value to the owning account
    pub async fn resolve(&self, header: Option<&str>) -> Result<Account, TokenError> {
        let plaintext = parse_bearer(header).inspect_err(|r| {
            debug!(reason = r.code(), "authorization header rejected");
        })?;
        self.resolve_token(plaintext).await
    }

    /// Resolve a bare plaintext token to the owning account
    pub async fn resolve_token(&self, plaintext: &str) -> Result<Account, TokenError> {
        let plaintext = check_length(plaintext).inspect_err(|r| {
            debug!(reason = r.code(), "token rejected");
        })?;

        let hash = fingerprint(plaintext);
        let tag = log_tag(&hash);

        let record = bounded(self.timeout, self.tokens.find_token(&hash))
            .await?
            .ok_or_else(|| reject(Rejection::TokenNotFound, &tag))?;

        if record.is_expired_at(Utc::now()) {
            return Err(reject(Rejection::TokenExpired, &tag));
        }

        bounded(self.timeout, self.accounts.find_account_by_id(&record.user_id))
            .await?
            .ok_or_else(|| reject(Rejection::OwnerNotFound, &tag))
    }

    /// Boolean validity check of a bare token
    pub async fn validate(&self, plaintext: &str) -> Result<bool, TokenError> {
        match self.resolve_token(plaintext).await {
            Ok(_) => Ok(true),
            Err(TokenError::Rejected(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete one token by plaintext; deleting nothing is not an error
    pub async fn revoke(&self, plaintext: &str) -> Result<u64, TokenError> {
        let hash = fingerprint(plaintext);
        let removed = bounded(self.timeout, self.tokens.delete_token(&hash)).await?;
        debug!(token = %log_tag(&hash), removed, "token revoked");
        Ok(removed)
    }

    /// Delete every token of an account
    pub async fn revoke_all(&self, account_id: &str) -> Result<u64, TokenError> {
        let removed = bounded(self.timeout, self.tokens.delete_tokens_for_account(account_id)).await?;
        debug!(account_id, removed, "account tokens revoked");
        Ok(removed)
    }

    /// Number of stored tokens for an account
    pub async fn count_for_account(&self, account_id: &str) -> Result<i64, TokenError> {
        Ok(bounded(self.timeout, self.tokens.count_tokens_for_account(account_id)).await?)
    }
}

fn reject(rejection: Rejection, tag: &str) -> TokenError {
    debug!(reason = rejection.code(), token = tag, "token rejected");
    TokenError::Rejected(rejection)
}
