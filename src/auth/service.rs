//! Authentication service
//!
//! The operations the HTTP layer calls: login, request authentication,
//! logout, and account lifecycle with token cascades.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::accounts::{validate_password, Account, NewAccount, Profile};
use super::password::CredentialVerifier;
use super::store::{bounded, AccountStore, TokenStore};
use super::token::IssuedToken;
use super::tokens::TokenManager;
use super::{AuthError, AuthSettings};

pub struct AuthService {
    verifier: CredentialVerifier,
    accounts: Arc<dyn AccountStore>,
    tokens: TokenManager,
    timeout: Duration,
}

impl AuthService {
    /// Create a service over one store providing both capabilities
    pub fn new<S>(store: Arc<S>, settings: AuthSettings) -> Self
    where
        S: AccountStore + TokenStore + 'static,
    {
        let accounts: Arc<dyn AccountStore> = store.clone();
        let token_store: Arc<dyn TokenStore> = store;
        Self::with_parts(
            CredentialVerifier::new(settings.password_cost),
            accounts.clone(),
            TokenManager::new(token_store, accounts, settings.token_ttl, settings.db_timeout),
            settings.db_timeout,
        )
    }

    pub fn with_parts(
        verifier: CredentialVerifier,
        accounts: Arc<dyn AccountStore>,
        tokens: TokenManager,
        timeout: Duration,
    ) -> Self {
        Self {
            verifier,
            accounts,
            tokens,
            timeout,
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    /// Build the dummy hash up front so the first unknown-email login is not
    /// slower than the rest
    pub async fn warm_up(&self) -> Result<(), AuthError> {
        self.verifier.dummy_hash().await?;
        Ok(())
    }

    /// Register a new account
    pub async fn register(&self, req: NewAccount) -> Result<Account, AuthError> {
        let (profile, password) = req.validate()?;
        let hash = self.verifier.hash(&password).await?;
        let account = Account::new(profile, hash);

        bounded(self.timeout, self.accounts.insert_account(&account)).await?;
        info!(account_id = %account.user_id, "account registered");
        Ok(account)
    }

    /// Check email and password, then issue a fresh token
    ///
    /// Any earlier token of the account stops working.
    pub async fn login(&self, email: &str, password: &str) -> Result<(Account, IssuedToken), AuthError> {
        let Some(account) =
            bounded(self.timeout, self.accounts.find_account_by_email(email.trim())).await?
        else {
            // Same bcrypt work as a wrong password
            if let Err(e) = self.verifier.verify_dummy(password).await {
                warn!(error = %e, "dummy password check failed");
            }
            info!("login failed: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        match self.verifier.verify(&account.password, password).await {
            Ok(true) => {}
            Ok(false) => {
                info!(account_id = %account.user_id, "login failed: wrong password");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                error!(account_id = %account.user_id, error = %e, "stored password hash unusable");
                return Err(AuthError::InvalidCredentials);
            }
        }

        let token = self.tokens.issue(&account.user_id).await?;
        info!(account_id = %account.user_id, "login succeeded");
        Ok((account, token))
    }

    /// Resolve an `Authorization` header value to its account
    pub async fn authenticate_request(&self, header: Option<&str>) -> Result<Account, AuthError> {
        self.tokens.resolve(header).await.map_err(|e| {
            let e = AuthError::from(e);
            if !matches!(e, AuthError::Unauthorized(_)) {
                warn!(error = %e, "token resolution failed");
            }
            e
        })
    }

    /// Revoke the presented token
    pub async fn logout(&self, plaintext: &str) -> Result<(), AuthError> {
        self.tokens.revoke(plaintext).await?;
        Ok(())
    }

    pub async fn find_account(&self, id: &str) -> Result<Account, AuthError> {
        bounded(self.timeout, self.accounts.find_account_by_id(id))
            .await?
            .ok_or(AuthError::AccountNotFound)
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, AuthError> {
        Ok(bounded(self.timeout, self.accounts.list_accounts()).await?)
    }

    /// Replace name and email of a live account
    pub async fn update_profile(&self, id: &str, profile: Profile) -> Result<Account, AuthError> {
        let profile = profile.validate()?;
        let updated = bounded(
            self.timeout,
            self.accounts
                .update_profile(id, &profile.first_name, &profile.last_name, &profile.email),
        )
        .await?;

        if !updated {
            return Err(AuthError::AccountNotFound);
        }
        self.find_account(id).await
    }

    /// Store a new password hash for an account and revoke its tokens
    pub async fn reset_password(&self, id: &str, password: &str) -> Result<(), AuthError> {
        validate_password(password)?;
        let hash = self.verifier.hash(password).await?;

        if !bounded(self.timeout, self.accounts.update_password(id, &hash)).await? {
            return Err(AuthError::AccountNotFound);
        }
        let revoked = self.tokens.revoke_all(id).await?;
        info!(account_id = id, revoked, "password reset");
        Ok(())
    }

    /// Remove an account and, with it, all of its tokens
    pub async fn delete_account(&self, id: &str) -> Result<(), AuthError> {
        if !bounded(self.timeout, self.accounts.delete_account(id)).await? {
            return Err(AuthError::AccountNotFound);
        }
        info!(account_id = id, "account deleted");
        Ok(())
    }

    /// Soft-delete an account; its tokens are removed
    pub async fn deactivate_account(&self, id: &str) -> Result<(), AuthError> {
        if !bounded(self.timeout, self.accounts.soft_delete_account(id)).await? {
            return Err(AuthError::AccountNotFound);
        }
        info!(account_id = id, "account deactivated");
        Ok(())
    }
}
