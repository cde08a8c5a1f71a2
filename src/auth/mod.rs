//! Authentication module
//!
//! Password credentials (bcrypt) and opaque bearer tokens for the authd
//! server. Storage is reached only through the traits in [`store`].

pub mod accounts;
pub mod password;
pub mod service;
pub mod store;
pub mod token;
pub mod tokens;

use std::time::Duration;

use thiserror::Error;

pub use accounts::{Account, NewAccount, Profile, ValidationError};
pub use password::{CredentialVerifier, PasswordError};
pub use service::AuthService;
pub use store::{AccountStore, SqliteStore, StoreError, TokenStore};
pub use token::{IssuedToken, Rejection, TokenError};
pub use tokens::TokenManager;

/// Tunables for the auth services
#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    pub token_ttl: Duration,
    pub db_timeout: Duration,
    pub password_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(24 * 60 * 60),
            db_timeout: crate::db::DEFAULT_DB_TIMEOUT,
            password_cost: password::DEFAULT_COST,
        }
    }
}

/// Authentication errors
///
/// `InvalidCredentials` covers unknown email and wrong password alike so
/// callers cannot tell which one happened.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unauthorized: {0}")]
    Unauthorized(Rejection),

    #[error("email already registered")]
    EmailTaken,

    #[error("account not found")]
    AccountNotFound,

    #[error("not permitted for this account")]
    Forbidden,

    #[error(transparent)]
    Store(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::EmailTaken => AuthError::EmailTaken,
            other => AuthError::Store(other),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Rejected(rejection) => AuthError::Unauthorized(rejection),
            TokenError::Store(store) => store.into(),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_mapping() {
        let err: AuthError = TokenError::Rejected(Rejection::TokenExpired).into();
        assert!(matches!(err, AuthError::Unauthorized(Rejection::TokenExpired)));

        let err: AuthError = TokenError::RandomSource("no entropy".into()).into();
        assert!(matches!(err, AuthError::Internal(_)));

        let err: AuthError = TokenError::Store(StoreError::Timeout(Duration::from_secs(5))).into();
        assert!(matches!(err, AuthError::Store(StoreError::Timeout(_))));
    }

    #[test]
    fn test_store_error_mapping() {
        let err: AuthError = StoreError::EmailTaken.into();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[test]
    fn test_default_settings() {
        let settings = AuthSettings::default();
        assert_eq!(settings.token_ttl, Duration::from_secs(86400));
        assert_eq!(settings.db_timeout, Duration::from_secs(5));
        assert_eq!(settings.password_cost, 12);
    }
}
