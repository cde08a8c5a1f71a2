//! Opaque bearer tokens
//!
//! A token is 16 random bytes rendered as unpadded base-32, always 26
//! characters. Only its SHA-256 fingerprint is stored; the plaintext is
//! handed to the client once at issue time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::store::StoreError;

/// Random bytes per token
pub const TOKEN_BYTES: usize = 16;

/// Encoded plaintext length (16 bytes in base-32, no padding)
pub const TOKEN_LEN: usize = 26;

/// Authorization scheme accepted in the header
pub const BEARER_SCHEME: &str = "Bearer";

/// Why a presented credential was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingHeader,
    MalformedHeader,
    WrongLength,
    TokenNotFound,
    TokenExpired,
    OwnerNotFound,
}

impl Rejection {
    /// Stable reason code for logs and API consumers
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::MissingHeader => "missing_header",
            Rejection::MalformedHeader => "malformed_header",
            Rejection::WrongLength => "wrong_length",
            Rejection::TokenNotFound => "token_not_found",
            Rejection::TokenExpired => "token_expired",
            Rejection::OwnerNotFound => "owner_not_found",
        }
    }

    /// True for rejections decided from the header alone
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Rejection::MissingHeader | Rejection::MalformedHeader | Rejection::WrongLength
        )
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Token errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token rejected: {0}")]
    Rejected(Rejection),

    #[error("secure random source unavailable: {0}")]
    RandomSource(String),

    #[error("token lifetime out of range: {0:?}")]
    InvalidTtl(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<Rejection> for TokenError {
    fn from(rejection: Rejection) -> Self {
        TokenError::Rejected(rejection)
    }
}

/// A freshly minted token, the only place its plaintext exists
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    #[serde(skip)]
    pub account_id: String,
    pub token: String,
    #[serde(skip)]
    pub fingerprint: Vec<u8>,
    pub expire_at: DateTime<Utc>,
}

/// A stored token row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TokenRecord {
    pub id: String,
    pub user_id: String,
    pub token_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Build the row for a newly issued token
    pub fn from_issued(issued: &IssuedToken) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            user_id: issued.account_id.clone(),
            token_hash: issued.fingerprint.clone(),
            created_at: now,
            updated_at: now,
            expire_at: issued.expire_at,
        }
    }

    /// Valid strictly before `expire_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expire_at
    }
}

/// SHA-256 of the plaintext token
pub fn fingerprint(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Mint a new token for an account, expiring `ttl` from now
pub fn generate_token(account_id: &str, ttl: Duration) -> Result<IssuedToken, TokenError> {
    let mut random_bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut random_bytes)
        .map_err(|e| TokenError::RandomSource(e.to_string()))?;

    let expire_at = chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or(TokenError::InvalidTtl(ttl))?;

    let token = BASE32_NOPAD.encode(&random_bytes);

    Ok(IssuedToken {
        account_id: account_id.to_string(),
        fingerprint: fingerprint(&token),
        token,
        expire_at,
    })
}

/// Extract the plaintext token from an `Authorization` header value
///
/// Checks run cheapest first: header presence, then shape and scheme, then
/// length. Nothing here touches storage.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, Rejection> {
    let header = match header {
        Some(h) if !h.is_empty() => h,
        _ => return Err(Rejection::MissingHeader),
    };

    let parts: Vec<&str> = header.split(' ').collect();
    if parts.len() != 2 || parts[0] != BEARER_SCHEME {
        return Err(Rejection::MalformedHeader);
    }

    check_length(parts[1])
}

/// Reject any token that is not exactly [`TOKEN_LEN`] bytes long
pub fn check_length(token: &str) -> Result<&str, Rejection> {
    if token.len() != TOKEN_LEN {
        return Err(Rejection::WrongLength);
    }
    Ok(token)
}
