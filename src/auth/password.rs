//! Password hashing and verification (bcrypt)
//!
//! Hashes embed their salt and cost, so a stored hash is self-describing
//! and needs no separate salt column. bcrypt is deliberately slow; the async
//! entry points on [`CredentialVerifier`] run it on tokio's blocking pool.
//! bcrypt only reads the first 72 bytes of its NUL-terminated input, so
//! longer passwords are refused rather than silently cut.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;

/// bcrypt cost used for stored credentials
pub const DEFAULT_COST: u32 = 12;

/// Range bcrypt accepts for the cost factor
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// Longest password bcrypt can hash without truncation, in bytes
///
/// 72 bytes of key material, one of which is the terminating NUL.
pub const MAX_PASSWORD_BYTES: usize = 71;

/// Hashed once per verifier to stand in for a missing account
const DUMMY_PASSWORD: &str = "authd-missing-account";

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[source] bcrypt::BcryptError),

    #[error("stored password hash is invalid: {0}")]
    Verify(#[source] bcrypt::BcryptError),

    #[error("password worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Hash a password with a fresh random salt
///
/// Passwords over [`MAX_PASSWORD_BYTES`] are an error.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, PasswordError> {
    bcrypt::non_truncating_hash(plaintext, cost).map_err(PasswordError::Hash)
}

/// Check a plaintext password against a stored hash
///
/// A mismatch is `Ok(false)`. Only a stored hash that cannot be parsed is an
/// error, so callers can tell a wrong password apart from corrupt data.
/// Nothing longer than [`MAX_PASSWORD_BYTES`] was ever hashed, so such input
/// never matches.
pub fn verify_password(stored_hash: &str, plaintext: &str) -> Result<bool, PasswordError> {
    if plaintext.len() > MAX_PASSWORD_BYTES {
        return Ok(false);
    }
    bcrypt::non_truncating_verify(plaintext, stored_hash).map_err(PasswordError::Verify)
}

/// Credential verifier holding the hashing cost
///
/// Clones share the dummy hash and the verification counter.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    cost: u32,
    dummy_hash: Arc<OnceCell<String>>,
    verifications: Arc<AtomicUsize>,
}

impl CredentialVerifier {
    /// Create a verifier, clamping the cost into bcrypt's accepted range
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
            dummy_hash: Arc::new(OnceCell::new()),
            verifications: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Number of bcrypt verifications run so far, dummy ones included
    pub fn verifications(&self) -> usize {
        self.verifications.load(Ordering::Relaxed)
    }

    /// Hash a password on the blocking pool
    pub async fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let cost = self.cost;
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || hash_password(&plaintext, cost)).await?
    }

    /// Verify a password on the blocking pool
    pub async fn verify(&self, stored_hash: &str, plaintext: &str) -> Result<bool, PasswordError> {
        let stored_hash = stored_hash.to_owned();
        let plaintext = plaintext.to_owned();
        self.verifications.fetch_add(1, Ordering::Relaxed);
        tokio::task::spawn_blocking(move || verify_password(&stored_hash, &plaintext)).await?
    }

    /// Hash of a fixed password at this verifier's cost, built on first use
    pub async fn dummy_hash(&self) -> Result<&str, PasswordError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD))
            .await?;
        Ok(hash.as_str())
    }

    /// Spend one verification against the dummy hash and discard the outcome
    ///
    /// Used when there is no stored hash, so that path costs as much as a
    /// real password check.
    pub async fn verify_dummy(&self, plaintext: &str) -> Result<(), PasswordError> {
        let hash = self.dummy_hash().await?.to_owned();
        self.verify(&hash, plaintext).await?;
        Ok(())
    }
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}
