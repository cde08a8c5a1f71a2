//! Account records and registration input validation

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::password::MAX_PASSWORD_BYTES;

/// Shortest password accepted at registration or reset
pub const MIN_PASSWORD_LEN: usize = 8;

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;

/// A registered user
///
/// `password` always holds a bcrypt hash and is never serialized.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Account {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Build a fresh account around an already-hashed password
    pub fn new(profile: Profile, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            user_id: new_account_id(),
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
            password: password_hash,
            email_verified_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// UUID v4 without hyphens
pub fn new_account_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Registration request
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Editable profile fields
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
}

impl NewAccount {
    /// Validate and split into the profile and the plaintext password
    pub fn validate(self) -> Result<(Profile, String), ValidationError> {
        validate_password(&self.password)?;
        let profile = Profile {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
        }
        .validate()?;
        Ok((profile, self.password))
    }
}

impl Profile {
    /// Trim fields and check them
    pub fn validate(self) -> Result<Self, ValidationError> {
        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();
        if first_name.len() > MAX_NAME_LEN || last_name.len() > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong);
        }

        Ok(Self {
            first_name,
            last_name,
            email: validate_email(&self.email)?,
        })
    }
}

/// Validation errors for registration and profile input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidEmail,
    PasswordTooShort,
    PasswordTooLong,
    NameTooLong,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidEmail => write!(f, "email address is not valid"),
            ValidationError::PasswordTooShort => {
                write!(f, "password must be at least {} characters", MIN_PASSWORD_LEN)
            }
            ValidationError::PasswordTooLong => {
                write!(f, "password must be at most {} bytes", MAX_PASSWORD_BYTES)
            }
            ValidationError::NameTooLong => {
                write!(f, "names must be at most {} characters", MAX_NAME_LEN)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// local@domain.tld, no whitespace
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Validate an email address, returning it trimmed
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    if email.len() > MAX_EMAIL_LEN || !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email.to_string())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::PasswordTooLong);
    }
    Ok(())
}
