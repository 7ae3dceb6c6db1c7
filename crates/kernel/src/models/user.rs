//! User model and account validation.

use anyhow::Result;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Minimum username length.
pub const MIN_USERNAME_LEN: usize = 3;

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Signup rejections.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Username must be at least {min} characters long.", min = MIN_USERNAME_LEN)]
    UsernameTooShort,

    #[error("Username may only contain letters, digits, '-' and '_'.")]
    UsernameCharacters,

    #[error("A valid email address is required.")]
    InvalidEmail,

    #[error("Password must be at least {min} characters long.", min = MIN_PASSWORD_LEN)]
    PasswordTooShort,

    #[error("failed to hash password")]
    Hash(#[source] anyhow::Error),
}

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    /// Lowercase handle used in dashboard URLs.
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub pass: String,
    /// Dashboard info text.
    pub info_text: String,
    pub created: DateTime<Utc>,
}

/// Input for creating a new user.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub username: String,
}

impl User {
    /// Build a new user record from signup input.
    ///
    /// Normalizes the username and email to lowercase and hashes the password.
    /// Uniqueness is checked by the caller against the store.
    pub fn new_account(input: &CreateUser) -> Result<Self, AccountError> {
        let username = normalize_username(&input.username)?;
        let email = input.email.trim().to_lowercase();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(AccountError::InvalidEmail);
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccountError::PasswordTooShort);
        }
        let pass = hash_password(&input.password).map_err(AccountError::Hash)?;

        Ok(Self {
            id: Uuid::now_v7(),
            username,
            email,
            pass,
            info_text: String::new(),
            created: Utc::now(),
        })
    }

    /// Verify a password against this user's hash.
    pub fn verify_password(&self, password: &str) -> bool {
        if self.pass.is_empty() {
            return false;
        }

        let Ok(parsed_hash) = PasswordHash::new(&self.pass) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Lowercase and validate a username.
pub fn normalize_username(raw: &str) -> Result<String, AccountError> {
    let username = raw.trim().to_lowercase();
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AccountError::UsernameTooShort);
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AccountError::UsernameCharacters);
    }
    Ok(username)
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
