use argon2::{
    Argon2, PasswordVerifier,
    password_hash::{PasswordHash, PasswordHasher, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::{
    error::{AuthError, Error, Result, ValidationError},
    utils::now_utc,
};

/// A signed-in reviewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherIdentity {
    pub email: String,
}

/// Pass/fail credential check for reviewers.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn sign_in(&self, identifier: &str, secret: &str) -> std::result::Result<TeacherIdentity, AuthError>;
}

/// Email + password accounts with argon2 hashes, in the `accounts` table.
#[derive(Debug, Clone)]
pub struct PasswordAuthenticator {
    database: SqlitePool,
}

impl PasswordAuthenticator {
    /// The pool must already carry the `accounts` table (see [`crate::store::SqliteStore`]).
    pub fn new(database: SqlitePool) -> Self {
        Self { database }
    }

    pub async fn create_account(&self, email: &str, password: &str) -> Result<()> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ValidationError::EmptyField("email").into());
        }
        if password.is_empty() {
            return Err(ValidationError::EmptyField("password").into());
        }
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Fatal(anyhow::anyhow!("Failed to hash password: {}", e)))?
            .to_string();
        sqlx::query("insert into accounts (email, password, created_at) values (?, ?, ?)")
            .bind(&email)
            .bind(password_hash)
            .bind(now_utc())
            .execute(&self.database)
            .await?;
        info!("created reviewer account {email}");
        Ok(())
    }
}

#[async_trait]
impl Authenticator for PasswordAuthenticator {
    async fn sign_in(&self, identifier: &str, secret: &str) -> std::result::Result<TeacherIdentity, AuthError> {
        let email = identifier.trim().to_lowercase();
        let stored: Option<(String,)> = sqlx::query_as("select password from accounts where email = ?")
            .bind(&email)
            .fetch_optional(&self.database)
            .await
            .map_err(|e| AuthError::other(e.to_string()))?;
        let Some((password,)) = stored else {
            return Err(AuthError::invalid_credential());
        };
        let parsed_hash = PasswordHash::new(&password)
            .map_err(|e| AuthError::other(format!("Failed to parse password hash: {}", e)))?;
        if Argon2::default()
            .verify_password(secret.as_bytes(), &parsed_hash)
            .is_err()
        {
            warn!("rejected sign-in for {email}");
            return Err(AuthError::invalid_credential());
        }
        Ok(TeacherIdentity { email })
    }
}
