use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `true` when the email/password pair may log in.
    async fn verify(&self, email: &str, password: &str) -> bool;
}

/// A single login configured through the environment, stored as an argon2 hash
pub struct ConfiguredCredentials {
    email: String,
    password_hash: String,
}

impl ConfiguredCredentials {
    pub fn from_hash(email: String, password_hash: String) -> AppResult<Self> {
        PasswordHash::new(&password_hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;
        Ok(Self {
            email,
            password_hash,
        })
    }

    pub fn from_password(email: String, password: &str) -> AppResult<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?
            .to_string();
        Ok(Self {
            email,
            password_hash,
        })
    }
}

#[async_trait]
impl CredentialVerifier for ConfiguredCredentials {
    async fn verify(&self, email: &str, password: &str) -> bool {
        if email != self.email {
            return false;
        }

        match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::error!(error = %e, "Stored password hash is unreadable");
                false
            }
        }
    }
}

/// Used when no login is configured: nobody gets in
pub struct NoCredentials;

#[async_trait]
impl CredentialVerifier for NoCredentials {
    async fn verify(&self, email: &str, _password: &str) -> bool {
        tracing::warn!(email, "Login attempted but no credentials are configured");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matching_pair_is_accepted() {
        let creds =
            ConfiguredCredentials::from_password("admin@petride.com".to_string(), "s3nha").unwrap();
        assert!(creds.verify("admin@petride.com", "s3nha").await);
    }

    #[tokio::test]
    async fn any_mismatch_is_rejected() {
        let creds =
            ConfiguredCredentials::from_password("admin@petride.com".to_string(), "s3nha").unwrap();
        assert!(!creds.verify("admin@petride.com", "wrong").await);
        assert!(!creds.verify("other@petride.com", "s3nha").await);
        assert!(!creds.verify("", "").await);
    }

    #[tokio::test]
    async fn hash_from_config_is_used_as_is() {
        let hashed =
            ConfiguredCredentials::from_password("a@b.c".to_string(), "pw").unwrap();
        let creds =
            ConfiguredCredentials::from_hash("a@b.c".to_string(), hashed.password_hash).unwrap();
        assert!(creds.verify("a@b.c", "pw").await);
    }

    #[test]
    fn garbage_hash_is_refused() {
        assert!(ConfiguredCredentials::from_hash("a@b.c".to_string(), "123456".to_string()).is_err());
    }

    #[tokio::test]
    async fn nobody_gets_in_without_config() {
        assert!(!NoCredentials.verify("admin@petride.com", "123456").await);
    }
}
