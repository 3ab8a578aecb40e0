/// Password Hashing and Verification
///
/// bcrypt with a configurable cost factor. Both operations run on the
/// blocking thread pool since a single hash takes tens of milliseconds.

use std::sync::Arc;

use bcrypt::{hash, verify};
use tokio::sync::OnceCell;

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
/// bcrypt ignores everything past the first 72 bytes of its input
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hashed once per hasher and verified against when an account lookup
/// misses, so a login for an unknown email costs the same as one with a
/// wrong password at the configured cost.
const DUMMY_PASSWORD: &str = "dummy-password-for-unknown-accounts";

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_hash: Arc<OnceCell<String>>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Hash a password with a fresh random salt
    ///
    /// # Errors
    /// Returns `AppError::Validation` for passwords bcrypt would truncate,
    /// `AppError::Hashing` if bcrypt fails or the blocking worker could not
    /// run the job
    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(ValidationError::TooLong("password", MAX_PASSWORD_BYTES).into());
        }

        let password = password.to_owned();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || hash(password, cost))
            .await
            .map_err(|e| AppError::Hashing(format!("hashing task failed: {}", e)))?
            .map_err(|e| AppError::Hashing(e.to_string()))
    }

    /// Verify a password against a stored hash
    ///
    /// A malformed hash verifies as `false`, and so does a password too long
    /// to have been hashed. Only a lost blocking worker is reported as an
    /// error.
    pub async fn verify(&self, password: &str, password_hash: &str) -> Result<bool, AppError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Ok(false);
        }

        let password = password.to_owned();
        let password_hash = password_hash.to_owned();

        let outcome = tokio::task::spawn_blocking(move || verify(password, &password_hash))
            .await
            .map_err(|e| AppError::Hashing(format!("verification task failed: {}", e)))?;

        match outcome {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash could not be parsed");
                Ok(false)
            }
        }
    }

    /// Burn one verification's worth of time without a real account.
    pub async fn verify_dummy(&self, password: &str) -> Result<(), AppError> {
        let dummy_hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD))
            .await?;

        self.verify(password, dummy_hash).await.map(|_| ())
    }
}

/// Validate password strength requirements
///
/// Requirements:
/// - At least 8 characters and at most 72 bytes
/// - At least one uppercase letter, one lowercase letter, one digit and one symbol
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password"));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password", MIN_PASSWORD_LENGTH));
    }

    // Measured in bytes: multi-byte characters count toward bcrypt's limit
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_BYTES));
    }

    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if !has_digit || !has_lowercase || !has_uppercase || !has_symbol {
        return Err(ValidationError::WeakPassword);
    }

    Ok(())
}
