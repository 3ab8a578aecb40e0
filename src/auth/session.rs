/// Session Lifecycle
///
/// Orchestrates register, login, authenticate, refresh and logout on top of
/// the password hasher, token codec, user store and revocation store.
///
/// A refresh token moves `ISSUED -> REVOKED` (logout) or `ISSUED -> EXPIRED`
/// (TTL). Refreshing mints a new access token and leaves the refresh token
/// as it is.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::claims::Claims;
use crate::auth::jwt::TokenCodec;
use crate::auth::password::{validate_password_strength, PasswordHasher};
use crate::auth::revocation::RevocationStore;
use crate::configuration::AuthSettings;
use crate::error::{AppError, StorageError, TokenRejection, ValidationError};
use crate::users::UserStore;
use crate::validators::{check_confirmation, is_valid_email, normalize_email};

/// Freshly minted access/refresh pair.
///
/// The access token goes back to the caller, the refresh token to the
/// cookie transport.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug)]
pub struct Registered {
    pub tokens: TokenPair,
}

#[derive(Debug)]
pub struct LoggedIn {
    pub tokens: TokenPair,
}

#[derive(Debug)]
pub struct Authenticated {
    pub claims: Claims,
}

#[derive(Debug)]
pub struct Refreshed {
    pub access_token: String,
}

#[derive(Debug)]
pub struct LoggedOut;

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: uuid::Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

pub struct SessionService {
    users: Arc<dyn UserStore>,
    revocations: Arc<dyn RevocationStore>,
    hasher: PasswordHasher,
    codec: TokenCodec,
}

impl SessionService {
    pub fn new(
        settings: &AuthSettings,
        users: Arc<dyn UserStore>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Self {
        Self {
            users,
            revocations,
            hasher: PasswordHasher::new(settings.hash_cost),
            codec: TokenCodec::new(settings),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Create an account and open a session for it.
    ///
    /// Cheap shape checks run before the uniqueness lookup, and nothing is
    /// hashed, stored or minted once a step fails.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        confirm_password: Option<&str>,
    ) -> Result<Registered, AppError> {
        let email = is_valid_email(email)?;
        validate_password_strength(password)?;
        check_confirmation(password, confirm_password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Duplicate);
        }

        let password_hash = self.hasher.hash(password).await?;

        // A concurrent registration can still win the race to the insert
        let user = self
            .users
            .create(&email, &password_hash)
            .await
            .map_err(|e| match e {
                StorageError::Conflict(_) => AppError::Duplicate,
                other => AppError::Storage(other),
            })?;

        let tokens = self.issue_pair(user.id)?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(Registered { tokens })
    }

    /// Check a password and open a session.
    ///
    /// Unknown email and wrong password produce the same error.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoggedIn, AppError> {
        if email.trim().is_empty() {
            return Err(ValidationError::EmptyField("email").into());
        }
        if password.is_empty() {
            return Err(ValidationError::EmptyField("password").into());
        }

        let user = match self.users.find_by_email(&normalize_email(email)).await? {
            Some(user) => user,
            None => {
                self.hasher.verify_dummy(password).await?;
                tracing::info!("Login attempt for unknown account");
                return Err(AppError::InvalidCredentials);
            }
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            tracing::info!(user_id = %user.id, "Login attempt with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        let tokens = self.issue_pair(user.id)?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(LoggedIn { tokens })
    }

    /// Guard for protected operations: validate the `Authorization` header.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Authenticated, AppError> {
        let token = bearer_token(authorization).ok_or(AppError::MissingToken)?;
        let claims = self.codec.verify_access(token)?;

        tracing::debug!(user_id = %claims.sub, "Access token accepted");
        Ok(Authenticated { claims })
    }

    /// Mint a new access token from a refresh token.
    ///
    /// The blacklist lookup and the signature check are separate mandatory
    /// steps; a store failure aborts rather than passing the token.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<Refreshed, AppError> {
        let token = present(refresh_token).ok_or(AppError::MissingToken)?;

        if self.revocations.is_blacklisted(token).await? {
            return Err(TokenRejection::Revoked.into());
        }

        let claims = self.codec.verify_refresh(token)?;
        let user_id = claims.user_id()?;
        let access_token = self.codec.sign_access(user_id)?;

        tracing::info!(user_id = %user_id, "Access token refreshed");
        Ok(Refreshed { access_token })
    }

    /// Revoke a refresh token. The caller must already be authenticated.
    ///
    /// Revoking an already revoked token succeeds again; the signature and
    /// expiry are still re-checked each time.
    pub async fn logout(
        &self,
        caller: &Claims,
        refresh_token: Option<&str>,
    ) -> Result<LoggedOut, AppError> {
        let token = present(refresh_token).ok_or(AppError::MissingToken)?;

        let claims = self.codec.verify_refresh(token)?;
        if claims.sub != caller.sub {
            tracing::warn!(
                caller = %caller.sub,
                token_subject = %claims.sub,
                "Logout revokes a refresh token owned by another subject"
            );
        }

        self.revocations.blacklist(token, claims.expires_at()?).await?;

        tracing::info!(user_id = %claims.sub, "Refresh token revoked");
        Ok(LoggedOut)
    }

    /// Account details for an authenticated subject
    pub async fn current_user(&self, claims: &Claims) -> Result<UserProfile, AppError> {
        let user = self
            .users
            .find_by_id(claims.user_id()?)
            .await?
            .ok_or(AppError::UserNotFound)?;

        Ok(UserProfile {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        })
    }

    fn issue_pair(&self, user_id: uuid::Uuid) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.codec.sign_access(user_id)?,
            refresh_token: self.codec.sign_refresh(user_id)?,
        })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    present(Some(token))
}

fn present(token: Option<&str>) -> Option<&str> {
    token.map(str::trim).filter(|t| !t.is_empty())
}
