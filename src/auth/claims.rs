/// JWT Claims structure
///
/// Payload shared by access and refresh tokens. The `typ` claim names the
/// token class so a token minted for one class is refused by the other
/// even before the signature check runs against the wrong secret.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, TokenRejection};

/// Token class
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub typ: TokenKind,
    /// Unique token ID, keeps two tokens minted in the same second distinct
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    /// Create new claims for a subject
    ///
    /// # Arguments
    /// * `user_id` - Subject's UUID
    /// * `typ` - Token class
    /// * `ttl_seconds` - Token lifetime from now
    /// * `issuer` - Issuer identifier
    pub fn new(user_id: Uuid, typ: TokenKind, ttl_seconds: i64, issuer: String) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            typ,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl_seconds,
            iss: issuer,
        }
    }

    /// Extract the subject's user ID
    ///
    /// # Errors
    /// A signed token whose subject is not a UUID is treated as malformed
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::InvalidToken(TokenRejection::Malformed))
    }

    /// Expiry as a timestamp, used as the blacklist retention deadline
    pub fn expires_at(&self) -> Result<DateTime<Utc>, AppError> {
        DateTime::<Utc>::from_timestamp(self.exp, 0)
            .ok_or(AppError::InvalidToken(TokenRejection::Malformed))
    }
}
