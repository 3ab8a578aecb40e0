/// JWT Token Generation and Validation
///
/// Access and refresh tokens are HS256 JWTs signed with separate secrets.
/// Leaking the access secret therefore cannot mint refresh tokens, and
/// neither class verifies under the other's verifier.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::configuration::AuthSettings;
use crate::error::{AppError, TokenRejection};

struct ClassKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: i64,
}

impl ClassKeys {
    fn new(secret: &str, ttl: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// Signs and verifies both token classes
pub struct TokenCodec {
    access: ClassKeys,
    refresh: ClassKeys,
    issuer: String,
}

impl TokenCodec {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            access: ClassKeys::new(&settings.access_secret, settings.access_token_ttl),
            refresh: ClassKeys::new(&settings.refresh_secret, settings.refresh_token_ttl),
            issuer: settings.issuer.clone(),
        }
    }

    pub fn sign_access(&self, user_id: Uuid) -> Result<String, AppError> {
        self.sign(user_id, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> Result<String, AppError> {
        self.sign(user_id, TokenKind::Refresh)
    }

    /// Validate an access token and extract its claims
    ///
    /// # Errors
    /// `AppError::InvalidToken` if the token is malformed, tampered with,
    /// expired or not an access token
    pub fn verify_access(&self, token: &str) -> Result<Claims, AppError> {
        self.verify(token, TokenKind::Access)
    }

    /// Validate a refresh token's signature and expiry.
    ///
    /// Says nothing about revocation; callers must consult the revocation
    /// store as a separate step.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AppError> {
        self.verify(token, TokenKind::Refresh)
    }

    fn keys(&self, kind: TokenKind) -> &ClassKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn sign(&self, user_id: Uuid, kind: TokenKind) -> Result<String, AppError> {
        let keys = self.keys(kind);
        let claims = Claims::new(user_id, kind, keys.ttl, self.issuer.clone());

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.keys(kind).decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => TokenRejection::Expired,
                    ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                    _ => TokenRejection::Malformed,
                };
                tracing::debug!(token_kind = %kind, error = %e, "JWT validation error");
                AppError::InvalidToken(reason)
            })?;

        if claims.typ != kind {
            return Err(AppError::InvalidToken(TokenRejection::WrongClass));
        }

        Ok(claims)
    }
}
