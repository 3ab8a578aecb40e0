/// Authentication module
///
/// Password hashing, JWT signing/validation for both token classes,
/// refresh token revocation and the session lifecycle built on top.

mod claims;
mod jwt;
mod password;
mod revocation;
mod session;

pub use claims::{Claims, TokenKind};
pub use jwt::TokenCodec;
pub use password::{validate_password_strength, PasswordHasher};
pub use revocation::{
    spawn_revocation_purge, InMemoryRevocationStore, PgRevocationStore, RevocationStore,
};
pub use session::{
    bearer_token, Authenticated, LoggedIn, LoggedOut, Refreshed, Registered, SessionService,
    TokenPair, UserProfile,
};
