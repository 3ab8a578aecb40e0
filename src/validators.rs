/// Input validators for account credentials
///
/// Cheap shape checks that run before any storage lookup or hashing:
/// - Email: length limits, RFC 5322 simplified format, single `@`
/// - Registration form: password confirmation

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 3; // a@b
const MAX_LOCAL_PART_LENGTH: usize = 64;

lazy_static! {
    // RFC 5322 simplified; the domain must contain at least one dot
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).expect("email regex is valid");
}

/// Validates an email address and returns its normalized (trimmed,
/// lowercased) form.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email", MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH));
    }

    if trimmed.contains('\0') || trimmed.matches('@').count() != 1 {
        return Err(ValidationError::InvalidFormat("email"));
    }

    if let Some(at_pos) = trimmed.find('@') {
        if at_pos > MAX_LOCAL_PART_LENGTH {
            return Err(ValidationError::InvalidFormat("email"));
        }
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email"));
    }

    Ok(normalize_email(trimmed))
}

/// Canonical form used as the account lookup key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A supplied confirmation must repeat the password exactly.
pub fn check_confirmation(password: &str, confirm: Option<&str>) -> Result<(), ValidationError> {
    match confirm {
        Some(confirm) if confirm != password => Err(ValidationError::PasswordMismatch),
        _ => Ok(()),
    }
}
