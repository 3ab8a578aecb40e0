/// Refresh Token Cookie
///
/// The refresh token travels only in an HTTP-only, `SameSite=Strict`
/// cookie; `Secure` follows production mode.

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::HttpRequest;

use crate::configuration::Settings;

#[derive(Debug, Clone)]
pub struct RefreshCookie {
    name: String,
    max_age_secs: i64,
    secure: bool,
}

impl RefreshCookie {
    pub fn new(name: impl Into<String>, max_age_secs: i64, secure: bool) -> Self {
        Self {
            name: name.into(),
            max_age_secs,
            secure,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.auth.cookie_name.clone(),
            settings.auth.cookie_ttl,
            settings.application.production,
        )
    }

    /// Cookie carrying a freshly issued refresh token
    pub fn issue(&self, token: &str) -> Cookie<'static> {
        Cookie::build(self.name.clone(), token.to_string())
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .path("/")
            .max_age(Duration::seconds(self.max_age_secs))
            .finish()
    }

    /// Cookie instructing the browser to drop the refresh token
    pub fn clear(&self) -> Cookie<'static> {
        let mut cookie = self.issue("");
        cookie.make_removal();
        cookie
    }

    pub fn read(&self, req: &HttpRequest) -> Option<String> {
        req.cookie(&self.name).map(|c| c.value().to_string())
    }
}
