use config::ConfigError;

use crate::error::AppError;

/// bcrypt accepts costs in this range
const MIN_HASH_COST: u32 = 4;
const MAX_HASH_COST: u32 = 31;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub auth: AuthSettings,
    pub revocation: RevocationSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Marks refresh cookies `Secure`
    pub production: bool,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    /// Server URL without a database, for creating databases
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token, cookie and hashing settings
#[derive(serde::Deserialize, Clone)]
pub struct AuthSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_token_ttl: i64,  // seconds (900 = 15 minutes)
    pub refresh_token_ttl: i64, // seconds (604800 = 7 days)
    pub cookie_ttl: i64,        // seconds (86400 = 1 day)
    pub hash_cost: u32,
    pub issuer: String,
    pub cookie_name: String,
}

impl AuthSettings {
    /// Reject settings the token codec or hasher cannot work with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err(AppError::Config("token secrets must not be empty".to_string()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(AppError::Config(
                "access and refresh secrets must differ".to_string(),
            ));
        }
        if self.access_token_ttl <= 0 || self.refresh_token_ttl <= 0 || self.cookie_ttl <= 0 {
            return Err(AppError::Config("token and cookie TTLs must be positive".to_string()));
        }
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.hash_cost) {
            return Err(AppError::Config(format!(
                "hash_cost must be between {} and {}",
                MIN_HASH_COST, MAX_HASH_COST
            )));
        }
        if self.cookie_name.trim().is_empty() {
            return Err(AppError::Config("cookie_name must not be empty".to_string()));
        }
        if self.access_secret.len() < 32 || self.refresh_secret.len() < 32 {
            tracing::warn!("Token secrets shorter than 32 bytes are weak for HS256");
        }
        Ok(())
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct RevocationSettings {
    /// 0 disables the purge task
    pub purge_interval_secs: u64,
}

/// Load settings from `configuration.yaml` (optional) overlaid by
/// `APP__SECTION__KEY` environment variables.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8000)?
        .set_default("application.production", false)?
        .set_default("auth.access_token_ttl", 900)?
        .set_default("auth.refresh_token_ttl", 604_800)?
        .set_default("auth.cookie_ttl", 86_400)?
        .set_default("auth.hash_cost", 10)?
        .set_default("auth.issuer", "authgate")?
        .set_default("auth.cookie_name", "refresh_token")?
        .set_default("revocation.purge_interval_secs", 3600)?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
