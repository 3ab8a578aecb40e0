use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use authgate::auth::{spawn_revocation_purge, PgRevocationStore, SessionService};
use authgate::configuration::get_configuration;
use authgate::cookies::RefreshCookie;
use authgate::startup::run;
use authgate::telemetry::init_telemetry;
use authgate::users::PgUserStore;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    configuration.auth.validate().map_err(|e| {
        tracing::error!(error = %e, "Invalid auth configuration");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
    })?;

    let revocations = Arc::new(PgRevocationStore::new(pool.clone()));
    let users = Arc::new(PgUserStore::new(pool));

    let _purge = spawn_revocation_purge(
        revocations.clone(),
        configuration.revocation.purge_interval_secs,
    );

    let sessions = SessionService::new(&configuration.auth, users, revocations);
    let cookie = RefreshCookie::from_settings(&configuration);

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, sessions, cookie)?.await
}
