//! Integration tests against Postgres-backed stores.
//!
//! Each test creates its own database from `configuration.yaml` and runs
//! the migrations, so a reachable Postgres server is required.

use std::net::TcpListener;
use std::sync::Arc;

use async_trait::async_trait;
use authgate::auth::{PgRevocationStore, RevocationStore, SessionService};
use authgate::configuration::{get_configuration, AuthSettings, DatabaseSettings};
use authgate::cookies::RefreshCookie;
use authgate::error::{AppError, StorageError};
use authgate::startup::run;
use authgate::users::{Credential, PgUserStore, UserStore};
use chrono::{Duration, Utc};
use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

const COOKIE_NAME: &str = "refresh_token";

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");
    // Migrate database
    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn test_pool() -> PgPool {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    configure_database(&configuration.database).await
}

fn auth_settings() -> AuthSettings {
    AuthSettings {
        access_secret: "postgres-access-secret-0123456789abcdef".to_string(),
        refresh_secret: "postgres-refresh-secret-0123456789abcdef".to_string(),
        access_token_ttl: 900,
        refresh_token_ttl: 604_800,
        cookie_ttl: 86_400,
        hash_cost: 4,
        issuer: "authgate-test".to_string(),
        cookie_name: COOKIE_NAME.to_string(),
    }
}

async fn revoked_rows(pool: &PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM revoked_tokens")
        .fetch_one(pool)
        .await
        .expect("Failed to count revoked tokens")
}

// --- Revocation store ---

#[tokio::test]
async fn blacklisted_token_is_reported_revoked() {
    let pool = test_pool().await;
    let store = PgRevocationStore::new(pool.clone());
    let expires_at = Utc::now() + Duration::hours(1);

    assert!(!store.is_blacklisted("token-a").await.unwrap());

    store.blacklist("token-a", expires_at).await.unwrap();

    assert!(store.is_blacklisted("token-a").await.unwrap());
    assert!(!store.is_blacklisted("token-b").await.unwrap());
}

#[tokio::test]
async fn blacklisted_token_is_stored_hashed() {
    let pool = test_pool().await;
    let store = PgRevocationStore::new(pool.clone());

    store
        .blacklist("plaintext-token", Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    let stored: String = sqlx::query_scalar("SELECT token_hash FROM revoked_tokens")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_ne!(stored, "plaintext-token");
    assert_eq!(stored.len(), 64);
}

#[tokio::test]
async fn blacklisting_same_token_concurrently_keeps_one_row() {
    let pool = test_pool().await;
    let store = PgRevocationStore::new(pool.clone());
    let expires_at = Utc::now() + Duration::hours(1);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.blacklist("same-token", expires_at).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().expect("Repeated blacklist must succeed");
    }

    assert_eq!(revoked_rows(&pool).await, 1);
    assert!(store.is_blacklisted("same-token").await.unwrap());
}

#[tokio::test]
async fn purge_removes_only_expired_entries() {
    let pool = test_pool().await;
    let store = PgRevocationStore::new(pool.clone());

    store
        .blacklist("expired", Utc::now() - Duration::minutes(5))
        .await
        .unwrap();
    store
        .blacklist("live", Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(store.purge_expired().await.unwrap(), 1);
    assert_eq!(revoked_rows(&pool).await, 1);
    assert!(!store.is_blacklisted("expired").await.unwrap());
    assert!(store.is_blacklisted("live").await.unwrap());

    assert_eq!(store.purge_expired().await.unwrap(), 0);
}

// --- User store ---

#[tokio::test]
async fn duplicate_email_insert_is_a_conflict() {
    let pool = test_pool().await;
    let store = PgUserStore::new(pool);

    let created = store.create("dup@example.com", "$2b$04$hash").await.unwrap();
    let second = store.create("dup@example.com", "$2b$04$other").await;

    assert!(matches!(second, Err(StorageError::Conflict(_))));

    let found = store.find_by_email("dup@example.com").await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(store.find_by_id(created.id).await.unwrap().unwrap().email, "dup@example.com");
    assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

/// Misses every email lookup so registration always reaches the insert,
/// as the loser of a concurrent registration race does.
struct StaleLookupUserStore(PgUserStore);

#[async_trait]
impl UserStore for StaleLookupUserStore {
    async fn find_by_email(&self, _email: &str) -> Result<Option<Credential>, StorageError> {
        Ok(None)
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<Credential, StorageError> {
        self.0.create(email, password_hash).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Credential>, StorageError> {
        self.0.find_by_id(id).await
    }
}

#[tokio::test]
async fn registration_losing_insert_race_is_duplicate() {
    let pool = test_pool().await;
    let sessions = SessionService::new(
        &auth_settings(),
        Arc::new(StaleLookupUserStore(PgUserStore::new(pool.clone()))),
        Arc::new(PgRevocationStore::new(pool)),
    );

    sessions.register("race@example.com", "P@ssw0rd1", None).await.unwrap();
    let second = sessions.register("race@example.com", "P@ssw0rd1", None).await;

    assert!(matches!(second, Err(AppError::Duplicate)));
}

// --- HTTP over Postgres ---

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
    pub client: reqwest::Client,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let db_pool = test_pool().await;
    let settings = auth_settings();
    let sessions = SessionService::new(
        &settings,
        Arc::new(PgUserStore::new(db_pool.clone())),
        Arc::new(PgRevocationStore::new(db_pool.clone())),
    );
    let cookie = RefreshCookie::new(COOKIE_NAME, settings.cookie_ttl, false);

    let server = run(listener, sessions, cookie).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool,
        client: reqwest::Client::new(),
    }
}

fn refresh_token_from(response: &reqwest::Response) -> String {
    let prefix = format!("{}=", COOKIE_NAME);
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find(|h| h.starts_with(&prefix))
        .and_then(|h| h.split(';').next())
        .map(|pair| pair[prefix.len()..].to_string())
        .expect("refresh cookie missing")
}

#[tokio::test]
async fn logout_revokes_refresh_token_in_postgres() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(&format!("{}/auth/register", &app.address))
        .json(&json!({ "email": "pg@example.com", "password": "P@ssw0rd1" }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());
    let refresh_token = refresh_token_from(&response);
    let body: Value = response.json().await.unwrap();
    let access_token = body["access_token"].as_str().unwrap().to_string();

    let duplicate = app
        .client
        .post(&format!("{}/auth/register", &app.address))
        .json(&json!({ "email": "PG@example.com", "password": "P@ssw0rd1" }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(409, duplicate.status().as_u16());

    for _ in 0..2 {
        let logout = app
            .client
            .post(&format!("{}/auth/logout", &app.address))
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header(COOKIE, format!("{}={}", COOKIE_NAME, refresh_token))
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(200, logout.status().as_u16());
    }
    assert_eq!(revoked_rows(&app.db_pool).await, 1);

    let refresh = app
        .client
        .post(&format!("{}/auth/refresh", &app.address))
        .header(COOKIE, format!("{}={}", COOKIE_NAME, refresh_token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, refresh.status().as_u16());

    let login = app
        .client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "pg@example.com", "password": "P@ssw0rd1" }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, login.status().as_u16());
}
