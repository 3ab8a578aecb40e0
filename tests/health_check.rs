//! Integration tests for the server's public liveness endpoint

use std::net::TcpListener;
use std::sync::Arc;

use authgate::auth::{InMemoryRevocationStore, SessionService};
use authgate::configuration::AuthSettings;
use authgate::cookies::RefreshCookie;
use authgate::startup::run;
use authgate::users::InMemoryUserStore;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let settings = AuthSettings {
        access_secret: "health-access-secret-0123456789abcdef".to_string(),
        refresh_secret: "health-refresh-secret-0123456789abcdef".to_string(),
        access_token_ttl: 900,
        refresh_token_ttl: 604_800,
        cookie_ttl: 86_400,
        hash_cost: 4,
        issuer: "authgate-test".to_string(),
        cookie_name: "refresh_token".to_string(),
    };
    let sessions = SessionService::new(
        &settings,
        Arc::new(InMemoryUserStore::new()),
        Arc::new(InMemoryRevocationStore::new()),
    );
    let cookie = RefreshCookie::new("refresh_token", settings.cookie_ttl, false);

    let server = run(listener, sessions, cookie).expect("Failed to create server");
    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/does-not-exist", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}
