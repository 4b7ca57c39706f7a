use crate::config::{build_app_state, Settings};
use crate::router::create_router;
use crate::schemas::{ApiResponse, AppState};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::Router;
use axum_test::TestServer;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::{json, Value};
use service::IdentityConfig;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const TEST_PASSWORD: &str = "Quiet-Harbor-Lantern-42";

/// Create an in-memory SQLite database for testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Settings with cheap Argon2 parameters so tests that register users stay fast
pub fn test_settings() -> Settings {
    Settings {
        database_url: "sqlite::memory:".to_string(),
        identity: IdentityConfig {
            jwt_secret: "test-signing-secret".to_string(),
            hash_memory_kib: 8,
            hash_iterations: 1,
            hash_parallelism: 1,
            ..IdentityConfig::default()
        },
        ..Settings::default()
    }
}

/// Create AppState for testing
pub async fn setup_test_app_state() -> AppState {
    let db = setup_test_db().await;
    build_app_state(db, &test_settings()).expect("Failed to build test app state")
}

/// Initialize tracing for tests with output to STDERR.
///
/// The log level is taken from RUST_LOG and defaults to WARN.
pub fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| match level.to_uppercase().as_str() {
            "ERROR" => Some(Level::ERROR),
            "WARN" => Some(Level::WARN),
            "INFO" => Some(Level::INFO),
            "DEBUG" => Some(Level::DEBUG),
            "TRACE" => Some(Level::TRACE),
            _ => None,
        })
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Create axum app for testing
pub async fn setup_test_app() -> Router {
    let state = setup_test_app_state().await;
    create_router(state)
}

pub async fn setup_test_server() -> TestServer {
    TestServer::new(setup_test_app().await).expect("Failed to start test server")
}

/// `Authorization: Bearer <token>` header pair for axum-test requests
pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        axum::http::header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("Invalid token header"),
    )
}

/// Register `username` through the API and return the new user's ID
pub async fn register_user(server: &TestServer, username: &str) -> i64 {
    let response = server
        .post("/api/v1/users")
        .json(&json!({
            "email": format!("{username}@example.com"),
            "username": username,
            "password": TEST_PASSWORD,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: ApiResponse<Value> = response.json();
    body.data["id"].as_i64().expect("User ID missing")
}

/// Obtain an access token for a user created with [`register_user`]
pub async fn login(server: &TestServer, username: &str) -> String {
    let response = server
        .post("/api/v1/token")
        .json(&json!({
            "email": format!("{username}@example.com"),
            "password": TEST_PASSWORD,
        }))
        .await;
    response.assert_status_ok();
    let body: ApiResponse<Value> = response.json();
    body.data["access"]
        .as_str()
        .expect("Access token missing")
        .to_string()
}

/// Register and log in; returns the user ID and an access token
pub async fn sign_up(server: &TestServer, username: &str) -> (i64, String) {
    let user_id = register_user(server, username).await;
    let token = login(server, username).await;
    (user_id, token)
}

/// Create a review as the token's owner and return its ID
pub async fn post_review(server: &TestServer, token: &str, movie_title: &str, rating: i32) -> i64 {
    let (name, value) = bearer(token);
    let response = server
        .post("/api/v1/reviews")
        .add_header(name, value)
        .json(&json!({
            "movie_title": movie_title,
            "content": format!("Notes on {movie_title}"),
            "rating": rating,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: ApiResponse<Value> = response.json();
    body.data["id"].as_i64().expect("Review ID missing")
}

/// Like a review as the token's owner and return the like ID
pub async fn post_like(server: &TestServer, token: &str, review_id: i64) -> i64 {
    let (name, value) = bearer(token);
    let response = server
        .post("/api/v1/likes")
        .add_header(name, value)
        .json(&json!({ "review": review_id }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: ApiResponse<Value> = response.json();
    body.data["id"].as_i64().expect("Like ID missing")
}
