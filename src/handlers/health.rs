use axum::{extract::State, http::StatusCode, response::{Html, Json}};
use tracing::{instrument, warn};
use crate::schemas::{AppState, HealthResponse};

const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Movie Reviews API</title></head>
  <body>
    <h1>Welcome to the Movie Reviews API</h1>
    <p>Browse the endpoints in the <a href="/swagger-ui">API documentation</a>.</p>
  </body>
</html>
"#;

/// Welcome page
#[instrument]
pub async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 500, description = "Service is unhealthy", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    // Test database connection
    let db_status = match state.db.ping().await {
        Ok(_) => "connected".to_string(),
        Err(e) => {
            warn!("Database ping failed: {}", e);
            "disconnected".to_string()
        }
    };

    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
    };

    Ok(Json(response))
}
