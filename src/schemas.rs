use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use service::users::AccountServices;
use service::{IdentityProvider, PasswordPolicy};
use utoipa::{OpenApi, ToSchema};

use crate::handlers::{
    comments::{CommentListQuery, CommentRequest, CommentResponse},
    likes::{LikeRequest, LikeResponse, LikeListQuery},
    reviews::{MostLikedQuery, MostLikedReviewResponse, ReviewListQuery, ReviewPage, ReviewRequest, ReviewResponse},
    tokens::{AccessTokenResponse, RefreshRequest, TokenPairResponse, TokenRequest},
    users::{UserRequest, UserResponse},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Credential checks, bearer tokens and password hashing
    pub identity: Arc<dyn IdentityProvider>,
    /// Password strength rules applied on registration and password changes
    pub password_policy: Arc<dyn PasswordPolicy>,
}

impl AppState {
    pub fn accounts(&self) -> AccountServices<'_> {
        AccountServices {
            identity: self.identity.as_ref(),
            password_policy: self.password_policy.as_ref(),
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
    /// Per-field validation messages, present for validation errors only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::tokens::obtain_token,
        crate::handlers::tokens::refresh_token,
        crate::handlers::users::create_user,
        crate::handlers::users::get_users,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::patch_user,
        crate::handlers::users::delete_user,
        crate::handlers::reviews::get_reviews,
        crate::handlers::reviews::create_review,
        crate::handlers::reviews::get_most_liked_reviews,
        crate::handlers::reviews::get_review,
        crate::handlers::reviews::update_review,
        crate::handlers::reviews::patch_review,
        crate::handlers::reviews::delete_review,
        crate::handlers::reviews::get_review_comments,
        crate::handlers::likes::get_likes,
        crate::handlers::likes::create_like,
        crate::handlers::likes::get_like,
        crate::handlers::likes::delete_like,
        crate::handlers::comments::get_comments,
        crate::handlers::comments::create_comment,
        crate::handlers::comments::get_comment,
        crate::handlers::comments::update_comment,
        crate::handlers::comments::patch_comment,
        crate::handlers::comments::delete_comment,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            TokenRequest,
            RefreshRequest,
            TokenPairResponse,
            AccessTokenResponse,
            UserRequest,
            UserResponse,
            ReviewRequest,
            ReviewResponse,
            ReviewPage,
            ReviewListQuery,
            MostLikedQuery,
            MostLikedReviewResponse,
            LikeRequest,
            LikeResponse,
            LikeListQuery,
            CommentRequest,
            CommentResponse,
            CommentListQuery,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Bearer token endpoints"),
        (name = "users", description = "User account endpoints"),
        (name = "reviews", description = "Movie review endpoints"),
        (name = "likes", description = "Review like endpoints"),
        (name = "comments", description = "Review comment endpoints"),
    ),
    info(
        title = "Movie Reviews API",
        description = "Movie reviews with likes and comments, token authentication and per-field validation",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected operations.
pub struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
