use crate::auth::CurrentActor;
use crate::error::ApiResult;
use crate::handlers::{ApiJson, ApiPath};
use crate::schemas::{ApiResponse, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::user;
use serde::{Deserialize, Serialize};
use service::users;
use service::validation::UserInput;
use std::fmt;
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;

/// Request body for registering or updating a user
///
/// On registration `email`, `username` and `password` are required. `PUT`
/// requires `email` and `username`; `PATCH` accepts any subset.
#[derive(Default, Deserialize, Serialize, ToSchema)]
pub struct UserRequest {
    /// Login email address (must be unique)
    pub email: Option<String>,
    /// Username (must be unique)
    pub username: Option<String>,
    /// New password, checked against the password policy
    pub password: Option<String>,
}

impl fmt::Debug for UserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRequest")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}

impl From<UserRequest> for UserInput {
    fn from(request: UserRequest) -> Self {
        Self {
            email: request.email,
            username: request.username,
            password: request.password,
        }
    }
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            username: model.username,
            date_joined: model.date_joined,
            last_login: model.last_login,
        }
    }
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = UserRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_user(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<UserRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    trace!("Entering create_user function");
    let user_model = users::register_user(&state.db, state.accounts(), &actor, request.into()).await?;

    info!("User created successfully with ID: {}", user_model.id);
    let response = ApiResponse::new(UserResponse::from(user_model), "User created successfully");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get all users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_users(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<ApiResponse<Vec<UserResponse>>>> {
    trace!("Entering get_users function");
    let user_models = users::list_users(&state.db, &actor).await?;
    debug!("Returning {} users", user_models.len());

    let data = user_models.into_iter().map(UserResponse::from).collect();
    Ok(Json(ApiResponse::new(data, "Users retrieved successfully")))
}

/// Get a specific user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_user(
    ApiPath(user_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    trace!("Entering get_user function for user_id: {}", user_id);
    let user_model = users::get_user(&state.db, &actor, user_id).await?;
    Ok(Json(ApiResponse::new(
        UserResponse::from(user_model),
        "User retrieved successfully",
    )))
}

async fn apply_user_update(
    state: &AppState,
    actor: &service::Actor,
    user_id: i32,
    request: UserRequest,
    partial: bool,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    let user_model =
        users::update_user(&state.db, state.accounts(), actor, user_id, request.into(), partial).await?;
    info!("User with ID {} updated", user_model.id);
    Ok(Json(ApiResponse::new(
        UserResponse::from(user_model),
        "User updated successfully",
    )))
}

/// Replace the caller's own account details
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = UserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not the account owner", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn update_user(
    ApiPath(user_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<UserRequest>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    trace!("Entering update_user function for user_id: {}", user_id);
    apply_user_update(&state, &actor, user_id, request, false).await
}

/// Partially update the caller's own account
#[utoipa::path(
    patch,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = UserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not the account owner", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn patch_user(
    ApiPath(user_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<UserRequest>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    trace!("Entering patch_user function for user_id: {}", user_id);
    apply_user_update(&state, &actor, user_id, request, true).await
}

/// Delete the caller's own account
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 204, description = "User deleted successfully"),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not the account owner", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn delete_user(
    ApiPath(user_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<StatusCode> {
    trace!("Entering delete_user function for user_id: {}", user_id);
    users::delete_user(&state.db, &actor, user_id).await?;
    info!("User with ID {} deleted", user_id);
    Ok(StatusCode::NO_CONTENT)
}
