use crate::auth::CurrentActor;
use crate::error::ApiResult;
use crate::handlers::{ApiJson, ApiPath, ApiQuery};
use crate::schemas::{ApiResponse, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::like;
use serde::{Deserialize, Serialize};
use service::likes;
use service::validation::REQUIRED;
use service::{authorize, FieldErrors, Operation, ServiceError};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};

/// Request body for liking a review
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct LikeRequest {
    /// ID of the review to like
    pub review: Option<i32>,
}

/// Query parameters for listing likes
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct LikeListQuery {
    /// Only likes of this review
    pub review: Option<i32>,
}

/// Like response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LikeResponse {
    pub id: i32,
    /// ID of the user who liked the review
    pub user: i32,
    /// ID of the liked review
    pub review: i32,
    pub created_at: DateTime<Utc>,
}

impl From<like::Model> for LikeResponse {
    fn from(model: like::Model) -> Self {
        Self {
            id: model.id,
            user: model.user_id,
            review: model.review_id,
            created_at: model.created_at,
        }
    }
}

/// List likes, optionally for one review
#[utoipa::path(
    get,
    path = "/api/v1/likes",
    tag = "likes",
    params(LikeListQuery),
    responses(
        (status = 200, description = "Likes retrieved successfully", body = ApiResponse<Vec<LikeResponse>>),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_likes(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<LikeListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<LikeResponse>>>> {
    trace!("Entering get_likes function");
    let like_models = likes::list_likes(&state.db, &actor, query.review).await?;
    debug!("Returning {} likes", like_models.len());
    let data = like_models.into_iter().map(LikeResponse::from).collect();
    Ok(Json(ApiResponse::new(data, "Likes retrieved successfully")))
}

/// Like a review
#[utoipa::path(
    post,
    path = "/api/v1/likes",
    tag = "likes",
    request_body = LikeRequest,
    responses(
        (status = 201, description = "Like created successfully", body = ApiResponse<LikeResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 404, description = "Review not found", body = ErrorResponse),
        (status = 409, description = "Review already liked by the caller", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn create_like(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<LikeRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<LikeResponse>>)> {
    trace!("Entering create_like function");
    authorize(&actor, Operation::CreateLike, None)?;
    let review_id = request
        .review
        .ok_or_else(|| ServiceError::Validation(FieldErrors::single("review", REQUIRED)))?;

    let like_model = likes::create_like(&state.db, &actor, review_id).await?;
    info!("Like created successfully with ID: {}", like_model.id);
    let response = ApiResponse::new(LikeResponse::from(like_model), "Like created successfully");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get a specific like by ID
#[utoipa::path(
    get,
    path = "/api/v1/likes/{like_id}",
    tag = "likes",
    params(
        ("like_id" = i32, Path, description = "Like ID"),
    ),
    responses(
        (status = 200, description = "Like retrieved successfully", body = ApiResponse<LikeResponse>),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 404, description = "Like not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_like(
    ApiPath(like_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<ApiResponse<LikeResponse>>> {
    trace!("Entering get_like function for like_id: {}", like_id);
    let like_model = likes::get_like(&state.db, &actor, like_id).await?;
    Ok(Json(ApiResponse::new(
        LikeResponse::from(like_model),
        "Like retrieved successfully",
    )))
}

/// Remove one of the caller's likes
#[utoipa::path(
    delete,
    path = "/api/v1/likes/{like_id}",
    tag = "likes",
    params(
        ("like_id" = i32, Path, description = "Like ID"),
    ),
    responses(
        (status = 204, description = "Like deleted successfully"),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not the owner of the like", body = ErrorResponse),
        (status = 404, description = "Like not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn delete_like(
    ApiPath(like_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<StatusCode> {
    trace!("Entering delete_like function for like_id: {}", like_id);
    likes::delete_like(&state.db, &actor, like_id).await?;
    info!("Like with ID {} deleted", like_id);
    Ok(StatusCode::NO_CONTENT)
}
