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
use serde::{Deserialize, Serialize};
use service::comments::{self, CommentDetails, CommentInput};
use service::Actor;
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};

/// Request body for creating or editing a comment
///
/// `review` is required on creation and ignored on updates.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct CommentRequest {
    /// ID of the review being commented on
    pub review: Option<i32>,
    pub content: Option<String>,
}

impl From<CommentRequest> for CommentInput {
    fn from(request: CommentRequest) -> Self {
        Self {
            review: request.review,
            content: request.content,
        }
    }
}

/// Query parameters for listing comments
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct CommentListQuery {
    /// Only comments on this review
    pub review: Option<i32>,
}

/// Comment response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: i32,
    /// Commenter's username
    pub user: String,
    /// Commenter's user ID
    pub user_id: i32,
    /// ID of the review the comment belongs to
    pub review: i32,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<CommentDetails> for CommentResponse {
    fn from(details: CommentDetails) -> Self {
        let comment = details.comment;
        Self {
            id: comment.id,
            user: details.author,
            user_id: comment.user_id,
            review: comment.review_id,
            content: comment.content,
            created_at: comment.created_at,
            modified_at: comment.modified_at,
        }
    }
}

/// List comments, optionally for one review
#[utoipa::path(
    get,
    path = "/api/v1/comments",
    tag = "comments",
    params(CommentListQuery),
    responses(
        (status = 200, description = "Comments retrieved successfully", body = ApiResponse<Vec<CommentResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_comments(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<CommentListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<CommentResponse>>>> {
    trace!("Entering get_comments function");
    let details = comments::list_comments(&state.db, &actor, query.review).await?;
    debug!("Returning {} comments", details.len());
    let data = details.into_iter().map(CommentResponse::from).collect();
    Ok(Json(ApiResponse::new(data, "Comments retrieved successfully")))
}

/// Comment on a review
#[utoipa::path(
    post,
    path = "/api/v1/comments",
    tag = "comments",
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment created successfully", body = ApiResponse<CommentResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn create_comment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<CommentRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CommentResponse>>)> {
    trace!("Entering create_comment function");
    let details = comments::create_comment(&state.db, &actor, request.into()).await?;

    info!("Comment created successfully with ID: {}", details.comment.id);
    let response = ApiResponse::new(CommentResponse::from(details), "Comment created successfully");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get a specific comment by ID
#[utoipa::path(
    get,
    path = "/api/v1/comments/{comment_id}",
    tag = "comments",
    params(
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    responses(
        (status = 200, description = "Comment retrieved successfully", body = ApiResponse<CommentResponse>),
        (status = 404, description = "Comment not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_comment(
    ApiPath(comment_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<ApiResponse<CommentResponse>>> {
    trace!("Entering get_comment function for comment_id: {}", comment_id);
    let details = comments::get_comment(&state.db, &actor, comment_id).await?;
    Ok(Json(ApiResponse::new(
        CommentResponse::from(details),
        "Comment retrieved successfully",
    )))
}

async fn apply_comment_update(
    state: &AppState,
    actor: &Actor,
    comment_id: i32,
    request: CommentRequest,
    partial: bool,
) -> ApiResult<Json<ApiResponse<CommentResponse>>> {
    let details = comments::update_comment(&state.db, actor, comment_id, request.into(), partial).await?;
    info!("Comment with ID {} updated", comment_id);
    Ok(Json(ApiResponse::new(
        CommentResponse::from(details),
        "Comment updated successfully",
    )))
}

/// Replace the text of a comment owned by the caller
#[utoipa::path(
    put,
    path = "/api/v1/comments/{comment_id}",
    tag = "comments",
    params(
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Comment updated successfully", body = ApiResponse<CommentResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not the comment author", body = ErrorResponse),
        (status = 404, description = "Comment not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn update_comment(
    ApiPath(comment_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<CommentRequest>,
) -> ApiResult<Json<ApiResponse<CommentResponse>>> {
    trace!("Entering update_comment function for comment_id: {}", comment_id);
    apply_comment_update(&state, &actor, comment_id, request, false).await
}

/// Partially update a comment owned by the caller
#[utoipa::path(
    patch,
    path = "/api/v1/comments/{comment_id}",
    tag = "comments",
    params(
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Comment updated successfully", body = ApiResponse<CommentResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not the comment author", body = ErrorResponse),
        (status = 404, description = "Comment not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn patch_comment(
    ApiPath(comment_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<CommentRequest>,
) -> ApiResult<Json<ApiResponse<CommentResponse>>> {
    trace!("Entering patch_comment function for comment_id: {}", comment_id);
    apply_comment_update(&state, &actor, comment_id, request, true).await
}

/// Delete a comment owned by the caller
#[utoipa::path(
    delete,
    path = "/api/v1/comments/{comment_id}",
    tag = "comments",
    params(
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    responses(
        (status = 204, description = "Comment deleted successfully"),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not the comment author", body = ErrorResponse),
        (status = 404, description = "Comment not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn delete_comment(
    ApiPath(comment_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<StatusCode> {
    trace!("Entering delete_comment function for comment_id: {}", comment_id);
    comments::delete_comment(&state.db, &actor, comment_id).await?;
    info!("Comment with ID {} deleted", comment_id);
    Ok(StatusCode::NO_CONTENT)
}
