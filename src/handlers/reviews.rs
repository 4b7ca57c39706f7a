use crate::auth::CurrentActor;
use crate::error::ApiResult;
use crate::handlers::comments::CommentResponse;
use crate::handlers::{ApiJson, ApiPath, ValidQuery};
use crate::schemas::{ApiResponse, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service::comments;
use service::reviews::{self, LikedReview, ReviewDetails, ReviewQuery};
use service::validation::ReviewInput;
use service::{Actor, Page, PageRequest};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Query parameters for listing reviews
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ReviewListQuery {
    /// Case-insensitive substring of the movie title
    #[validate(length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub movie_title: Option<String>,
    /// Free-text search on the movie title
    #[validate(length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub search: Option<String>,
    /// Comma separated ordering: `created_at`, `-created_at`, `rating`, `-rating`
    #[serde(alias = "sort_by")]
    #[validate(length(max = 100, message = "Ensure this value has at most 100 characters."))]
    pub ordering: Option<String>,
    /// Page number (default: 1)
    pub page: Option<i64>,
    /// Page size (default: 5, max: 100; non-positive values use the default)
    pub page_size: Option<i64>,
}

impl From<ReviewListQuery> for ReviewQuery {
    fn from(query: ReviewListQuery) -> Self {
        Self {
            movie_title: query.movie_title,
            search: query.search,
            ordering: query.ordering,
            page: PageRequest::new(query.page, query.page_size),
        }
    }
}

/// Query parameters for the most-liked ranking
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct MostLikedQuery {
    /// Case-insensitive substring of the movie title (required)
    #[validate(length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub movie_title: Option<String>,
}

/// Request body for creating or updating a review
///
/// The author is always the authenticated caller; any client supplied
/// `user` field is ignored.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct ReviewRequest {
    pub movie_title: Option<String>,
    pub content: Option<String>,
    /// Rating from 1 to 5
    pub rating: Option<i32>,
}

impl From<ReviewRequest> for ReviewInput {
    fn from(request: ReviewRequest) -> Self {
        Self {
            movie_title: request.movie_title,
            content: request.content,
            rating: request.rating,
        }
    }
}

/// Review response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewResponse {
    pub id: i32,
    pub movie_title: String,
    pub content: String,
    pub rating: i32,
    /// Author's username
    pub user: String,
    /// Author's user ID
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
}

impl From<ReviewDetails> for ReviewResponse {
    fn from(details: ReviewDetails) -> Self {
        let review = details.review;
        Self {
            id: review.id,
            movie_title: review.movie_title,
            content: review.content,
            rating: review.rating,
            user: details.author,
            user_id: review.user_id,
            created_at: review.created_at,
        }
    }
}

/// One page of reviews
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewPage {
    /// Total number of matching reviews
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub results: Vec<ReviewResponse>,
}

impl From<Page<ReviewDetails>> for ReviewPage {
    fn from(page: Page<ReviewDetails>) -> Self {
        let page = page.map(ReviewResponse::from);
        Self {
            count: page.count,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
            results: page.results,
        }
    }
}

/// Review with its like count
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MostLikedReviewResponse {
    pub id: i32,
    pub movie_title: String,
    pub content: String,
    pub rating: i32,
    pub user: String,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    /// Number of likes the review received
    pub likes_count: i64,
}

impl From<LikedReview> for MostLikedReviewResponse {
    fn from(liked: LikedReview) -> Self {
        let review = liked.review;
        Self {
            id: review.id,
            movie_title: review.movie_title,
            content: review.content,
            rating: review.rating,
            user: liked.author,
            user_id: review.user_id,
            created_at: review.created_at,
            likes_count: liked.likes_count,
        }
    }
}

/// List reviews with filtering, ordering and pagination
#[utoipa::path(
    get,
    path = "/api/v1/reviews",
    tag = "reviews",
    params(ReviewListQuery),
    responses(
        (status = 200, description = "Reviews retrieved successfully", body = ApiResponse<ReviewPage>),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 404, description = "Invalid page", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_reviews(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidQuery(query): ValidQuery<ReviewListQuery>,
) -> ApiResult<Json<ApiResponse<ReviewPage>>> {
    trace!("Entering get_reviews function");
    let page = reviews::list_reviews(&state.db, &actor, &query.into()).await?;
    debug!("Returning page {} with {} of {} reviews", page.page, page.results.len(), page.count);
    Ok(Json(ApiResponse::new(
        ReviewPage::from(page),
        "Reviews retrieved successfully",
    )))
}

/// Top five reviews by like count for a movie title
#[utoipa::path(
    get,
    path = "/api/v1/reviews/most-liked",
    tag = "reviews",
    params(MostLikedQuery),
    responses(
        (status = 200, description = "Most liked reviews retrieved successfully", body = ApiResponse<Vec<MostLikedReviewResponse>>),
        (status = 400, description = "Movie title is required", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_most_liked_reviews(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidQuery(query): ValidQuery<MostLikedQuery>,
) -> ApiResult<Json<ApiResponse<Vec<MostLikedReviewResponse>>>> {
    trace!("Entering get_most_liked_reviews function");
    let ranked = reviews::most_liked(&state.db, &actor, query.movie_title.as_deref()).await?;
    let data = ranked.into_iter().map(MostLikedReviewResponse::from).collect();
    Ok(Json(ApiResponse::new(
        data,
        "Most liked reviews retrieved successfully",
    )))
}

/// Create a review authored by the caller
#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    tag = "reviews",
    request_body = ReviewRequest,
    responses(
        (status = 201, description = "Review created successfully", body = ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn create_review(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<ReviewRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ReviewResponse>>)> {
    trace!("Entering create_review function");
    let details = reviews::create_review(&state.db, &actor, request.into()).await?;

    info!("Review created successfully with ID: {}", details.review.id);
    let response = ApiResponse::new(ReviewResponse::from(details), "Review created successfully");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get a specific review by ID
#[utoipa::path(
    get,
    path = "/api/v1/reviews/{review_id}",
    tag = "reviews",
    params(
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    responses(
        (status = 200, description = "Review retrieved successfully", body = ApiResponse<ReviewResponse>),
        (status = 404, description = "Review not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_review(
    ApiPath(review_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<ApiResponse<ReviewResponse>>> {
    trace!("Entering get_review function for review_id: {}", review_id);
    let details = reviews::get_review(&state.db, &actor, review_id).await?;
    Ok(Json(ApiResponse::new(
        ReviewResponse::from(details),
        "Review retrieved successfully",
    )))
}

async fn apply_review_update(
    state: &AppState,
    actor: &Actor,
    review_id: i32,
    request: ReviewRequest,
    partial: bool,
) -> ApiResult<Json<ApiResponse<ReviewResponse>>> {
    let details = reviews::update_review(&state.db, actor, review_id, request.into(), partial).await?;
    info!("Review with ID {} updated", review_id);
    Ok(Json(ApiResponse::new(
        ReviewResponse::from(details),
        "Review updated successfully",
    )))
}

/// Replace a review owned by the caller
#[utoipa::path(
    put,
    path = "/api/v1/reviews/{review_id}",
    tag = "reviews",
    params(
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Review updated successfully", body = ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not the review author", body = ErrorResponse),
        (status = 404, description = "Review not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn update_review(
    ApiPath(review_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<ReviewRequest>,
) -> ApiResult<Json<ApiResponse<ReviewResponse>>> {
    trace!("Entering update_review function for review_id: {}", review_id);
    apply_review_update(&state, &actor, review_id, request, false).await
}

/// Partially update a review owned by the caller
#[utoipa::path(
    patch,
    path = "/api/v1/reviews/{review_id}",
    tag = "reviews",
    params(
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Review updated successfully", body = ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not the review author", body = ErrorResponse),
        (status = 404, description = "Review not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn patch_review(
    ApiPath(review_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<ReviewRequest>,
) -> ApiResult<Json<ApiResponse<ReviewResponse>>> {
    trace!("Entering patch_review function for review_id: {}", review_id);
    apply_review_update(&state, &actor, review_id, request, true).await
}

/// Delete a review owned by the caller, with its likes and comments
#[utoipa::path(
    delete,
    path = "/api/v1/reviews/{review_id}",
    tag = "reviews",
    params(
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    responses(
        (status = 204, description = "Review deleted successfully"),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not the review author", body = ErrorResponse),
        (status = 404, description = "Review not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn delete_review(
    ApiPath(review_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<StatusCode> {
    trace!("Entering delete_review function for review_id: {}", review_id);
    reviews::delete_review(&state.db, &actor, review_id).await?;
    info!("Review with ID {} deleted", review_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Comments left on one review, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/reviews/{review_id}/comments",
    tag = "reviews",
    params(
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    responses(
        (status = 200, description = "Comments retrieved successfully", body = ApiResponse<Vec<CommentResponse>>),
        (status = 404, description = "Review not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_review_comments(
    ApiPath(review_id): ApiPath<i32>,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<ApiResponse<Vec<CommentResponse>>>> {
    trace!("Entering get_review_comments function for review_id: {}", review_id);
    let details = comments::list_review_comments(&state.db, &actor, review_id).await?;
    let data = details.into_iter().map(CommentResponse::from).collect();
    Ok(Json(ApiResponse::new(data, "Comments retrieved successfully")))
}
