use crate::handlers::{
    comments::{create_comment, delete_comment, get_comment, get_comments, patch_comment, update_comment},
    health::{health_check, home},
    likes::{create_like, delete_like, get_like, get_likes},
    reviews::{
        create_review, delete_review, get_most_liked_reviews, get_review, get_review_comments, get_reviews,
        patch_review, update_review,
    },
    tokens::{obtain_token, refresh_token},
    users::{create_user, delete_user, get_user, get_users, patch_user, update_user},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Routes under `/api/v1`
fn api_routes() -> Router<AppState> {
    Router::new()
        // Token routes
        .route("/api/v1/token", post(obtain_token))
        .route("/api/v1/token/refresh", post(refresh_token))
        // User routes
        .route("/api/v1/users", post(create_user).get(get_users))
        .route(
            "/api/v1/users/:user_id",
            get(get_user).put(update_user).patch(patch_user).delete(delete_user),
        )
        // Review routes
        .route("/api/v1/reviews", get(get_reviews).post(create_review))
        .route("/api/v1/reviews/most-liked", get(get_most_liked_reviews))
        .route(
            "/api/v1/reviews/:review_id",
            get(get_review).put(update_review).patch(patch_review).delete(delete_review),
        )
        .route("/api/v1/reviews/:review_id/comments", get(get_review_comments))
        // Like routes
        .route("/api/v1/likes", get(get_likes).post(create_like))
        .route("/api/v1/likes/:like_id", get(get_like).delete(delete_like))
        // Comment routes
        .route("/api/v1/comments", get(get_comments).post(create_comment))
        .route(
            "/api/v1/comments/:comment_id",
            get(get_comment).put(update_comment).patch(patch_comment).delete(delete_comment),
        )
}

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .merge(api_routes())
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // The Prometheus recorder is process-global; tests build many routers
    #[cfg(not(test))]
    let router = {
        let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();
        router
            .route("/metrics", get(move || async move { metric_handle.render() }))
            .layer(prometheus_layer)
    };

    router
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
