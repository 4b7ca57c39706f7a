use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use service::identity::Credentials;
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::handlers::ApiJson;
use crate::schemas::{ApiResponse, AppState};

/// Credentials exchanged for a token pair
#[derive(Deserialize, Serialize, ToSchema)]
pub struct TokenRequest {
    /// Account email address
    pub email: String,
    /// Account password
    pub password: String,
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RefreshRequest {
    /// Refresh token previously returned by `/api/v1/token`
    pub refresh: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TokenPairResponse {
    /// Short-lived bearer token for API requests
    pub access: String,
    /// Long-lived token used to obtain new access tokens
    pub refresh: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access: String,
}

/// Obtain an access/refresh token pair
#[utoipa::path(
    post,
    path = "/api/v1/token",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token pair issued", body = ApiResponse<TokenPairResponse>),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn obtain_token(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TokenRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<TokenPairResponse>>)> {
    trace!("Entering obtain_token function");
    let credentials = Credentials {
        email: request.email,
        password: request.password,
    };

    let identity = state.identity.authenticate(&state.db, &credentials).await?;
    debug!("Issuing token pair for user ID: {}", identity.id);
    let pair = state.identity.issue_token(&identity)?;

    info!("Token pair issued for user ID: {}", identity.id);
    let response = ApiResponse::new(
        TokenPairResponse {
            access: pair.access,
            refresh: pair.refresh,
        },
        "Token issued successfully",
    );
    Ok((StatusCode::OK, Json(response)))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/v1/token/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Access token issued", body = ApiResponse<AccessTokenResponse>),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Invalid or expired refresh token", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AccessTokenResponse>>)> {
    trace!("Entering refresh_token function");
    let token = state.identity.refresh_token(&state.db, &request.refresh).await?;

    let response = ApiResponse::new(
        AccessTokenResponse { access: token.access },
        "Token refreshed successfully",
    );
    Ok((StatusCode::OK, Json(response)))
}
