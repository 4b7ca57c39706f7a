use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;
use axum_valid::{HasValidate, Valid};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

pub mod comments;
pub mod health;
pub mod likes;
pub mod reviews;
pub mod tokens;
pub mod users;

/// JSON body extractor whose rejections use the [`ErrorResponse`](crate::schemas::ErrorResponse) format.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor with [`ApiError`] rejections.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Path parameter extractor with [`ApiError`] rejections.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

impl<T> HasValidate for ApiQuery<T> {
    type Validate = T;

    fn get_validate(&self) -> &T {
        &self.0
    }
}

/// Query string checked with `validator`; failures become per-field validation errors.
#[derive(Debug)]
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Valid(ApiQuery(value)) = Valid::<ApiQuery<T>>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}
