use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use service::{Actor, ServiceError};
use tracing::{debug, trace};

use crate::error::ApiError;
use crate::schemas::AppState;

/// The actor behind the current request.
///
/// Requests without an `Authorization` header, or with a non-bearer scheme,
/// are anonymous. A bearer token that does not resolve to an active user is
/// rejected with 401.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

/// Extract Bearer token from Authorization header
fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| {
        ServiceError::AuthenticationFailed("Authorization header must contain only visible ASCII characters.".to_string())
    })?;

    let mut pieces = value.split_whitespace();
    match (pieces.next(), pieces.next(), pieces.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(Some(token)),
        (Some(scheme), None, _) if scheme.eq_ignore_ascii_case("bearer") => Err(ServiceError::AuthenticationFailed(
            "Invalid Authorization header. No credentials provided.".to_string(),
        )
        .into()),
        (Some(scheme), Some(_), Some(_)) if scheme.eq_ignore_ascii_case("bearer") => Err(
            ServiceError::AuthenticationFailed("Authorization header must contain two space-delimited values.".to_string())
                .into(),
        ),
        _ => {
            trace!("Ignoring non-bearer Authorization header");
            Ok(None)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts)? else {
            return Ok(CurrentActor(Actor::Anonymous));
        };

        let identity = state.identity.resolve(&state.db, token).await?;
        debug!(user_id = identity.id, "Resolved bearer token");
        Ok(CurrentActor(Actor::User(identity)))
    }
}
