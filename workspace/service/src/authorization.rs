//! Per-operation authorization.
//!
//! Every service entry point names its [`Operation`]; the operation maps to
//! an ordered list of [`Capability`] checks which [`authorize`] evaluates
//! against the acting identity and, for owner-restricted operations, the
//! owner stored on the target resource.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, ServiceError};

/// An authenticated user as resolved by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<model::entities::user::Model> for Identity {
    fn from(user: model::entities::user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
        }
    }
}

/// Whoever performs the current request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Actor {
    #[default]
    Anonymous,
    User(Identity),
}

impl Actor {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Actor::Anonymous => None,
            Actor::User(identity) => Some(identity),
        }
    }

    pub fn id(&self) -> Option<i32> {
        self.identity().map(|identity| identity.id)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::User(_))
    }

    /// The identity of an authenticated actor, `NotAuthenticated` otherwise.
    pub fn require_identity(&self) -> Result<&Identity> {
        self.identity().ok_or_else(ServiceError::not_authenticated)
    }
}

/// A single check an operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// The actor must be signed in.
    Authenticated,
    /// The actor must own the target resource.
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RegisterUser,
    ListUsers,
    RetrieveUser,
    UpdateUser,
    DeleteUser,
    ListReviews,
    RetrieveReview,
    MostLikedReviews,
    CreateReview,
    UpdateReview,
    DeleteReview,
    ListLikes,
    RetrieveLike,
    CreateLike,
    DeleteLike,
    ListComments,
    RetrieveComment,
    CreateComment,
    UpdateComment,
    DeleteComment,
}

const PUBLIC: &[Capability] = &[];
const AUTHENTICATED: &[Capability] = &[Capability::Authenticated];
const OWNER: &[Capability] = &[Capability::Authenticated, Capability::Owner];

impl Operation {
    /// Checks evaluated, in order, before the operation may run.
    pub fn required_capabilities(self) -> &'static [Capability] {
        use Operation::*;
        match self {
            RegisterUser | ListReviews | RetrieveReview | MostLikedReviews | ListComments
            | RetrieveComment => PUBLIC,
            ListUsers | RetrieveUser | CreateReview | ListLikes | RetrieveLike | CreateLike
            | CreateComment => AUTHENTICATED,
            UpdateUser | DeleteUser | UpdateReview | DeleteReview | DeleteLike | UpdateComment
            | DeleteComment => OWNER,
        }
    }
}

/// Decide whether `actor` may perform `operation`.
///
/// `owner` is the owner id stored on the target resource and is only consulted
/// by operations that require [`Capability::Owner`]; passing `None` to such an
/// operation denies it.
pub fn authorize(actor: &Actor, operation: Operation, owner: Option<i32>) -> Result<()> {
    for capability in operation.required_capabilities() {
        match capability {
            Capability::Authenticated => {
                if !actor.is_authenticated() {
                    debug!(?operation, "Rejecting anonymous actor");
                    return Err(ServiceError::not_authenticated());
                }
            }
            Capability::Owner => {
                let actor_id = actor.id();
                if actor_id.is_none() || actor_id != owner {
                    warn!(?operation, ?actor_id, ?owner, "Actor does not own the resource");
                    return Err(ServiceError::permission_denied());
                }
            }
        }
    }
    Ok(())
}
