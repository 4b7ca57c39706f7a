//! Business rules for the movie review service: authorization, validation,
//! identity, and the review/like/comment/user operations.
//!
//! Every operation takes the database connection and the acting [`Actor`]
//! explicitly; there is no global state.

pub mod authorization;
pub mod comments;
pub mod error;
pub mod identity;
pub mod likes;
pub mod pagination;
pub mod password;
pub mod reviews;
pub mod users;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use authorization::{authorize, Actor, Capability, Identity, Operation};
pub use error::{FieldErrors, Result, ServiceError};
pub use identity::{IdentityConfig, IdentityProvider, JwtIdentityProvider};
pub use pagination::{Page, PageRequest};
pub use password::{DefaultPasswordPolicy, PasswordPolicy, PasswordPolicyConfig};
