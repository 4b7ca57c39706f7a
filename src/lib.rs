//! HTTP layer of the movie reviews service.
//!
//! Handlers translate requests into calls on the `service` crate and map
//! [`service::ServiceError`] onto status codes; see [`error::ApiError`].

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod schemas;

#[cfg(test)]
pub mod test_utils;
