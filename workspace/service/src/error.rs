use std::collections::BTreeMap;
use std::fmt;

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Validation messages keyed by field name.
///
/// Errors that do not belong to a single field are stored under
/// [`FieldErrors::NON_FIELD`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub const NON_FIELD: &'static str = "non_field_errors";

    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field shortcut.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }

    /// `Ok(())` when nothing was collected, the aggregated validation error otherwise.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Error types for the service layer
#[derive(Error, Debug)]
pub enum ServiceError {
    /// One or more fields carry invalid values
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    /// A required request parameter is missing or malformed
    #[error("{0}")]
    BadRequest(String),

    /// The operation requires an authenticated actor
    #[error("{0}")]
    NotAuthenticated(String),

    /// Credentials or tokens were rejected
    #[error("{0}")]
    AuthenticationFailed(String),

    /// The actor is known but may not perform the operation
    #[error("{0}")]
    PermissionDenied(String),

    /// The referenced resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness invariant would be violated
    #[error("{0}")]
    Conflict(String),

    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Failures of the identity collaborator (hashing, token signing)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self {
        ServiceError::NotFound(format!("No {} matches the given query.", entity))
    }

    pub fn permission_denied() -> Self {
        ServiceError::PermissionDenied("You do not have permission to perform this action.".to_string())
    }

    pub fn not_authenticated() -> Self {
        ServiceError::NotAuthenticated("Authentication credentials were not provided.".to_string())
    }
}

/// Returns true when the database rejected a write because of a unique index.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Type alias for Result with ServiceError
pub type Result<T> = std::result::Result<T, ServiceError>;
