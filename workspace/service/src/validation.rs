//! Field validation for reviews, comments and user accounts.
//!
//! Presence checks are done by hand so that a missing field and a blank field
//! get different messages; range and format constraints are declared with
//! `validator` on the intermediate `*Fields` structs. Every problem found in
//! one payload ends up in the same [`FieldErrors`].

use validator::{Validate, ValidationErrors};

use crate::error::{FieldErrors, Result, ServiceError};
use crate::password::{PasswordPolicy, UserAttributes};
use model::entities::{review, user};

pub const REQUIRED: &str = "This field is required.";
pub const RATING_RANGE: &str = "Rating must be between 1 and 5.";
pub const MOVIE_TITLE_REQUIRED: &str = "Movie title is required.";
pub const REVIEW_CONTENT_REQUIRED: &str = "Review content is required.";
pub const BLANK: &str = "This field may not be blank.";

const USERNAME_INVALID: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut collected = FieldErrors::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", error.code));
                collected.add(&field, message);
            }
        }
        collected
    }
}

fn run_validator(value: &impl Validate, errors: &mut FieldErrors) {
    if let Err(validation_errors) = value.validate() {
        errors.merge(validation_errors.into());
    }
}

/// Resolve a text field: the supplied value wins, the fallback fills gaps.
/// Missing values and blank values are reported with distinct messages.
fn required_text(
    field: &str,
    supplied: Option<&str>,
    fallback: Option<&str>,
    blank_message: &str,
    errors: &mut FieldErrors,
) -> Option<String> {
    match supplied.or(fallback) {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(value) => {
            let value = value.trim();
            if value.is_empty() {
                errors.add(field, blank_message);
                None
            } else {
                Some(value.to_string())
            }
        }
    }
}

/// Review payload as received; any field may be missing.
#[derive(Debug, Clone, Default)]
pub struct ReviewInput {
    pub movie_title: Option<String>,
    pub content: Option<String>,
    pub rating: Option<i32>,
}

#[derive(Debug, Validate)]
struct ReviewFields {
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    movie_title: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5."))]
    rating: Option<i32>,
}

/// A review that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidReview {
    pub movie_title: String,
    pub content: String,
    pub rating: i32,
}

/// Validate a review payload.
///
/// With `existing` set (partial update) absent fields are taken from the
/// stored review, so the merged result is what gets checked.
pub fn validate_review(input: &ReviewInput, existing: Option<&review::Model>) -> Result<ValidReview> {
    let mut errors = FieldErrors::new();

    let movie_title = required_text(
        "movie_title",
        input.movie_title.as_deref(),
        existing.map(|review| review.movie_title.as_str()),
        MOVIE_TITLE_REQUIRED,
        &mut errors,
    );
    let content = required_text(
        "content",
        input.content.as_deref(),
        existing.map(|review| review.content.as_str()),
        REVIEW_CONTENT_REQUIRED,
        &mut errors,
    );
    let rating = input.rating.or(existing.map(|review| review.rating));
    if rating.is_none() {
        errors.add("rating", REQUIRED);
    }

    run_validator(
        &ReviewFields {
            movie_title: movie_title.clone(),
            rating,
        },
        &mut errors,
    );

    let (Some(movie_title), Some(content), Some(rating)) = (movie_title, content, rating) else {
        return Err(ServiceError::Validation(errors));
    };
    errors.into_result()?;
    Ok(ValidReview {
        movie_title,
        content,
        rating,
    })
}

/// Validate comment text, falling back to `existing` for partial updates.
pub fn validate_comment_content(content: Option<&str>, existing: Option<&str>) -> Result<String> {
    let mut errors = FieldErrors::new();
    let content = required_text("content", content, existing, BLANK, &mut errors);
    errors.into_result()?;
    Ok(content.unwrap_or_default())
}

/// User account payload as received; any field may be missing.
#[derive(Debug, Clone, Default)]
pub struct UserInput {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Validate)]
struct UserFields {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    email: Option<String>,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    username: Option<String>,
}

/// A user payload that passed validation. `password` is still the raw value
/// and must go through the identity collaborator before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidUser {
    pub email: String,
    pub username: String,
    pub password: Option<String>,
}

/// Lower-case the domain part of an email address; the local part is kept as given.
pub fn normalize_email(email: &str) -> String {
    match email.trim().rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.trim().to_string(),
    }
}

fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

/// Validate a user payload.
///
/// `existing` fills in absent fields (partial updates). `password_required`
/// is set for registration only; on updates the password is checked when
/// one is supplied.
pub fn validate_user(
    input: &UserInput,
    existing: Option<&user::Model>,
    password_required: bool,
    policy: &dyn PasswordPolicy,
) -> Result<ValidUser> {
    let mut errors = FieldErrors::new();

    let email = required_text(
        "email",
        input.email.as_deref(),
        existing.map(|user| user.email.as_str()),
        BLANK,
        &mut errors,
    )
    .map(|email| normalize_email(&email));
    let username = required_text(
        "username",
        input.username.as_deref(),
        existing.map(|user| user.username.as_str()),
        BLANK,
        &mut errors,
    );

    if let Some(username) = &username {
        if !is_valid_username(username) {
            errors.add("username", USERNAME_INVALID);
        }
    }

    run_validator(
        &UserFields {
            email: email.clone(),
            username: username.clone(),
        },
        &mut errors,
    );

    let password = match (&input.password, password_required) {
        (None, true) => {
            errors.add("password", REQUIRED);
            None
        }
        (None, false) => None,
        (Some(password), _) if password.is_empty() => {
            errors.add("password", BLANK);
            None
        }
        (Some(password), _) => {
            let attributes = UserAttributes {
                username: username.as_deref(),
                email: email.as_deref(),
            };
            for message in policy.check(password, attributes) {
                errors.add("password", message);
            }
            Some(password.clone())
        }
    };

    let (Some(email), Some(username)) = (email, username) else {
        return Err(ServiceError::Validation(errors));
    };
    errors.into_result()?;
    Ok(ValidUser {
        email,
        username,
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::DefaultPasswordPolicy;

    fn field_errors(result: Result<impl std::fmt::Debug>) -> FieldErrors {
        match result {
            Err(ServiceError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn stored_review() -> review::Model {
        review::Model {
            id: 1,
            movie_title: "Modern Family".to_string(),
            content: "One of the best comedy series of all time!".to_string(),
            rating: 4,
            user_id: 1,
            created_at: chrono::Utc::now(),
        }
    }

    fn input(movie_title: &str, content: &str, rating: i32) -> ReviewInput {
        ReviewInput {
            movie_title: Some(movie_title.to_string()),
            content: Some(content.to_string()),
            rating: Some(rating),
        }
    }

    #[test]
    fn test_valid_review() {
        let review = validate_review(&input("  Iron Man ", "A very exciting movie!", 5), None).unwrap();
        assert_eq!(review.movie_title, "Iron Man");
        assert_eq!(review.rating, 5);
    }

    #[test]
    fn test_rating_outside_range() {
        for rating in [i32::MIN, -1, 0, 6, 10, i32::MAX] {
            let errors = field_errors(validate_review(&input("Iron Man", "Fine", rating), None));
            assert_eq!(errors.get("rating").unwrap(), [RATING_RANGE], "rating {rating}");
        }
    }

    #[test]
    fn test_blank_fields_have_distinct_messages() {
        let errors = field_errors(validate_review(&input("", "   ", 3), None));
        assert_eq!(errors.get("movie_title").unwrap(), [MOVIE_TITLE_REQUIRED]);
        assert_eq!(errors.get("content").unwrap(), [REVIEW_CONTENT_REQUIRED]);
        assert!(!errors.contains("rating"));
    }

    #[test]
    fn test_all_errors_are_aggregated() {
        let errors = field_errors(validate_review(&input("", "", 9), None));
        assert_eq!(errors.as_map().len(), 3);
    }

    #[test]
    fn test_missing_fields_on_create() {
        let errors = field_errors(validate_review(&ReviewInput::default(), None));
        assert_eq!(errors.get("movie_title").unwrap(), [REQUIRED]);
        assert_eq!(errors.get("content").unwrap(), [REQUIRED]);
        assert_eq!(errors.get("rating").unwrap(), [REQUIRED]);
    }

    #[test]
    fn test_too_long_title() {
        let errors = field_errors(validate_review(&input(&"x".repeat(256), "Fine", 3), None));
        assert!(errors.contains("movie_title"));
    }

    #[test]
    fn test_partial_update_merges_with_stored_review() {
        let existing = stored_review();
        let patch = ReviewInput {
            rating: Some(2),
            ..Default::default()
        };
        let merged = validate_review(&patch, Some(&existing)).unwrap();
        assert_eq!(merged.movie_title, "Modern Family");
        assert_eq!(merged.rating, 2);

        let bad_patch = ReviewInput {
            rating: Some(0),
            ..Default::default()
        };
        let errors = field_errors(validate_review(&bad_patch, Some(&existing)));
        assert_eq!(errors.get("rating").unwrap(), [RATING_RANGE]);
    }

    #[test]
    fn test_comment_content() {
        assert_eq!(validate_comment_content(Some(" Nice "), None).unwrap(), "Nice");
        let errors = field_errors(validate_comment_content(Some(""), None));
        assert_eq!(errors.get("content").unwrap(), [BLANK]);
        let errors = field_errors(validate_comment_content(None, None));
        assert_eq!(errors.get("content").unwrap(), [REQUIRED]);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Messi@GMAIL.com "), "Messi@gmail.com");
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn test_user_registration() {
        let policy = DefaultPasswordPolicy::default();
        let user = validate_user(
            &UserInput {
                email: Some("messi@gmail.com".to_string()),
                username: Some("m10".to_string()),
                password: Some("Barcelona-Forever-10".to_string()),
            },
            None,
            true,
            &policy,
        )
        .unwrap();
        assert_eq!(user.username, "m10");
        assert!(user.password.is_some());
    }

    #[test]
    fn test_user_registration_errors() {
        let policy = DefaultPasswordPolicy::default();
        let errors = field_errors(validate_user(
            &UserInput {
                email: Some("not-an-email".to_string()),
                username: Some("bad name!".to_string()),
                password: Some("123".to_string()),
            },
            None,
            true,
            &policy,
        ));
        assert_eq!(errors.get("email").unwrap(), ["Enter a valid email address."]);
        assert_eq!(errors.get("username").unwrap(), [USERNAME_INVALID]);
        let password = errors.get("password").unwrap();
        assert!(password.iter().any(|m| m.contains("too short")));
        assert!(password.iter().any(|m| m == "This password is entirely numeric."));
    }

    #[test]
    fn test_password_required_only_on_registration() {
        let policy = DefaultPasswordPolicy::default();
        let errors = field_errors(validate_user(
            &UserInput {
                email: Some("messi@gmail.com".to_string()),
                username: Some("m10".to_string()),
                password: None,
            },
            None,
            true,
            &policy,
        ));
        assert_eq!(errors.get("password").unwrap(), [REQUIRED]);

        let existing = user::Model {
            id: 1,
            email: "messi@gmail.com".to_string(),
            username: "m10".to_string(),
            password_hash: "hash".to_string(),
            is_staff: false,
            is_superuser: false,
            is_active: true,
            date_joined: chrono::Utc::now(),
            last_login: None,
        };
        let update = validate_user(
            &UserInput {
                username: Some("leo".to_string()),
                ..Default::default()
            },
            Some(&existing),
            false,
            &policy,
        )
        .unwrap();
        assert_eq!(update.username, "leo");
        assert_eq!(update.email, "messi@gmail.com");
        assert_eq!(update.password, None);
    }
}
