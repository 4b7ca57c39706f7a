use model::entities::{comment, review, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, LoaderTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument};

use crate::authorization::{authorize, Actor, Operation};
use crate::error::{FieldErrors, Result, ServiceError};
use crate::validation::{validate_comment_content, REQUIRED};

/// Comment payload as received.
#[derive(Debug, Clone, Default)]
pub struct CommentInput {
    pub review: Option<i32>,
    pub content: Option<String>,
}

/// A comment together with its author's username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDetails {
    pub comment: comment::Model,
    pub author: String,
}

async fn attach_authors<C: ConnectionTrait>(db: &C, comments: Vec<comment::Model>) -> Result<Vec<CommentDetails>> {
    if comments.is_empty() {
        return Ok(Vec::new());
    }
    let authors = comments.load_one(user::Entity, db).await?;
    Ok(comments
        .into_iter()
        .zip(authors)
        .map(|(comment, author)| CommentDetails {
            comment,
            author: author.map(|user| user.username).unwrap_or_default(),
        })
        .collect())
}

async fn find_comment<C: ConnectionTrait>(db: &C, comment_id: i32) -> Result<comment::Model> {
    comment::Entity::find_by_id(comment_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Comment"))
}

/// Check the `review` reference and the content together so both problems
/// are reported in one error.
async fn validate_new_comment<C: ConnectionTrait>(db: &C, input: &CommentInput) -> Result<(i32, String)> {
    let mut errors = FieldErrors::new();

    let review_id = match input.review {
        None => {
            errors.add("review", REQUIRED);
            None
        }
        Some(id) => match review::Entity::find_by_id(id).one(db).await? {
            Some(review) => Some(review.id),
            None => {
                errors.add("review", format!("Invalid pk \"{}\" - object does not exist.", id));
                None
            }
        },
    };

    let content = match validate_comment_content(input.content.as_deref(), None) {
        Ok(content) => Some(content),
        Err(ServiceError::Validation(content_errors)) => {
            errors.merge(content_errors);
            None
        }
        Err(other) => return Err(other),
    };

    let (Some(review_id), Some(content)) = (review_id, content) else {
        return Err(ServiceError::Validation(errors));
    };
    Ok((review_id, content))
}

#[instrument(skip(db, input))]
pub async fn create_comment(db: &DatabaseConnection, actor: &Actor, input: CommentInput) -> Result<CommentDetails> {
    authorize(actor, Operation::CreateComment, None)?;
    let identity = actor.require_identity()?;

    let txn = db.begin().await?;
    let (review_id, content) = validate_new_comment(&txn, &input).await?;
    let created = comment::ActiveModel {
        user_id: Set(identity.id),
        review_id: Set(review_id),
        content: Set(content),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!("Comment created with ID: {} on review {}", created.id, review_id);
    Ok(CommentDetails {
        comment: created,
        author: identity.username.clone(),
    })
}

#[instrument(skip(db))]
pub async fn get_comment(db: &DatabaseConnection, actor: &Actor, comment_id: i32) -> Result<CommentDetails> {
    authorize(actor, Operation::RetrieveComment, None)?;
    let comment = find_comment(db, comment_id).await?;
    let mut details = attach_authors(db, vec![comment]).await?;
    details.pop().ok_or_else(|| ServiceError::not_found("Comment"))
}

/// Comments oldest first, optionally restricted to one review.
#[instrument(skip(db))]
pub async fn list_comments(
    db: &DatabaseConnection,
    actor: &Actor,
    review_id: Option<i32>,
) -> Result<Vec<CommentDetails>> {
    authorize(actor, Operation::ListComments, None)?;
    let mut select = comment::Entity::find();
    if let Some(review_id) = review_id {
        select = select.filter(comment::Column::ReviewId.eq(review_id));
    }
    let comments = select
        .order_by_asc(comment::Column::CreatedAt)
        .order_by_asc(comment::Column::Id)
        .all(db)
        .await?;
    debug!("Retrieved {} comments", comments.len());
    attach_authors(db, comments).await
}

/// Comments of one review; the review itself must exist.
#[instrument(skip(db))]
pub async fn list_review_comments(
    db: &DatabaseConnection,
    actor: &Actor,
    review_id: i32,
) -> Result<Vec<CommentDetails>> {
    review::Entity::find_by_id(review_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Review"))?;
    list_comments(db, actor, Some(review_id)).await
}

/// Edit a comment's text. The review a comment belongs to never changes.
#[instrument(skip(db, input))]
pub async fn update_comment(
    db: &DatabaseConnection,
    actor: &Actor,
    comment_id: i32,
    input: CommentInput,
    partial: bool,
) -> Result<CommentDetails> {
    let identity = actor.require_identity()?;
    let txn = db.begin().await?;
    let existing = find_comment(&txn, comment_id).await?;
    authorize(actor, Operation::UpdateComment, Some(existing.user_id))?;

    let fallback = partial.then_some(existing.content.as_str());
    let content = validate_comment_content(input.content.as_deref(), fallback)?;
    if let Some(review_id) = input.review {
        if review_id != existing.review_id {
            debug!("Ignoring attempt to move comment {} to review {}", comment_id, review_id);
        }
    }

    let mut active: comment::ActiveModel = existing.into();
    active.content = Set(content);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    info!("Comment with ID {} updated successfully", comment_id);
    Ok(CommentDetails {
        comment: updated,
        author: identity.username.clone(),
    })
}

#[instrument(skip(db))]
pub async fn delete_comment(db: &DatabaseConnection, actor: &Actor, comment_id: i32) -> Result<()> {
    actor.require_identity()?;
    let txn = db.begin().await?;
    let existing = find_comment(&txn, comment_id).await?;
    authorize(actor, Operation::DeleteComment, Some(existing.user_id))?;

    comment::Entity::delete_by_id(existing.id).exec(&txn).await?;
    txn.commit().await?;
    info!("Comment with ID {} deleted successfully", comment_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{actor_for, insert_review, setup_test_db, TestServices};

    fn input(review: i32, content: &str) -> CommentInput {
        CommentInput {
            review: Some(review),
            content: Some(content.to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_comment() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "messi@gmail.com", "m10").await;
        let review = insert_review(&db, &author, "Modern Family", 4).await;

        let created = create_comment(&db, &actor_for(&author), input(review.id, " Nice! "))
            .await
            .unwrap();
        assert_eq!(created.comment.content, "Nice!");
        assert_eq!(created.comment.review_id, review.id);
        assert_eq!(created.author, "m10");
    }

    #[tokio::test]
    async fn test_comment_on_missing_review() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "messi@gmail.com", "m10").await;

        let result = create_comment(&db, &actor_for(&author), input(77, "")).await;
        match result {
            Err(ServiceError::Validation(errors)) => {
                assert_eq!(errors.get("review").unwrap(), ["Invalid pk \"77\" - object does not exist."]);
                assert!(errors.contains("content"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_advances_modified_at() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "messi@gmail.com", "m10").await;
        let review = insert_review(&db, &author, "Modern Family", 4).await;
        let created = create_comment(&db, &actor_for(&author), input(review.id, "First take"))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let patch = CommentInput {
            content: Some("Second take".to_string()),
            ..Default::default()
        };
        let updated = update_comment(&db, &actor_for(&author), created.comment.id, patch, true)
            .await
            .unwrap();

        assert_eq!(updated.comment.content, "Second take");
        assert_eq!(updated.comment.created_at, created.comment.created_at);
        assert!(updated.comment.modified_at > created.comment.modified_at);
    }

    #[tokio::test]
    async fn test_foreign_comment_writes_are_denied() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "messi@gmail.com", "m10").await;
        let other = services.create_user(&db, "neymar@gmail.com", "njr").await;
        let review = insert_review(&db, &author, "Modern Family", 4).await;
        let created = create_comment(&db, &actor_for(&author), input(review.id, "Mine"))
            .await
            .unwrap();

        let result = update_comment(&db, &actor_for(&other), created.comment.id, input(review.id, "Yours"), false).await;
        assert!(matches!(result, Err(ServiceError::PermissionDenied(_))));
        let result = delete_comment(&db, &actor_for(&other), created.comment.id).await;
        assert!(matches!(result, Err(ServiceError::PermissionDenied(_))));

        delete_comment(&db, &actor_for(&author), created.comment.id).await.unwrap();
        let result = get_comment(&db, &Actor::Anonymous, created.comment.id).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_review_comments() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "messi@gmail.com", "m10").await;
        let first = insert_review(&db, &author, "Iron Man", 5).await;
        let second = insert_review(&db, &author, "Iron Man 2", 3).await;
        let actor = actor_for(&author);
        create_comment(&db, &actor, input(first.id, "one")).await.unwrap();
        create_comment(&db, &actor, input(first.id, "two")).await.unwrap();
        create_comment(&db, &actor, input(second.id, "three")).await.unwrap();

        let comments = list_review_comments(&db, &Actor::Anonymous, first.id).await.unwrap();
        let contents: Vec<_> = comments.iter().map(|c| c.comment.content.as_str()).collect();
        assert_eq!(contents, ["one", "two"]);
        assert_eq!(list_comments(&db, &Actor::Anonymous, None).await.unwrap().len(), 3);

        let missing = list_review_comments(&db, &Actor::Anonymous, 999).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }
}
