use model::entities::{like, review};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::authorization::{authorize, Actor, Operation};
use crate::error::{is_unique_violation, Result, ServiceError};

pub const ALREADY_LIKED: &str = "You have already liked this review.";

fn already_liked() -> ServiceError {
    ServiceError::Conflict(ALREADY_LIKED.to_string())
}

/// Insert the like row; the `(user_id, review_id)` unique index turns a
/// concurrent duplicate into the usual conflict.
async fn insert_like_row<C: ConnectionTrait>(conn: &C, user_id: i32, review_id: i32) -> Result<like::Model> {
    like::ActiveModel {
        user_id: Set(user_id),
        review_id: Set(review_id),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            warn!("Concurrent like for review {} by user {}", review_id, user_id);
            already_liked()
        } else {
            err.into()
        }
    })
}

/// Like a review on behalf of the actor.
///
/// The lookup, duplicate check and insert share one transaction. A unique
/// index violation from a concurrent insert is reported as the same conflict.
#[instrument(skip(db))]
pub async fn create_like(db: &DatabaseConnection, actor: &Actor, review_id: i32) -> Result<like::Model> {
    authorize(actor, Operation::CreateLike, None)?;
    let identity = actor.require_identity()?;

    let txn = db.begin().await?;
    review::Entity::find_by_id(review_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Review"))?;

    let existing = like::Entity::find()
        .filter(like::Column::UserId.eq(identity.id))
        .filter(like::Column::ReviewId.eq(review_id))
        .one(&txn)
        .await?;
    if let Some(existing) = existing {
        debug!(like_id = existing.id, "User {} already liked review {}", identity.id, review_id);
        return Err(already_liked());
    }

    let created = insert_like_row(&txn, identity.id, review_id).await?;
    txn.commit().await?;

    info!("Like created with ID: {} on review {}", created.id, review_id);
    Ok(created)
}

#[instrument(skip(db))]
pub async fn delete_like(db: &DatabaseConnection, actor: &Actor, like_id: i32) -> Result<()> {
    actor.require_identity()?;
    let txn = db.begin().await?;
    let existing = like::Entity::find_by_id(like_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Like"))?;
    authorize(actor, Operation::DeleteLike, Some(existing.user_id))?;

    like::Entity::delete_by_id(existing.id).exec(&txn).await?;
    txn.commit().await?;
    info!("Like with ID {} deleted successfully", like_id);
    Ok(())
}

#[instrument(skip(db))]
pub async fn get_like(db: &DatabaseConnection, actor: &Actor, like_id: i32) -> Result<like::Model> {
    authorize(actor, Operation::RetrieveLike, None)?;
    like::Entity::find_by_id(like_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Like"))
}

/// All likes, optionally restricted to one review, oldest first.
#[instrument(skip(db))]
pub async fn list_likes(
    db: &DatabaseConnection,
    actor: &Actor,
    review_id: Option<i32>,
) -> Result<Vec<like::Model>> {
    authorize(actor, Operation::ListLikes, None)?;
    let mut select = like::Entity::find();
    if let Some(review_id) = review_id {
        select = select.filter(like::Column::ReviewId.eq(review_id));
    }
    let likes = select
        .order_by_asc(like::Column::CreatedAt)
        .order_by_asc(like::Column::Id)
        .all(db)
        .await?;
    debug!("Retrieved {} likes", likes.len());
    Ok(likes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{actor_for, insert_like, insert_review, setup_test_db, TestServices};
    use sea_orm::PaginatorTrait;

    async fn count_likes(db: &DatabaseConnection, review_id: i32) -> u64 {
        like::Entity::find()
            .filter(like::Column::ReviewId.eq(review_id))
            .count(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unique_index_duplicate_is_conflict() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "messi@gmail.com", "m10").await;
        let fan = services.create_user(&db, "neymar@gmail.com", "njr").await;
        let review = insert_review(&db, &author, "Modern Family", 4).await;

        // Two writers that both passed the duplicate check
        insert_like(&db, &fan, &review).await;
        let raced = insert_like_row(&db, fan.id, review.id).await;

        assert!(matches!(raced, Err(ServiceError::Conflict(ref m)) if m == ALREADY_LIKED));
        assert_eq!(count_likes(&db, review.id).await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_like_conflicts() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "messi@gmail.com", "m10").await;
        let fan = services.create_user(&db, "neymar@gmail.com", "njr").await;
        let review = insert_review(&db, &author, "Modern Family", 4).await;

        let first = create_like(&db, &actor_for(&fan), review.id).await.unwrap();
        assert_eq!(first.user_id, fan.id);
        assert_eq!(count_likes(&db, review.id).await, 1);

        let second = create_like(&db, &actor_for(&fan), review.id).await;
        assert!(matches!(second, Err(ServiceError::Conflict(ref m)) if m == ALREADY_LIKED));
        assert_eq!(count_likes(&db, review.id).await, 1);
    }

    #[tokio::test]
    async fn test_like_missing_review() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let fan = services.create_user(&db, "neymar@gmail.com", "njr").await;

        let result = create_like(&db, &actor_for(&fan), 999).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_anonymous_cannot_like_or_list() {
        let db = setup_test_db().await;
        let result = create_like(&db, &Actor::Anonymous, 1).await;
        assert!(matches!(result, Err(ServiceError::NotAuthenticated(_))));
        let result = list_likes(&db, &Actor::Anonymous, None).await;
        assert!(matches!(result, Err(ServiceError::NotAuthenticated(_))));
    }

    #[tokio::test]
    async fn test_only_owner_deletes_like() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "messi@gmail.com", "m10").await;
        let fan = services.create_user(&db, "neymar@gmail.com", "njr").await;
        let review = insert_review(&db, &author, "Modern Family", 4).await;
        let fan_like = insert_like(&db, &fan, &review).await;
        insert_like(&db, &author, &review).await;

        let denied = delete_like(&db, &actor_for(&author), fan_like.id).await;
        assert!(matches!(denied, Err(ServiceError::PermissionDenied(_))));
        assert_eq!(count_likes(&db, review.id).await, 2);

        delete_like(&db, &actor_for(&fan), fan_like.id).await.unwrap();
        assert_eq!(count_likes(&db, review.id).await, 1);

        let again = delete_like(&db, &actor_for(&fan), fan_like.id).await;
        assert!(matches!(again, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_likes_by_review() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "messi@gmail.com", "m10").await;
        let first = insert_review(&db, &author, "Iron Man", 5).await;
        let second = insert_review(&db, &author, "Iron Man 2", 3).await;
        insert_like(&db, &author, &first).await;
        insert_like(&db, &author, &second).await;

        let actor = actor_for(&author);
        assert_eq!(list_likes(&db, &actor, None).await.unwrap().len(), 2);
        let filtered = list_likes(&db, &actor, Some(second.id)).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].review_id, second.id);
    }
}
