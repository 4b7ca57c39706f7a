//! Review CRUD plus the two read-side queries: the filtered, sorted and
//! paginated listing and the most-liked ranking.

use std::collections::HashMap;

use model::entities::{like, review, user};
use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, JoinType, LoaderTrait, Order, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, trace};

use crate::authorization::{authorize, Actor, Operation};
use crate::error::{Result, ServiceError};
use crate::pagination::{Page, PageRequest};
use crate::validation::{validate_review, ReviewInput, MOVIE_TITLE_REQUIRED};

/// Number of entries returned by [`most_liked`].
pub const MOST_LIKED_LIMIT: u64 = 5;

/// A review together with its author's username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDetails {
    pub review: review::Model,
    pub author: String,
}

/// A review ranked by [`most_liked`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikedReview {
    pub review: review::Model,
    pub author: String,
    pub likes_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOrderField {
    CreatedAt,
    Rating,
}

impl ReviewOrderField {
    fn column(self) -> review::Column {
        match self {
            ReviewOrderField::CreatedAt => review::Column::CreatedAt,
            ReviewOrderField::Rating => review::Column::Rating,
        }
    }
}

/// One `ordering` term such as `-rating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub field: ReviewOrderField,
    pub descending: bool,
}

impl OrderTerm {
    fn order(self) -> Order {
        if self.descending {
            Order::Desc
        } else {
            Order::Asc
        }
    }
}

const DEFAULT_ORDERING: OrderTerm = OrderTerm {
    field: ReviewOrderField::CreatedAt,
    descending: true,
};

/// Parse a comma separated ordering such as `-rating,created_at`.
///
/// Unknown fields are skipped and a repeated field keeps its first
/// direction. An ordering with no usable term falls back to `-created_at`.
pub fn parse_ordering(raw: Option<&str>) -> Vec<OrderTerm> {
    let mut terms: Vec<OrderTerm> = Vec::new();
    for token in raw.unwrap_or_default().split(',') {
        let token = token.trim();
        let (descending, name) = match token.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, token),
        };
        let field = match name {
            "created_at" => ReviewOrderField::CreatedAt,
            "rating" => ReviewOrderField::Rating,
            "" => continue,
            other => {
                trace!("Ignoring unknown ordering field: {}", other);
                continue;
            }
        };
        if terms.iter().all(|term| term.field != field) {
            terms.push(OrderTerm { field, descending });
        }
    }
    if terms.is_empty() {
        terms.push(DEFAULT_ORDERING);
    }
    terms
}

/// Filters, ordering and page for [`list_reviews`].
#[derive(Debug, Clone, Default)]
pub struct ReviewQuery {
    pub movie_title: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: PageRequest,
}

/// Case-insensitive substring match on the movie title. `%`, `_` and `\`
/// in the needle match literally.
fn title_contains(needle: &str) -> SimpleExpr {
    let escaped = needle
        .trim()
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Expr::expr(Func::lower(Expr::col((review::Entity, review::Column::MovieTitle))))
        .like(LikeExpr::new(format!("%{}%", escaped)).escape('\\'))
}

async fn attach_authors<C: ConnectionTrait>(db: &C, reviews: Vec<review::Model>) -> Result<Vec<ReviewDetails>> {
    if reviews.is_empty() {
        return Ok(Vec::new());
    }
    let authors = reviews.load_one(user::Entity, db).await?;
    Ok(reviews
        .into_iter()
        .zip(authors)
        .map(|(review, author)| ReviewDetails {
            review,
            author: author.map(|user| user.username).unwrap_or_default(),
        })
        .collect())
}

async fn find_review<C: ConnectionTrait>(db: &C, review_id: i32) -> Result<review::Model> {
    review::Entity::find_by_id(review_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Review"))
}

#[instrument(skip(db))]
pub async fn list_reviews(
    db: &DatabaseConnection,
    actor: &Actor,
    query: &ReviewQuery,
) -> Result<Page<ReviewDetails>> {
    authorize(actor, Operation::ListReviews, None)?;

    let mut select = review::Entity::find();
    for needle in [query.movie_title.as_deref(), query.search.as_deref()]
        .into_iter()
        .flatten()
        .filter(|needle| !needle.trim().is_empty())
    {
        select = select.filter(title_contains(needle));
    }
    for term in parse_ordering(query.ordering.as_deref()) {
        select = select.order_by(term.field.column(), term.order());
    }
    select = select.order_by_asc(review::Column::Id);

    let page = query.page;
    let paginator = select.paginate(db, page.page_size);
    let totals = paginator.num_items_and_pages().await?;
    if page.page > 1 && page.index() >= totals.number_of_pages {
        debug!(
            page = page.page,
            total_pages = totals.number_of_pages,
            "Requested page is out of range"
        );
        return Err(ServiceError::NotFound("Invalid page.".to_string()));
    }

    let reviews = paginator.fetch_page(page.index()).await?;
    debug!("Retrieved {} of {} reviews", reviews.len(), totals.number_of_items);

    Ok(Page {
        count: totals.number_of_items,
        page: page.page,
        page_size: page.page_size,
        total_pages: totals.number_of_pages.max(1),
        results: attach_authors(db, reviews).await?,
    })
}

#[derive(Debug, FromQueryResult)]
struct LikeTally {
    id: i32,
    likes_count: i64,
}

/// Top reviews by like count among those whose title contains `movie_title`.
/// Ties are broken by ascending review id.
#[instrument(skip(db))]
pub async fn most_liked(
    db: &DatabaseConnection,
    actor: &Actor,
    movie_title: Option<&str>,
) -> Result<Vec<LikedReview>> {
    authorize(actor, Operation::MostLikedReviews, None)?;
    let title = movie_title
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .ok_or_else(|| ServiceError::BadRequest(MOVIE_TITLE_REQUIRED.to_string()))?;

    let tallies = review::Entity::find()
        .select_only()
        .column(review::Column::Id)
        .column_as(like::Column::Id.count(), "likes_count")
        .join(JoinType::LeftJoin, review::Relation::Like.def())
        .filter(title_contains(title))
        .group_by(review::Column::Id)
        .order_by_desc(like::Column::Id.count())
        .order_by_asc(review::Column::Id)
        .limit(MOST_LIKED_LIMIT)
        .into_model::<LikeTally>()
        .all(db)
        .await?;
    debug!("Ranked {} reviews matching '{}'", tallies.len(), title);
    if tallies.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = tallies.iter().map(|tally| tally.id).collect();
    let reviews = review::Entity::find()
        .filter(review::Column::Id.is_in(ids))
        .all(db)
        .await?;
    let mut by_id: HashMap<i32, ReviewDetails> = attach_authors(db, reviews)
        .await?
        .into_iter()
        .map(|details| (details.review.id, details))
        .collect();

    Ok(tallies
        .into_iter()
        .filter_map(|tally| {
            by_id.remove(&tally.id).map(|details| LikedReview {
                review: details.review,
                author: details.author,
                likes_count: tally.likes_count,
            })
        })
        .collect())
}

/// Create a review owned by the acting user.
#[instrument(skip(db, input))]
pub async fn create_review(db: &DatabaseConnection, actor: &Actor, input: ReviewInput) -> Result<ReviewDetails> {
    authorize(actor, Operation::CreateReview, None)?;
    let identity = actor.require_identity()?;
    let valid = validate_review(&input, None)?;

    let txn = db.begin().await?;
    let created = review::ActiveModel {
        movie_title: Set(valid.movie_title),
        content: Set(valid.content),
        rating: Set(valid.rating),
        user_id: Set(identity.id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!("Review created with ID: {} by user {}", created.id, identity.id);
    Ok(ReviewDetails {
        review: created,
        author: identity.username.clone(),
    })
}

#[instrument(skip(db))]
pub async fn get_review(db: &DatabaseConnection, actor: &Actor, review_id: i32) -> Result<ReviewDetails> {
    authorize(actor, Operation::RetrieveReview, None)?;
    let review = find_review(db, review_id).await?;
    let mut details = attach_authors(db, vec![review]).await?;
    details.pop().ok_or_else(|| ServiceError::not_found("Review"))
}

/// Update a review. `partial` keeps stored values for absent fields.
#[instrument(skip(db, input))]
pub async fn update_review(
    db: &DatabaseConnection,
    actor: &Actor,
    review_id: i32,
    input: ReviewInput,
    partial: bool,
) -> Result<ReviewDetails> {
    let identity = actor.require_identity()?;
    let txn = db.begin().await?;
    let existing = find_review(&txn, review_id).await?;
    authorize(actor, Operation::UpdateReview, Some(existing.user_id))?;

    let valid = validate_review(&input, partial.then_some(&existing))?;
    let mut active: review::ActiveModel = existing.into();
    active.movie_title = Set(valid.movie_title);
    active.content = Set(valid.content);
    active.rating = Set(valid.rating);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    info!("Review with ID {} updated successfully", review_id);
    Ok(ReviewDetails {
        review: updated,
        author: identity.username.clone(),
    })
}

/// Delete a review; its likes and comments go with it.
#[instrument(skip(db))]
pub async fn delete_review(db: &DatabaseConnection, actor: &Actor, review_id: i32) -> Result<()> {
    actor.require_identity()?;
    let txn = db.begin().await?;
    let existing = find_review(&txn, review_id).await?;
    authorize(actor, Operation::DeleteReview, Some(existing.user_id))?;

    review::Entity::delete_by_id(existing.id).exec(&txn).await?;
    txn.commit().await?;
    info!("Review with ID {} deleted successfully", review_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{actor_for, insert_like, insert_review, setup_test_db, TestServices};
    use crate::validation::RATING_RANGE;
    use model::entities::comment;

    fn input(movie_title: &str, rating: i32) -> ReviewInput {
        ReviewInput {
            movie_title: Some(movie_title.to_string()),
            content: Some("A very exciting movie!".to_string()),
            rating: Some(rating),
        }
    }

    fn query(ordering: Option<&str>) -> ReviewQuery {
        ReviewQuery {
            ordering: ordering.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_ordering() {
        assert_eq!(parse_ordering(None), vec![DEFAULT_ORDERING]);
        assert_eq!(parse_ordering(Some("bogus,")), vec![DEFAULT_ORDERING]);
        assert_eq!(
            parse_ordering(Some("-rating, created_at,rating")),
            vec![
                OrderTerm {
                    field: ReviewOrderField::Rating,
                    descending: true
                },
                OrderTerm {
                    field: ReviewOrderField::CreatedAt,
                    descending: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_create_rejects_out_of_range_rating() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "cronaldo@gmail.com", "ororo").await;

        for rating in [-3, 0, 6, 100] {
            let result = create_review(&db, &actor_for(&author), input("Iron Man", rating)).await;
            match result {
                Err(ServiceError::Validation(errors)) => {
                    assert_eq!(errors.get("rating").unwrap(), [RATING_RANGE])
                }
                other => panic!("expected validation error for {rating}, got {other:?}"),
            }
        }
        assert_eq!(review::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_requires_authentication() {
        let db = setup_test_db().await;
        let result = create_review(&db, &Actor::Anonymous, input("Iron Man", 4)).await;
        assert!(matches!(result, Err(ServiceError::NotAuthenticated(_))));
    }

    #[tokio::test]
    async fn test_create_assigns_actor_as_author() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "cronaldo@gmail.com", "ororo").await;

        let created = create_review(&db, &actor_for(&author), input("Iron Man", 4))
            .await
            .unwrap();
        assert_eq!(created.review.user_id, author.id);
        assert_eq!(created.author, "ororo");
    }

    #[tokio::test]
    async fn test_foreign_writes_are_denied() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let owner = services.create_user(&db, "messi@gmail.com", "m10").await;
        let other = services.create_user(&db, "neymar@gmail.com", "njr").await;
        let review = insert_review(&db, &owner, "Modern Family", 4).await;
        let intruder = actor_for(&other);

        for partial in [false, true] {
            let result = update_review(&db, &intruder, review.id, input("Hacked", 1), partial).await;
            assert!(matches!(result, Err(ServiceError::PermissionDenied(_))));
        }
        let result = delete_review(&db, &intruder, review.id).await;
        assert!(matches!(result, Err(ServiceError::PermissionDenied(_))));

        let stored = find_review(&db, review.id).await.unwrap();
        assert_eq!(stored, review);
    }

    #[tokio::test]
    async fn test_missing_review_is_not_found() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let user = services.create_user(&db, "messi@gmail.com", "m10").await;

        let result = delete_review(&db, &actor_for(&user), 4242).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let owner = services.create_user(&db, "messi@gmail.com", "m10").await;
        let review = insert_review(&db, &owner, "Modern Family", 4).await;

        let patch = ReviewInput {
            rating: Some(5),
            ..Default::default()
        };
        let updated = update_review(&db, &actor_for(&owner), review.id, patch, true)
            .await
            .unwrap();
        assert_eq!(updated.review.rating, 5);
        assert_eq!(updated.review.movie_title, "Modern Family");
        assert_eq!(updated.review.created_at, review.created_at);

        let full = ReviewInput {
            rating: Some(3),
            ..Default::default()
        };
        let result = update_review(&db, &actor_for(&owner), review.id, full, false).await;
        assert!(matches!(result, Err(ServiceError::Validation(ref e)) if e.contains("movie_title")));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_likes_and_comments() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let owner = services.create_user(&db, "messi@gmail.com", "m10").await;
        let fan = services.create_user(&db, "neymar@gmail.com", "njr").await;
        let review = insert_review(&db, &owner, "Modern Family", 4).await;
        insert_like(&db, &fan, &review).await;
        comment::ActiveModel {
            user_id: Set(fan.id),
            review_id: Set(review.id),
            content: Set("Agreed".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        delete_review(&db, &actor_for(&owner), review.id).await.unwrap();

        assert_eq!(like::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(comment::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_filters_case_insensitively() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "messi@gmail.com", "m10").await;
        insert_review(&db, &author, "Iron Man", 5).await;
        insert_review(&db, &author, "Iron Man 2", 3).await;
        insert_review(&db, &author, "Modern Family", 4).await;

        let page = list_reviews(
            &db,
            &Actor::Anonymous,
            &ReviewQuery {
                search: Some("iron".to_string()),
                ordering: Some("-rating".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.count, 2);
        let titles: Vec<_> = page.results.iter().map(|r| r.review.movie_title.as_str()).collect();
        assert_eq!(titles, ["Iron Man", "Iron Man 2"]);
        assert!(page.results.iter().all(|r| r.author == "m10"));

        let literal = list_reviews(
            &db,
            &Actor::Anonymous,
            &ReviewQuery {
                movie_title: Some("%".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(literal.count, 0);
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let author = services.create_user(&db, "messi@gmail.com", "m10").await;
        for rating in [1, 2, 3, 4, 5, 1, 2] {
            insert_review(&db, &author, "Film", rating).await;
        }

        let first = list_reviews(&db, &Actor::Anonymous, &query(Some("rating"))).await.unwrap();
        assert_eq!(first.count, 7);
        assert_eq!(first.page_size, 5);
        assert_eq!(first.total_pages, 2);
        let ratings: Vec<_> = first.results.iter().map(|r| r.review.rating).collect();
        assert_eq!(ratings, [1, 1, 2, 2, 3]);
        assert!(first.results[0].review.id < first.results[1].review.id);

        let second = list_reviews(
            &db,
            &Actor::Anonymous,
            &ReviewQuery {
                ordering: Some("rating".to_string()),
                page: PageRequest::new(Some(2), None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(second.results.len(), 2);

        let beyond = list_reviews(
            &db,
            &Actor::Anonymous,
            &ReviewQuery {
                page: PageRequest::new(Some(3), None),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(beyond, Err(ServiceError::NotFound(ref m)) if m == "Invalid page."));
    }

    #[tokio::test]
    async fn test_empty_list_first_page() {
        let db = setup_test_db().await;
        let page = list_reviews(&db, &Actor::Anonymous, &query(None)).await.unwrap();
        assert_eq!(page.count, 0);
        assert_eq!(page.total_pages, 1);
        assert!(page.results.is_empty());
    }

    #[tokio::test]
    async fn test_most_liked_requires_title() {
        let db = setup_test_db().await;
        for title in [None, Some(""), Some("   ")] {
            let result = most_liked(&db, &Actor::Anonymous, title).await;
            assert!(matches!(result, Err(ServiceError::BadRequest(ref m)) if m == MOVIE_TITLE_REQUIRED));
        }
    }

    #[tokio::test]
    async fn test_most_liked_breaks_ties_by_id() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let u1 = services.create_user(&db, "messi@gmail.com", "m10").await;
        let u2 = services.create_user(&db, "cronaldo@gmail.com", "ororo").await;
        let u3 = services.create_user(&db, "neymar@gmail.com", "njr").await;
        let a = insert_review(&db, &u1, "Modern Family", 4).await;
        let b = insert_review(&db, &u2, "Modern Family Returns", 5).await;
        insert_review(&db, &u3, "Iron Man", 5).await;
        insert_like(&db, &u3, &a).await;
        insert_like(&db, &u3, &b).await;

        let ranked = most_liked(&db, &Actor::Anonymous, Some("modern family")).await.unwrap();
        let summary: Vec<_> = ranked.iter().map(|r| (r.review.id, r.likes_count)).collect();
        assert_eq!(summary, [(a.id, 1), (b.id, 1)]);
        assert_eq!(ranked[0].author, "m10");
    }

    #[tokio::test]
    async fn test_most_liked_ranks_by_count_and_limits() {
        let db = setup_test_db().await;
        let services = TestServices::new();
        let mut fans = Vec::new();
        for i in 0..3 {
            fans.push(services.create_user(&db, &format!("fan{i}@example.com"), &format!("fan{i}")).await);
        }
        let mut reviews = Vec::new();
        for _ in 0..7 {
            reviews.push(insert_review(&db, &fans[0], "Matrix", 5).await);
        }
        for fan in &fans {
            insert_like(&db, fan, &reviews[6]).await;
        }
        insert_like(&db, &fans[0], &reviews[3]).await;

        let ranked = most_liked(&db, &Actor::Anonymous, Some("MATRIX")).await.unwrap();
        assert_eq!(ranked.len(), MOST_LIKED_LIMIT as usize);
        assert_eq!(ranked[0].review.id, reviews[6].id);
        assert_eq!(ranked[0].likes_count, 3);
        assert_eq!(ranked[1].review.id, reviews[3].id);
        assert_eq!(ranked[2].review.id, reviews[0].id);
        assert_eq!(ranked[2].likes_count, 0);
    }
}
