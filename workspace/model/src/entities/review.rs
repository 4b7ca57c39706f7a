use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};

/// Lowest accepted rating.
pub const MIN_RATING: i32 = 1;
/// Highest accepted rating.
pub const MAX_RATING: i32 = 5;

/// A user's review of a movie.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub movie_title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    /// Rating between [`MIN_RATING`] and [`MAX_RATING`] inclusive.
    pub rating: i32,
    /// Author of the review. Only the author may change or remove it.
    pub user_id: i32,
    /// Set once on insert and never changed afterwards.
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::like::Entity")]
    Like,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::like::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Like.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

/// Returns true when `rating` lies within the accepted range.
pub fn is_valid_rating(rating: i32) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating)
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if let ActiveValue::Set(rating) | ActiveValue::Unchanged(rating) = &self.rating {
            if !is_valid_rating(*rating) {
                return Err(DbErr::Custom(format!(
                    "rating {} is outside of {}..={}",
                    rating, MIN_RATING, MAX_RATING
                )));
            }
        }
        if insert && self.created_at.is_not_set() {
            self.created_at = Set(chrono::Utc::now());
        }
        Ok(self)
    }
}
