//! SeaORM entity modules for the movie review application.
//!
//! Users own reviews; reviews collect likes and comments. Every dependent
//! row is removed together with its user or review (`ON DELETE CASCADE`
//! in the migrations).

pub mod comment;
pub mod like;
pub mod review;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::comment::Entity as Comment;
    pub use super::like::Entity as Like;
    pub use super::review::Entity as Review;
    pub use super::user::Entity as User;
}
