pub use sea_orm_migration::prelude::*;

mod m20241105_000001_create_users_and_reviews;
mod m20241112_000001_create_likes_and_comments;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241105_000001_create_users_and_reviews::Migration),
            Box::new(m20241112_000001_create_likes_and_comments::Migration),
        ]
    }
}
