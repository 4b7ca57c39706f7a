use sea_orm_migration::{prelude::*, schema::*};

use crate::m20241105_000001_create_users_and_reviews::{Reviews, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create likes table
        manager
            .create_table(
                Table::create()
                    .table(Likes::Table)
                    .if_not_exists()
                    .col(pk_auto(Likes::Id))
                    .col(integer(Likes::UserId))
                    .col(integer(Likes::ReviewId))
                    .col(timestamp_with_time_zone(Likes::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_like_user")
                            .from(Likes::Table, Likes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_like_review")
                            .from(Likes::Table, Likes::ReviewId)
                            .to(Reviews::Table, Reviews::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One like per user and review
        manager
            .create_index(
                Index::create()
                    .name("idx_likes_user_review")
                    .table(Likes::Table)
                    .col(Likes::UserId)
                    .col(Likes::ReviewId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create comments table
        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(pk_auto(Comments::Id))
                    .col(integer(Comments::UserId))
                    .col(integer(Comments::ReviewId))
                    .col(text(Comments::Content))
                    .col(timestamp_with_time_zone(Comments::CreatedAt))
                    .col(timestamp_with_time_zone(Comments::ModifiedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_user")
                            .from(Comments::Table, Comments::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_review")
                            .from(Comments::Table, Comments::ReviewId)
                            .to(Reviews::Table, Reviews::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comments_review")
                    .table(Comments::Table)
                    .col(Comments::ReviewId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Likes::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Likes {
    Table,
    Id,
    UserId,
    ReviewId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    UserId,
    ReviewId,
    Content,
    CreatedAt,
    ModifiedAt,
}
