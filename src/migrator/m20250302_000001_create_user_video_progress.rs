use super::m20250301_000001_create_users::Users;
use super::m20250301_000002_create_videos::Videos;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserVideoProgress::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserVideoProgress::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserVideoProgress::UserId).integer().not_null())
                    .col(ColumnDef::new(UserVideoProgress::VideoId).integer().not_null())
                    .col(
                        ColumnDef::new(UserVideoProgress::LastViewedPosition)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(UserVideoProgress::Viewed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(UserVideoProgress::LastViewedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-progress-user_id")
                            .from(UserVideoProgress::Table, UserVideoProgress::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-progress-video_id")
                            .from(UserVideoProgress::Table, UserVideoProgress::VideoId)
                            .to(Videos::Table, Videos::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one record per (user, video)
        manager
            .create_index(
                Index::create()
                    .name("idx-progress-user_id-video_id")
                    .table(UserVideoProgress::Table)
                    .col(UserVideoProgress::UserId)
                    .col(UserVideoProgress::VideoId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserVideoProgress::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserVideoProgress {
    Table,
    Id,
    UserId,
    VideoId,
    LastViewedPosition,
    Viewed,
    LastViewedAt,
}
