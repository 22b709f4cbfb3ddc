use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Videos::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Videos::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Videos::Title).string_len(80).not_null())
                    .col(ColumnDef::new(Videos::Description).string_len(500).not_null())
                    .col(ColumnDef::new(Videos::Category).string_len(32).not_null())
                    .col(ColumnDef::new(Videos::VideoFile).string().not_null())
                    .col(ColumnDef::new(Videos::Thumbnail).string().null())
                    .col(ColumnDef::new(Videos::Video120p).string().null())
                    .col(ColumnDef::new(Videos::Video360p).string().null())
                    .col(ColumnDef::new(Videos::Video720p).string().null())
                    .col(ColumnDef::new(Videos::Video1080p).string().null())
                    .col(
                        ColumnDef::new(Videos::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-videos-created_at")
                    .table(Videos::Table)
                    .col(Videos::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Videos::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Videos {
    Table,
    Id,
    Title,
    Description,
    Category,
    VideoFile,
    Thumbnail,
    #[sea_orm(iden = "video_120p")]
    Video120p,
    #[sea_orm(iden = "video_360p")]
    Video360p,
    #[sea_orm(iden = "video_720p")]
    Video720p,
    #[sea_orm(iden = "video_1080p")]
    Video1080p,
    CreatedAt,
}
