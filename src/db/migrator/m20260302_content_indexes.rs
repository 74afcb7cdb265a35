use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// At most one row may be active; partial indexes are not expressible in the
/// index builder so this one is raw SQL.
const ONE_ACTIVE_CONTENT: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_contents_single_active \
     ON contents (is_active) WHERE is_active = 1";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(ONE_ACTIVE_CONTENT)
            .await?;

        // Listing: newest backups of one content row
        manager
            .create_index(
                Index::create()
                    .name("idx_content_backups_content_created")
                    .table(ContentBackups::Table)
                    .col(ContentBackups::ContentId)
                    .col(ContentBackups::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Retention sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_content_backups_created_at")
                    .table(ContentBackups::Table)
                    .col(ContentBackups::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_content_backups_created_at")
                    .table(ContentBackups::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_content_backups_content_created")
                    .table(ContentBackups::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .get_connection()
            .execute_unprepared("DROP INDEX IF EXISTS idx_contents_single_active")
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum ContentBackups {
    Table,
    ContentId,
    CreatedAt,
}
