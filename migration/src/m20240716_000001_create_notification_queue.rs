use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Tables are created in whichever schema leads the connection's search_path
        manager
            .create_table(
                Table::create()
                    .table(NotificationJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NotificationJobs::Payload)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationJobs::AvailableAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(NotificationJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Workers claim the oldest ready job first
        manager
            .create_index(
                Index::create()
                    .name("notification_jobs_available_at_created_at_idx")
                    .table(NotificationJobs::Table)
                    .col(NotificationJobs::AvailableAt)
                    .col(NotificationJobs::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(NotificationJobs::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum NotificationJobs {
    Table,
    Id,
    Payload,
    AvailableAt,
    CreatedAt,
}
