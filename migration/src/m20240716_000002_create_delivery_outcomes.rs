use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                "DO $$ BEGIN
                    CREATE TYPE delivery_result AS ENUM (
                        'delivered',
                        'retry_scheduled',
                        'failed_permanent'
                    );
                EXCEPTION
                    WHEN duplicate_object THEN NULL;
                END $$;",
            )
            .await?;

        let create_outcomes_sql = r#"
            CREATE TABLE IF NOT EXISTS delivery_outcomes (
                id UUID PRIMARY KEY,
                job_id UUID NOT NULL,
                recipient_user_id BIGINT NOT NULL,
                target_ref TEXT NOT NULL,
                result delivery_result NOT NULL,
                attempt INTEGER NOT NULL CHECK (attempt >= 1),
                detail TEXT,
                recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#;

        manager
            .get_connection()
            .execute_unprepared(create_outcomes_sql)
            .await?;

        // History is always read per job
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS delivery_outcomes_job_id_idx
                    ON delivery_outcomes (job_id, recorded_at)",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS delivery_outcomes")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TYPE IF EXISTS delivery_result")
            .await?;

        Ok(())
    }
}
