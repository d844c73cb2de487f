use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(TaskStatus::Enum)
                    .values([TaskStatus::Todo, TaskStatus::Done])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(pk_uuid(Tasks::Id))
                    .col(uuid(Tasks::OwnerId))
                    .col(string_len(Tasks::Title, 255))
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .enumeration(TaskStatus::Enum, [TaskStatus::Todo, TaskStatus::Done])
                            .not_null()
                            .default("todo"),
                    )
                    .col(integer(Tasks::Position))
                    .col(
                        timestamp_with_time_zone(Tasks::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Tasks::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Range shifts pass through duplicate positions mid-transaction,
        // so uniqueness is only enforced at commit. The constraint's index
        // also serves the (owner_id, status) ordered scans.
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                ALTER TABLE tasks
                    ADD CONSTRAINT uq_tasks_owner_status_position
                    UNIQUE (owner_id, status, position)
                    DEFERRABLE INITIALLY DEFERRED,
                    ADD CONSTRAINT ck_tasks_position_non_negative
                    CHECK (position >= 0)
                "#,
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER tasks_touch_updated_at
                    BEFORE UPDATE ON tasks
                    FOR EACH ROW
                    EXECUTE FUNCTION util.touch_updated_at()
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TRIGGER IF EXISTS tasks_touch_updated_at ON tasks")
            .await?;

        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(TaskStatus::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    OwnerId,
    Title,
    Status,
    Position,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TaskStatus {
    #[sea_orm(iden = "task_status")]
    Enum,
    #[sea_orm(iden = "todo")]
    Todo,
    #[sea_orm(iden = "done")]
    Done,
}
