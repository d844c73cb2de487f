use async_trait::async_trait;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Statement,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    entity,
    error::{TaskError, TaskResult},
    models::{Task, TaskStatus},
    positions::{Guard, PositionBatch, Shift, Write, stale_len, stale_slot},
    repository::TaskRepository,
};

/// PostgreSQL-backed task store.
///
/// Each batch runs in its own transaction holding a per-owner advisory lock,
/// so two batches of the same owner never interleave. The
/// `(owner_id, status, position)` unique constraint is deferred to commit,
/// which lets range shifts pass through transient duplicates.
#[derive(Clone)]
pub struct PgTaskRepository {
    db: DatabaseConnection,
}

impl PgTaskRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Advisory lock key derived from the owner id
fn owner_lock_key(owner_id: Uuid) -> i64 {
    let (high, low) = owner_id.as_u64_pair();
    (high ^ low) as i64
}

async fn lock_owner(txn: &DatabaseTransaction, owner_id: Uuid) -> TaskResult<()> {
    let stmt = Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        "SELECT pg_advisory_xact_lock($1)",
        [owner_lock_key(owner_id).into()],
    );
    txn.query_one_raw(stmt).await?;
    Ok(())
}

async fn find_owned(
    txn: &DatabaseTransaction,
    owner_id: Uuid,
    id: Uuid,
) -> TaskResult<entity::Model> {
    entity::Entity::find_by_id(id)
        .filter(entity::Column::OwnerId.eq(owner_id))
        .one(txn)
        .await?
        .ok_or(TaskError::NotFound(id))
}

async fn count_partition<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    status: TaskStatus,
) -> TaskResult<i32> {
    let count = entity::Entity::find()
        .filter(entity::Column::OwnerId.eq(owner_id))
        .filter(entity::Column::Status.eq(status))
        .count(conn)
        .await?;

    Ok(count as i32)
}

async fn check_guard(txn: &DatabaseTransaction, owner_id: Uuid, guard: &Guard) -> TaskResult<()> {
    match *guard {
        Guard::At {
            id,
            status,
            position,
        } => {
            let current: Task = find_owned(txn, owner_id, id).await?.into();
            if current.status != status || current.position != position {
                return Err(stale_slot(id, status, position, &current));
            }
        }
        Guard::Len { status, len } => {
            let actual = count_partition(txn, owner_id, status).await?;
            if actual != len {
                return Err(stale_len(status, len, actual));
            }
        }
    }
    Ok(())
}

async fn apply_shift(txn: &DatabaseTransaction, owner_id: Uuid, shift: &Shift) -> TaskResult<u64> {
    let mut update = entity::Entity::update_many()
        .col_expr(
            entity::Column::Position,
            Expr::col(entity::Column::Position).add(shift.delta),
        )
        .filter(entity::Column::OwnerId.eq(owner_id))
        .filter(entity::Column::Status.eq(shift.status))
        .filter(entity::Column::Position.gte(shift.range.start));

    if let Some(end) = shift.range.end {
        update = update.filter(entity::Column::Position.lte(end));
    }
    if let Some(except) = shift.except {
        update = update.filter(entity::Column::Id.ne(except));
    }

    let result = update.exec(txn).await?;
    Ok(result.rows_affected)
}

async fn apply_write(txn: &DatabaseTransaction, owner_id: Uuid, write: Write) -> TaskResult<Task> {
    let model = match write {
        Write::Insert {
            title,
            status,
            position,
        } => {
            entity::new_row(owner_id, title, status, position)
                .insert(txn)
                .await?
        }
        Write::Place {
            id,
            status,
            position,
        } => {
            let mut active: entity::ActiveModel = find_owned(txn, owner_id, id).await?.into();
            active.status = Set(status);
            active.position = Set(position);
            active.updated_at = Set(chrono::Utc::now().into());
            active.update(txn).await?
        }
        Write::Retitle { id, title } => {
            let mut active: entity::ActiveModel = find_owned(txn, owner_id, id).await?.into();
            active.title = Set(title);
            active.updated_at = Set(chrono::Utc::now().into());
            active.update(txn).await?
        }
        Write::Remove { id } => {
            let model = find_owned(txn, owner_id, id).await?;
            entity::Entity::delete_by_id(id).exec(txn).await?;
            model
        }
    };

    Ok(model.into())
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn list(&self, owner_id: Uuid, status: Option<TaskStatus>) -> TaskResult<Vec<Task>> {
        let mut query = entity::Entity::find().filter(entity::Column::OwnerId.eq(owner_id));

        if let Some(status) = status {
            query = query.filter(entity::Column::Status.eq(status));
        }

        let models = query
            .order_by_asc(entity::Column::Position)
            .order_by_asc(entity::Column::Status)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    async fn get(&self, owner_id: Uuid, id: Uuid) -> TaskResult<Option<Task>> {
        let model = entity::Entity::find_by_id(id)
            .filter(entity::Column::OwnerId.eq(owner_id))
            .one(&self.db)
            .await?;

        Ok(model.map(|m| m.into()))
    }

    async fn count(&self, owner_id: Uuid, status: TaskStatus) -> TaskResult<i32> {
        count_partition(&self.db, owner_id, status).await
    }

    async fn apply(&self, batch: PositionBatch) -> TaskResult<Vec<Task>> {
        let PositionBatch {
            owner_id,
            guards,
            shifts,
            writes,
        } = batch;

        // Dropping the transaction on any early return rolls it back
        let txn = self.db.begin().await?;
        lock_owner(&txn, owner_id).await?;

        for guard in &guards {
            check_guard(&txn, owner_id, guard).await?;
        }

        let mut shifted = 0;
        for shift in &shifts {
            shifted += apply_shift(&txn, owner_id, shift).await?;
        }

        let mut written = Vec::with_capacity(writes.len());
        for write in writes {
            written.push(apply_write(&txn, owner_id, write).await?);
        }

        txn.commit().await?;

        tracing::debug!(
            owner_id = %owner_id,
            shifted,
            written = written.len(),
            "Committed position batch"
        );
        Ok(written)
    }
}
