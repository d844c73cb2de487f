use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::TaskResult;
use crate::models::{Task, TaskStatus};
use crate::positions::PositionBatch;

/// Repository trait for Task persistence
///
/// Every method is scoped to one owner. A task owned by someone else behaves
/// exactly like a missing one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// List an owner's tasks ordered by position, optionally one list only
    async fn list(&self, owner_id: Uuid, status: Option<TaskStatus>) -> TaskResult<Vec<Task>>;

    /// Get a task by ID
    async fn get(&self, owner_id: Uuid, id: Uuid) -> TaskResult<Option<Task>>;

    /// Number of tasks in one list
    async fn count(&self, owner_id: Uuid, status: TaskStatus) -> TaskResult<i32>;

    /// Apply a batch atomically, isolated from other batches of the same owner.
    ///
    /// Returns the records produced by the batch's writes, in order. On any
    /// error nothing is applied.
    async fn apply(&self, batch: PositionBatch) -> TaskResult<Vec<Task>>;
}

/// In-memory implementation of TaskRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<Uuid, Task>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert rows as-is, bypassing the position rules (for legacy/broken fixtures)
    pub async fn insert_raw(&self, rows: impl IntoIterator<Item = Task>) {
        let mut tasks = self.tasks.write().await;
        for task in rows {
            tasks.insert(task.id, task);
        }
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn list(&self, owner_id: Uuid, status: Option<TaskStatus>) -> TaskResult<Vec<Task>> {
        let tasks = self.tasks.read().await;

        let mut result: Vec<Task> = tasks
            .values()
            .filter(|t| t.owner_id == owner_id)
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();

        result.sort_by(crate::models::board_order);
        Ok(result)
    }

    async fn get(&self, owner_id: Uuid, id: Uuid) -> TaskResult<Option<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(&id).filter(|t| t.owner_id == owner_id).cloned())
    }

    async fn count(&self, owner_id: Uuid, status: TaskStatus) -> TaskResult<i32> {
        let tasks = self.tasks.read().await;
        let count = tasks
            .values()
            .filter(|t| t.owner_id == owner_id && t.status == status)
            .count();
        Ok(count as i32)
    }

    async fn apply(&self, batch: PositionBatch) -> TaskResult<Vec<Task>> {
        let mut tasks = self.tasks.write().await;

        // Work on a copy so a failing write leaves no partial effect
        let mut staged = tasks.clone();
        let written = batch.apply_to(&mut staged)?;
        *tasks = staged;

        tracing::debug!(
            owner_id = %batch.owner_id,
            shifts = batch.shifts.len(),
            writes = batch.writes.len(),
            "Applied position batch"
        );
        Ok(written)
    }
}
